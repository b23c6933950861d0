//! Shared stub gateway for orchestration tests.

use adforge::chat::ChatDirective;
use adforge::error::{Error, Result};
use adforge::gateway::{
    AdGenerationRequest, ChatReply, ChatRequest, DiscoveryData, DiscoveryRequest,
    GenerationGateway, GenerationStart, JobKind, JobStatus, SectionGenerationRequest,
    VideoGenerationRequest,
};
use adforge::session::{
    AdConcept, CreativePackage, CreativePath, LandingLayoutProposal, LandingSection, ProductData,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

/// How the stub answers generation dispatches.
#[derive(Debug, Clone)]
pub enum GenerationMode {
    /// Finish synchronously with a unique image URL
    Immediate,
    /// Return a job id; the job completes after this many status checks
    Job { polls_until_done: u32 },
    /// Return a job id that never finishes
    NeverDone,
    /// Return a job id that finishes with a gateway-reported failure
    JobFails { message: String },
    /// Reject the dispatch itself
    RequestError { message: String },
}

struct JobState {
    remaining: u32,
    never_done: bool,
    failure: Option<String>,
}

pub struct StubGateway {
    pub mode: GenerationMode,
    pub chat_reply: Mutex<Option<ChatReply>>,
    jobs: Mutex<HashMap<String, JobState>>,
    next_job: AtomicU64,
    next_image: AtomicU64,
    in_flight: AtomicI64,
    pub max_in_flight: AtomicI64,
    pub section_requests: Mutex<Vec<SectionGenerationRequest>>,
    pub ad_requests: Mutex<Vec<AdGenerationRequest>>,
}

impl StubGateway {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            mode,
            chat_reply: Mutex::new(None),
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(0),
            next_image: AtomicU64::new(0),
            in_flight: AtomicI64::new(0),
            max_in_flight: AtomicI64::new(0),
            section_requests: Mutex::new(Vec::new()),
            ad_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chat_reply(self, text: &str, directive: Option<ChatDirective>) -> Self {
        *self.chat_reply.lock().unwrap() = Some(ChatReply {
            text: text.to_string(),
            directive,
        });
        self
    }

    pub fn last_section_request(&self) -> SectionGenerationRequest {
        self.section_requests.lock().unwrap().last().cloned().unwrap()
    }

    fn track_dispatch(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
    }

    fn settle_dispatch(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn fresh_image(&self) -> String {
        let n = self.next_image.fetch_add(1, Ordering::SeqCst);
        format!("https://img.example/generated-{}.png", n)
    }

    fn start_generation(&self) -> Result<GenerationStart> {
        match &self.mode {
            GenerationMode::Immediate => {
                self.track_dispatch();
                self.settle_dispatch();
                Ok(GenerationStart::Immediate {
                    image_url: self.fresh_image(),
                    copy: None,
                })
            }
            GenerationMode::Job { polls_until_done } => {
                self.track_dispatch();
                let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
                self.jobs.lock().unwrap().insert(
                    id.clone(),
                    JobState {
                        remaining: *polls_until_done,
                        never_done: false,
                        failure: None,
                    },
                );
                Ok(GenerationStart::Job { generation_id: id })
            }
            GenerationMode::NeverDone => {
                self.track_dispatch();
                let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
                self.jobs.lock().unwrap().insert(
                    id.clone(),
                    JobState {
                        remaining: 0,
                        never_done: true,
                        failure: None,
                    },
                );
                Ok(GenerationStart::Job { generation_id: id })
            }
            GenerationMode::JobFails { message } => {
                self.track_dispatch();
                let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
                self.jobs.lock().unwrap().insert(
                    id.clone(),
                    JobState {
                        remaining: 1,
                        never_done: false,
                        failure: Some(message.clone()),
                    },
                );
                Ok(GenerationStart::Job { generation_id: id })
            }
            GenerationMode::RequestError { message } => Err(Error::Gateway(message.clone())),
        }
    }
}

pub fn product() -> ProductData {
    ProductData {
        name: "Aurora Mug".to_string(),
        angle: "Keeps coffee hot for 6 hours".to_string(),
        buyer: "Remote workers".to_string(),
        details: "Matte ceramic, walnut lid".to_string(),
    }
}

pub fn three_paths() -> Vec<CreativePath> {
    ["minimal", "bold", "editorial"]
        .iter()
        .map(|id| CreativePath {
            package: CreativePackage {
                id: id.to_string(),
                name: format!("{} package", id),
                description: String::new(),
                visual_style: String::new(),
            },
            justification: format!("{} fits the buyer", id),
        })
        .collect()
}

pub fn proposal(ids: &[&str]) -> LandingLayoutProposal {
    LandingLayoutProposal {
        sections: ids
            .iter()
            .map(|id| LandingSection {
                section_id: id.to_string(),
                title: format!("Section {}", id),
                reasoning: String::new(),
                extra_instructions: None,
            })
            .collect(),
    }
}

pub fn concepts(ids: &[&str]) -> Vec<AdConcept> {
    ids.iter()
        .map(|id| AdConcept {
            concept_id: id.to_string(),
            title: format!("Concept {}", id),
            hook: String::new(),
        })
        .collect()
}

#[async_trait]
impl GenerationGateway for StubGateway {
    async fn discover(&self, _request: &DiscoveryRequest) -> Result<DiscoveryData> {
        Ok(DiscoveryData {
            product: product(),
            base_image_url: Some("https://img.example/base.png".to_string()),
        })
    }

    async fn recommend_paths(&self, _product: &ProductData) -> Result<Vec<CreativePath>> {
        Ok(three_paths())
    }

    async fn design_landing(
        &self,
        _product: &ProductData,
        _path: &CreativePath,
    ) -> Result<LandingLayoutProposal> {
        Ok(proposal(&["hero", "offer", "testimonials"]))
    }

    async fn generate_section(
        &self,
        request: &SectionGenerationRequest,
    ) -> Result<GenerationStart> {
        self.section_requests.lock().unwrap().push(request.clone());
        self.start_generation()
    }

    async fn ad_concepts(
        &self,
        _product: &ProductData,
        _path: &CreativePath,
    ) -> Result<Vec<AdConcept>> {
        Ok(concepts(&["ad-1", "ad-2"]))
    }

    async fn generate_ad(&self, request: &AdGenerationRequest) -> Result<GenerationStart> {
        self.ad_requests.lock().unwrap().push(request.clone());
        self.start_generation()
    }

    async fn generate_video(&self, _request: &VideoGenerationRequest) -> Result<GenerationStart> {
        self.start_generation()
    }

    async fn job_status(&self, _kind: JobKind, generation_id: &str) -> Result<JobStatus> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(generation_id)
            .ok_or_else(|| Error::Gateway(format!("unknown job {}", generation_id)))?;

        if job.never_done {
            return Ok(JobStatus {
                done: false,
                success: None,
                image_url: None,
                video_url: None,
                copy: None,
                error: None,
            });
        }

        if job.remaining > 1 {
            job.remaining -= 1;
            return Ok(JobStatus {
                done: false,
                success: None,
                image_url: None,
                video_url: None,
                copy: None,
                error: None,
            });
        }

        self.settle_dispatch();
        if let Some(message) = job.failure.clone() {
            return Ok(JobStatus {
                done: true,
                success: Some(false),
                image_url: None,
                video_url: None,
                copy: None,
                error: Some(message),
            });
        }
        Ok(JobStatus {
            done: true,
            success: Some(true),
            image_url: Some(self.fresh_image()),
            video_url: Some("https://vid.example/out.mp4".to_string()),
            copy: None,
            error: None,
        })
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<ChatReply> {
        self.chat_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Gateway("no chat reply scripted".to_string()))
    }

    async fn credit_balance(&self) -> Result<u64> {
        Ok(42)
    }
}
