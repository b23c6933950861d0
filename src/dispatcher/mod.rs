//! Generation dispatch for landing sections, ad creatives, and videos.
//!
//! The dispatcher turns pipeline state into one gateway request, marks the
//! target pending before the network call resolves, and then drives the job
//! to settlement through the poller. Precondition violations abort before
//! any state is touched; everything after the pending mark settles into the
//! target's record rather than propagating as an error.

use crate::error::{Error, Result};
use crate::gateway::{
    AdGenerationRequest, GenerationGateway, GenerationStart, JobKind, SectionGenerationRequest,
    VideoGenerationRequest,
};
use crate::poller::{await_completion, JobOutcome, PollPolicy};
use crate::session::{AspectRatio, GenerationStatus, Session, SessionAction};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Parameters for one section dispatch.
#[derive(Debug, Clone)]
pub struct SectionDispatch {
    pub section_id: String,
    /// Edit of the existing output instead of a fresh generation
    pub is_correction: bool,
    /// Manual instructions; falls back to the section's chat-supplied ones
    pub extra_instructions: Option<String>,
    pub aspect_ratio: AspectRatio,
    /// Explicit style reference, overriding the session selection
    pub reference_url: Option<String>,
    /// Show placeholder copy while pending (autopilot does this)
    pub placeholder_copy: bool,
}

impl SectionDispatch {
    pub fn fresh(section_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            is_correction: false,
            extra_instructions: None,
            aspect_ratio: AspectRatio::Landscape,
            reference_url: None,
            placeholder_copy: false,
        }
    }
}

/// Parameters for one ad dispatch.
#[derive(Debug, Clone)]
pub struct AdDispatch {
    pub concept_id: String,
    pub is_correction: bool,
    pub extra_instructions: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub reference_url: Option<String>,
    pub placeholder_copy: bool,
    /// Send the request without any style reference, ignoring the session
    /// selection (autopilot ads do this for variety)
    pub omit_reference: bool,
}

impl AdDispatch {
    pub fn fresh(concept_id: impl Into<String>) -> Self {
        Self {
            concept_id: concept_id.into(),
            is_correction: false,
            extra_instructions: None,
            aspect_ratio: AspectRatio::Square,
            reference_url: None,
            placeholder_copy: false,
            omit_reference: false,
        }
    }
}

/// Style-reference precedence: explicit parameter, then the current output
/// when correcting, then the session's selected reference.
pub fn resolve_reference(
    explicit: Option<&str>,
    is_correction: bool,
    current_image: Option<&str>,
    selected: Option<&str>,
) -> Option<String> {
    explicit
        .or_else(|| if is_correction { current_image } else { None })
        .or(selected)
        .map(|s| s.to_string())
}

pub struct Dispatcher {
    session: Arc<RwLock<Session>>,
    gateway: Arc<dyn GenerationGateway>,
    image_policy: PollPolicy,
    video_policy: PollPolicy,
}

impl Dispatcher {
    pub fn new(
        session: Arc<RwLock<Session>>,
        gateway: Arc<dyn GenerationGateway>,
        image_policy: PollPolicy,
        video_policy: PollPolicy,
    ) -> Self {
        Self {
            session,
            gateway,
            image_policy,
            video_policy,
        }
    }

    /// Dispatch one landing-section generation and drive it to settlement.
    ///
    /// Returns `Err` only for precondition and busy rejections, before any
    /// state is mutated. Gateway and poll failures settle into the record
    /// and the session error slot.
    pub async fn generate_section(&self, dispatch: SectionDispatch) -> Result<()> {
        let request = {
            let session = self.session.read().await;
            self.build_section_request(&session, &dispatch)?
        };

        {
            let mut session = self.session.write().await;
            session.apply(SessionAction::StartSection {
                section_id: dispatch.section_id.clone(),
                aspect_ratio: dispatch.aspect_ratio,
                placeholder_copy: dispatch.placeholder_copy,
            })?;
        }

        info!(
            section_id = %dispatch.section_id,
            is_correction = dispatch.is_correction,
            "dispatching section generation"
        );

        let start = match self.gateway.generate_section(&request).await {
            Ok(start) => start,
            Err(e) => {
                self.settle_section(&dispatch.section_id, JobOutcome::Failed {
                    message: e.user_message(),
                })
                .await;
                return Ok(());
            }
        };

        match start {
            GenerationStart::Immediate { image_url, copy } => {
                self.settle_section(
                    &dispatch.section_id,
                    JobOutcome::Completed {
                        image_url: Some(image_url),
                        video_url: None,
                        copy,
                    },
                )
                .await;
            }
            GenerationStart::Job { generation_id } => {
                let outcome = await_completion(&self.image_policy, &generation_id, || {
                    let gateway = Arc::clone(&self.gateway);
                    let id = generation_id.clone();
                    async move { gateway.job_status(JobKind::LandingSection, &id).await }
                })
                .await;
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => JobOutcome::Failed {
                        message: e.user_message(),
                    },
                };
                self.settle_section(&dispatch.section_id, outcome).await;
            }
        }
        Ok(())
    }

    /// Dispatch one ad-creative generation and drive it to settlement.
    pub async fn generate_ad(&self, dispatch: AdDispatch) -> Result<()> {
        let request = {
            let session = self.session.read().await;
            self.build_ad_request(&session, &dispatch)?
        };

        {
            let mut session = self.session.write().await;
            session.apply(SessionAction::StartAd {
                concept_id: dispatch.concept_id.clone(),
                aspect_ratio: dispatch.aspect_ratio,
                placeholder_copy: dispatch.placeholder_copy,
            })?;
        }

        info!(concept_id = %dispatch.concept_id, "dispatching ad generation");

        let start = match self.gateway.generate_ad(&request).await {
            Ok(start) => start,
            Err(e) => {
                self.settle_ad(&dispatch.concept_id, JobOutcome::Failed {
                    message: e.user_message(),
                })
                .await;
                return Ok(());
            }
        };

        match start {
            GenerationStart::Immediate { image_url, copy } => {
                self.settle_ad(
                    &dispatch.concept_id,
                    JobOutcome::Completed {
                        image_url: Some(image_url),
                        video_url: None,
                        copy,
                    },
                )
                .await;
            }
            GenerationStart::Job { generation_id } => {
                let outcome = await_completion(&self.image_policy, &generation_id, || {
                    let gateway = Arc::clone(&self.gateway);
                    let id = generation_id.clone();
                    async move { gateway.job_status(JobKind::Ad, &id).await }
                })
                .await;
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => JobOutcome::Failed {
                        message: e.user_message(),
                    },
                };
                self.settle_ad(&dispatch.concept_id, outcome).await;
            }
        }
        Ok(())
    }

    /// Dispatch one short-video render from a completed section image.
    pub async fn generate_video(
        &self,
        section_id: &str,
        extra_instructions: Option<String>,
    ) -> Result<()> {
        let request = {
            let session = self.session.read().await;
            let product = session
                .product_data
                .clone()
                .ok_or_else(|| Error::Precondition("no product data".to_string()))?;
            let image_url = session
                .landing
                .generations
                .get(section_id)
                .filter(|g| g.status == GenerationStatus::Completed)
                .and_then(|g| g.image_url.clone())
                .ok_or_else(|| {
                    Error::Precondition(format!(
                        "section {} has no completed image to animate",
                        section_id
                    ))
                })?;
            VideoGenerationRequest {
                product_data: product,
                section_id: section_id.to_string(),
                image_url,
                extra_instructions,
            }
        };

        {
            let mut session = self.session.write().await;
            session.apply(SessionAction::StartVideo {
                section_id: section_id.to_string(),
            })?;
        }

        info!(section_id, "dispatching video generation");

        let start = match self.gateway.generate_video(&request).await {
            Ok(start) => start,
            Err(e) => {
                self.settle_video(section_id, JobOutcome::Failed {
                    message: e.user_message(),
                })
                .await;
                return Ok(());
            }
        };

        match start {
            GenerationStart::Immediate { image_url, copy: _ } => {
                // A synchronous video response carries the asset in imageUrl.
                self.settle_video(
                    section_id,
                    JobOutcome::Completed {
                        image_url: None,
                        video_url: Some(image_url),
                        copy: None,
                    },
                )
                .await;
            }
            GenerationStart::Job { generation_id } => {
                let outcome = await_completion(&self.video_policy, &generation_id, || {
                    let gateway = Arc::clone(&self.gateway);
                    let id = generation_id.clone();
                    async move { gateway.job_status(JobKind::Video, &id).await }
                })
                .await;
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => JobOutcome::Failed {
                        message: e.user_message(),
                    },
                };
                self.settle_video(section_id, outcome).await;
            }
        }
        Ok(())
    }

    fn build_section_request(
        &self,
        session: &Session,
        dispatch: &SectionDispatch,
    ) -> Result<SectionGenerationRequest> {
        let product = session
            .product_data
            .clone()
            .ok_or_else(|| Error::Precondition("no product data".to_string()))?;
        let path = session
            .selected_creative_path()
            .cloned()
            .ok_or_else(|| Error::Precondition("no creative path selected".to_string()))?;
        let structure = session
            .landing
            .proposed_structure
            .as_ref()
            .ok_or_else(|| Error::Precondition("no proposed structure".to_string()))?;
        let section = structure
            .section(&dispatch.section_id)
            .ok_or_else(|| Error::NotFound(format!("section {}", dispatch.section_id)))?;

        let current_image = session
            .landing
            .generations
            .get(&dispatch.section_id)
            .and_then(|g| g.image_url.as_deref());
        let reference_url = resolve_reference(
            dispatch.reference_url.as_deref(),
            dispatch.is_correction,
            current_image,
            session.landing.selected_reference_url.as_deref(),
        );
        if reference_url.is_none() && !dispatch.is_correction {
            return Err(Error::Precondition(format!(
                "no style reference available for section {}",
                dispatch.section_id
            )));
        }

        let continuity_image = session
            .landing
            .continuity_image_for(&dispatch.section_id)
            .or(session.landing.base_image_url.as_deref())
            .map(|s| s.to_string());

        debug!(
            section_id = %dispatch.section_id,
            ?reference_url,
            ?continuity_image,
            "resolved section anchors"
        );

        Ok(SectionGenerationRequest {
            product_data: product,
            creative_path: path,
            section_id: section.section_id.clone(),
            section_title: section.title.clone(),
            extra_instructions: dispatch
                .extra_instructions
                .clone()
                .or_else(|| section.extra_instructions.clone()),
            is_correction: dispatch.is_correction,
            reference_url,
            previous_image_url: dispatch
                .is_correction
                .then(|| current_image.map(|s| s.to_string()))
                .flatten(),
            continuity_image,
            base_image_url: session.landing.base_image_url.clone(),
            aspect_ratio: dispatch.aspect_ratio,
        })
    }

    fn build_ad_request(
        &self,
        session: &Session,
        dispatch: &AdDispatch,
    ) -> Result<AdGenerationRequest> {
        let product = session
            .product_data
            .clone()
            .ok_or_else(|| Error::Precondition("no product data".to_string()))?;
        let path = session
            .selected_creative_path()
            .cloned()
            .ok_or_else(|| Error::Precondition("no creative path selected".to_string()))?;
        let concept = session
            .landing
            .ad_concepts
            .iter()
            .find(|c| c.concept_id == dispatch.concept_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("ad concept {}", dispatch.concept_id)))?;

        let current_image = session
            .landing
            .ad_generations
            .get(&dispatch.concept_id)
            .and_then(|g| g.image_url.as_deref());
        // Ads tolerate a missing reference; variety is the point.
        let reference_url = if dispatch.omit_reference {
            None
        } else {
            resolve_reference(
                dispatch.reference_url.as_deref(),
                dispatch.is_correction,
                current_image,
                session.landing.selected_reference_url.as_deref(),
            )
        };

        Ok(AdGenerationRequest {
            product_data: product,
            creative_path: path,
            concept,
            extra_instructions: dispatch.extra_instructions.clone(),
            is_correction: dispatch.is_correction,
            reference_url,
            previous_image_url: dispatch
                .is_correction
                .then(|| current_image.map(|s| s.to_string()))
                .flatten(),
            base_image_url: session.landing.base_image_url.clone(),
            aspect_ratio: dispatch.aspect_ratio,
        })
    }

    async fn settle_section(&self, section_id: &str, outcome: JobOutcome) {
        let mut session = self.session.write().await;
        match outcome {
            JobOutcome::Completed {
                image_url: Some(image_url),
                copy,
                ..
            } => {
                let _ = session.apply(SessionAction::SectionCompleted {
                    section_id: section_id.to_string(),
                    image_url,
                    copy,
                });
                session.set_success(format!("Section {} generated", section_id));
                self.spawn_credit_refresh();
            }
            JobOutcome::Completed { .. } => {
                let _ = session.apply(SessionAction::SectionFailed {
                    section_id: section_id.to_string(),
                });
                session.set_error("Generation completed without an image".to_string());
            }
            JobOutcome::Failed { message } => {
                let _ = session.apply(SessionAction::SectionFailed {
                    section_id: section_id.to_string(),
                });
                session.set_error(message);
            }
        }
    }

    async fn settle_ad(&self, concept_id: &str, outcome: JobOutcome) {
        let mut session = self.session.write().await;
        match outcome {
            JobOutcome::Completed {
                image_url: Some(image_url),
                copy,
                ..
            } => {
                let _ = session.apply(SessionAction::AdCompleted {
                    concept_id: concept_id.to_string(),
                    image_url,
                    copy,
                });
                session.set_success(format!("Ad {} generated", concept_id));
                self.spawn_credit_refresh();
            }
            JobOutcome::Completed { .. } => {
                let _ = session.apply(SessionAction::AdFailed {
                    concept_id: concept_id.to_string(),
                });
                session.set_error("Generation completed without an image".to_string());
            }
            JobOutcome::Failed { message } => {
                let _ = session.apply(SessionAction::AdFailed {
                    concept_id: concept_id.to_string(),
                });
                session.set_error(message);
            }
        }
    }

    async fn settle_video(&self, section_id: &str, outcome: JobOutcome) {
        let mut session = self.session.write().await;
        match outcome {
            JobOutcome::Completed {
                video_url: Some(video_url),
                ..
            } => {
                let _ = session.apply(SessionAction::VideoCompleted {
                    section_id: section_id.to_string(),
                    video_url,
                });
                session.set_success(format!("Video for {} generated", section_id));
                self.spawn_credit_refresh();
            }
            JobOutcome::Completed { .. } => {
                let _ = session.apply(SessionAction::VideoFailed {
                    section_id: section_id.to_string(),
                });
                session.set_error("Render completed without a video".to_string());
            }
            JobOutcome::Failed { message } => {
                let _ = session.apply(SessionAction::VideoFailed {
                    section_id: section_id.to_string(),
                });
                session.set_error(message);
            }
        }
    }

    /// Best-effort credit refresh after a completion. Failures are logged
    /// and never surfaced as orchestration errors.
    fn spawn_credit_refresh(&self) {
        let gateway = Arc::clone(&self.gateway);
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            match gateway.credit_balance().await {
                Ok(balance) => {
                    let mut session = session.write().await;
                    let _ = session.apply(SessionAction::CreditsRefreshed(balance));
                }
                Err(e) => warn!(error = %e, "credit refresh failed"),
            }
        });
    }
}
