//! Creative-session state and its reducer.
//!
//! All pipeline state lives on [`Session`] and is mutated exclusively through
//! [`Session::apply`] with a typed [`SessionAction`]. The reducer is where
//! the at-most-one-pending invariant is enforced: a `Start*` action while a
//! different target is pending is rejected with [`Error::Busy`], so the
//! invariant holds regardless of how callers interleave.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub mod state;


pub use state::{
    AdConcept, AdGeneration, AspectRatio, AutopilotTarget, CreativePackage, CreativePath,
    GenerationStatus, LandingGenerationState, LandingLayoutProposal, LandingSection, Phase,
    ProductData, ProductDataPatch, SectionCopy, SectionGeneration, SessionPhase, VideoGeneration,
};

/// One creative session: the single source of truth for discovery data,
/// creative paths, the landing/ads pipeline, and the transient notice slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product_data: Option<ProductData>,
    pub creative_paths: Vec<CreativePath>,
    pub selected_path: Option<usize>,
    pub landing: LandingGenerationState,
    /// Last known credit balance, refreshed best-effort after completions
    pub credits: Option<u64>,
    /// Session-global transient error notice; last write wins
    pub error: Option<String>,
    /// Session-global transient success notice; last write wins
    pub success: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed mutations applied through [`Session::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionAction {
    /// Discovery succeeded; resets every downstream artifact
    Discovered {
        product: ProductData,
        base_image_url: Option<String>,
    },
    /// Return to the empty initial state
    Reset,
    PathsRecommended(Vec<CreativePath>),
    /// A creative path was selected and the gateway proposed a structure
    StructureProposed {
        path_index: usize,
        proposal: LandingLayoutProposal,
    },
    AdConceptsProposed(Vec<AdConcept>),
    SetPhase(Phase),
    SelectSection(Option<String>),
    SelectReference(Option<String>),
    UpdateSectionInstructions {
        section_id: String,
        instructions: Option<String>,
    },
    UpdateDna(ProductDataPatch),
    StartSection {
        section_id: String,
        aspect_ratio: AspectRatio,
        placeholder_copy: bool,
    },
    SectionCompleted {
        section_id: String,
        image_url: String,
        copy: Option<SectionCopy>,
    },
    SectionFailed {
        section_id: String,
    },
    StartAd {
        concept_id: String,
        aspect_ratio: AspectRatio,
        placeholder_copy: bool,
    },
    AdCompleted {
        concept_id: String,
        image_url: String,
        copy: Option<SectionCopy>,
    },
    AdFailed {
        concept_id: String,
    },
    StartVideo {
        section_id: String,
    },
    VideoCompleted {
        section_id: String,
        video_url: String,
    },
    VideoFailed {
        section_id: String,
    },
    /// Snapshot every not-yet-completed section/ad into the autopilot queue
    EnqueueAutopilot,
    /// Stop the autopilot and drop queued work; in-flight jobs still settle
    StopAutopilot,
    CreditsRefreshed(u64),
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            product_data: None,
            creative_paths: Vec::new(),
            selected_path: None,
            landing: LandingGenerationState::default(),
            credits: None,
            error: None,
            success: None,
        }
    }

    /// The derived coarse phase of the session state machine.
    pub fn phase(&self) -> SessionPhase {
        if self.product_data.is_none() {
            SessionPhase::NoData
        } else if self.creative_paths.is_empty() {
            SessionPhase::Discovered
        } else if self.landing.proposed_structure.is_none() {
            SessionPhase::PathsRecommended
        } else if self.landing.phase == Phase::Ads {
            SessionPhase::AdsProposed
        } else {
            SessionPhase::StructureProposed
        }
    }

    pub fn selected_creative_path(&self) -> Option<&CreativePath> {
        self.selected_path.and_then(|i| self.creative_paths.get(i))
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.touch();
    }

    pub fn set_success(&mut self, message: impl Into<String>) {
        self.success = Some(message.into());
        self.touch();
    }

    /// Clear both notice slots, the equivalent of the auto-dismiss timer.
    pub fn clear_notices(&mut self) {
        self.error = None;
        self.success = None;
    }

    /// Pop the next autopilot target. Clears auto mode when the queue runs
    /// dry, which is the orchestrator's sole terminal condition. Must be
    /// called under the same lock as the subsequent `Start*` apply.
    pub fn dequeue_autopilot(&mut self) -> Option<AutopilotTarget> {
        let target = self.landing.auto_queue.pop_front();
        if self.landing.auto_queue.is_empty() && target.is_none() {
            self.landing.auto_mode = false;
        }
        self.touch();
        target
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Apply one typed action. Start actions are rejected with
    /// [`Error::Busy`] while a different target is pending; restarting the
    /// same target overwrites its record.
    pub fn apply(&mut self, action: SessionAction) -> Result<()> {
        match action {
            SessionAction::Discovered {
                product,
                base_image_url,
            } => {
                self.product_data = Some(product);
                self.creative_paths.clear();
                self.selected_path = None;
                self.landing = LandingGenerationState {
                    base_image_url,
                    ..LandingGenerationState::default()
                };
                self.error = None;
                self.success = None;
            }
            SessionAction::Reset => {
                let id = self.id.clone();
                let created_at = self.created_at;
                *self = Session::new();
                self.id = id;
                self.created_at = created_at;
            }
            SessionAction::PathsRecommended(paths) => {
                self.require_product()?;
                self.creative_paths = paths;
                self.selected_path = None;
            }
            SessionAction::StructureProposed {
                path_index,
                proposal,
            } => {
                self.require_product()?;
                if path_index >= self.creative_paths.len() {
                    return Err(Error::Session(format!(
                        "creative path index {} out of range",
                        path_index
                    )));
                }
                self.selected_path = Some(path_index);
                self.landing.proposed_structure = Some(proposal);
                self.landing.phase = Phase::Landing;
                self.landing.generations.clear();
                self.landing.selected_section_id = None;
            }
            SessionAction::AdConceptsProposed(concepts) => {
                self.require_product()?;
                self.landing.ad_concepts = concepts;
                self.landing.phase = Phase::Ads;
            }
            SessionAction::SetPhase(phase) => match phase {
                Phase::Landing if self.landing.proposed_structure.is_none() => {
                    return Err(Error::Session(
                        "no landing structure has been proposed yet".to_string(),
                    ));
                }
                Phase::Ads if self.landing.ad_concepts.is_empty() => {
                    return Err(Error::Session(
                        "no ad concepts have been proposed yet".to_string(),
                    ));
                }
                phase => self.landing.phase = phase,
            },
            SessionAction::SelectSection(section_id) => {
                self.landing.selected_section_id = section_id;
            }
            SessionAction::SelectReference(url) => {
                self.landing.selected_reference_url = url;
            }
            SessionAction::UpdateSectionInstructions {
                section_id,
                instructions,
            } => {
                let structure = self
                    .landing
                    .proposed_structure
                    .as_mut()
                    .ok_or_else(|| Error::Session("no proposed structure".to_string()))?;
                let section = structure
                    .sections
                    .iter_mut()
                    .find(|s| s.section_id == section_id)
                    .ok_or_else(|| Error::NotFound(format!("section {}", section_id)))?;
                section.extra_instructions = instructions;
            }
            SessionAction::UpdateDna(patch) => {
                let product = self
                    .product_data
                    .as_mut()
                    .ok_or_else(|| Error::Session("no product data to update".to_string()))?;
                if let Some(name) = patch.name {
                    product.name = name;
                }
                if let Some(angle) = patch.angle {
                    product.angle = angle;
                }
                if let Some(buyer) = patch.buyer {
                    product.buyer = buyer;
                }
                if let Some(details) = patch.details {
                    product.details = details;
                }
            }
            SessionAction::StartSection {
                section_id,
                aspect_ratio,
                placeholder_copy,
            } => {
                self.check_not_busy(&section_id)?;
                let structure = self
                    .landing
                    .proposed_structure
                    .as_ref()
                    .ok_or_else(|| Error::Session("no proposed structure".to_string()))?;
                if structure.section_index(&section_id).is_none() {
                    return Err(Error::NotFound(format!("section {}", section_id)));
                }
                let copy = placeholder_copy.then(SectionCopy::placeholder);
                self.landing
                    .generations
                    .insert(section_id, SectionGeneration::pending(aspect_ratio, copy));
            }
            SessionAction::SectionCompleted {
                section_id,
                image_url,
                copy,
            } => {
                match self.landing.generations.get_mut(&section_id) {
                    Some(record) if record.status == GenerationStatus::Pending => {
                        record.status = GenerationStatus::Completed;
                        record.image_url = Some(image_url);
                        record.copy = copy;
                        record.updated_at = Utc::now();
                    }
                    _ => {
                        warn!(%section_id, "completion for a section that is not pending");
                        return Ok(());
                    }
                }
                // A completed generation consumes the edit instructions that
                // shaped it.
                if let Some(structure) = self.landing.proposed_structure.as_mut() {
                    if let Some(section) = structure
                        .sections
                        .iter_mut()
                        .find(|s| s.section_id == section_id)
                    {
                        section.extra_instructions = None;
                    }
                }
            }
            SessionAction::SectionFailed { section_id } => {
                match self.landing.generations.get_mut(&section_id) {
                    Some(record) if record.status == GenerationStatus::Pending => {
                        record.status = GenerationStatus::Failed;
                        record.updated_at = Utc::now();
                    }
                    _ => warn!(%section_id, "failure for a section that is not pending"),
                }
            }
            SessionAction::StartAd {
                concept_id,
                aspect_ratio,
                placeholder_copy,
            } => {
                self.check_not_busy(&concept_id)?;
                if !self
                    .landing
                    .ad_concepts
                    .iter()
                    .any(|c| c.concept_id == concept_id)
                {
                    return Err(Error::NotFound(format!("ad concept {}", concept_id)));
                }
                let copy = placeholder_copy.then(SectionCopy::placeholder);
                self.landing
                    .ad_generations
                    .insert(concept_id, SectionGeneration::pending(aspect_ratio, copy));
            }
            SessionAction::AdCompleted {
                concept_id,
                image_url,
                copy,
            } => match self.landing.ad_generations.get_mut(&concept_id) {
                Some(record) if record.status == GenerationStatus::Pending => {
                    record.status = GenerationStatus::Completed;
                    record.image_url = Some(image_url);
                    record.copy = copy;
                    record.updated_at = Utc::now();
                }
                _ => warn!(%concept_id, "completion for an ad that is not pending"),
            },
            SessionAction::AdFailed { concept_id } => {
                match self.landing.ad_generations.get_mut(&concept_id) {
                    Some(record) if record.status == GenerationStatus::Pending => {
                        record.status = GenerationStatus::Failed;
                        record.updated_at = Utc::now();
                    }
                    _ => warn!(%concept_id, "failure for an ad that is not pending"),
                }
            }
            SessionAction::StartVideo { section_id } => {
                self.check_not_busy(&section_id)?;
                let source_ready = self
                    .landing
                    .generations
                    .get(&section_id)
                    .map(|g| g.status == GenerationStatus::Completed && g.image_url.is_some())
                    .unwrap_or(false);
                if !source_ready {
                    return Err(Error::Precondition(format!(
                        "section {} has no completed image to animate",
                        section_id
                    )));
                }
                self.landing.video_generations.insert(
                    section_id,
                    VideoGeneration {
                        status: GenerationStatus::Pending,
                        video_url: None,
                        updated_at: Utc::now(),
                    },
                );
            }
            SessionAction::VideoCompleted {
                section_id,
                video_url,
            } => match self.landing.video_generations.get_mut(&section_id) {
                Some(record) if record.status == GenerationStatus::Pending => {
                    record.status = GenerationStatus::Completed;
                    record.video_url = Some(video_url);
                    record.updated_at = Utc::now();
                }
                _ => warn!(%section_id, "completion for a video that is not pending"),
            },
            SessionAction::VideoFailed { section_id } => {
                match self.landing.video_generations.get_mut(&section_id) {
                    Some(record) if record.status == GenerationStatus::Pending => {
                        record.status = GenerationStatus::Failed;
                        record.updated_at = Utc::now();
                    }
                    _ => warn!(%section_id, "failure for a video that is not pending"),
                }
            }
            SessionAction::EnqueueAutopilot => {
                let structure = self
                    .landing
                    .proposed_structure
                    .as_ref()
                    .ok_or_else(|| Error::Precondition("no proposed structure".to_string()))?;
                let mut queue: std::collections::VecDeque<AutopilotTarget> = structure
                    .sections
                    .iter()
                    .filter(|s| {
                        self.landing
                            .generations
                            .get(&s.section_id)
                            .map(|g| g.status != GenerationStatus::Completed)
                            .unwrap_or(true)
                    })
                    .map(|s| AutopilotTarget::Section(s.section_id.clone()))
                    .collect();
                queue.extend(
                    self.landing
                        .ad_concepts
                        .iter()
                        .filter(|c| {
                            self.landing
                                .ad_generations
                                .get(&c.concept_id)
                                .map(|g| g.status != GenerationStatus::Completed)
                                .unwrap_or(true)
                        })
                        .map(|c| AutopilotTarget::Ad(c.concept_id.clone())),
                );
                if queue.is_empty() {
                    return Err(Error::Precondition(
                        "nothing left to generate".to_string(),
                    ));
                }
                self.landing.auto_queue = queue;
                self.landing.auto_mode = true;
            }
            SessionAction::StopAutopilot => {
                self.landing.auto_mode = false;
                self.landing.auto_queue.clear();
            }
            SessionAction::CreditsRefreshed(balance) => {
                self.credits = Some(balance);
            }
        }
        self.touch();
        Ok(())
    }

    fn require_product(&self) -> Result<&ProductData> {
        self.product_data
            .as_ref()
            .ok_or_else(|| Error::Session("no product has been discovered".to_string()))
    }

    /// Reject a start while a different target is pending. Restarting the
    /// same target is allowed so the dispatcher's synchronous pending mark
    /// stays idempotent under the autopilot.
    fn check_not_busy(&self, target_id: &str) -> Result<()> {
        match self.landing.pending_target() {
            Some(pending) if pending != target_id => Err(Error::Busy(pending)),
            _ => Ok(()),
        }
    }
}
