//! Data model for a creative session.
//!
//! These types mirror the gateway's JSON shapes (camelCase on the wire) and
//! are also what gets snapshotted to disk by the session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// The discovered marketing DNA of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    /// Product name
    pub name: String,
    /// The sales angle the creatives should lead with
    pub angle: String,
    /// Buyer persona description
    pub buyer: String,
    /// Visual details: colors, materials, setting
    pub details: String,
}

/// A partial update to [`ProductData`], as produced by the chat agent's
/// `UpdateDna` directive or manual form edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDataPatch {
    pub name: Option<String>,
    pub angle: Option<String>,
    pub buyer: Option<String>,
    pub details: Option<String>,
}

impl ProductDataPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.angle.is_none() && self.buyer.is_none() && self.details.is_none()
    }
}

/// One of the three creative strategy packages the gateway recommends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativePackage {
    pub id: String,
    pub name: String,
    pub description: String,
    pub visual_style: String,
}

/// A recommended creative strategy. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativePath {
    pub package: CreativePackage,
    pub justification: String,
}

/// One landing-page segment in the proposed structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingSection {
    pub section_id: String,
    pub title: String,
    pub reasoning: String,
    /// Chat-supplied edit instructions, cleared when a generation completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
}

/// The ordered list of landing sections to generate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingLayoutProposal {
    pub sections: Vec<LandingSection>,
}

impl LandingLayoutProposal {
    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.section_id == section_id)
    }

    pub fn section(&self, section_id: &str) -> Option<&LandingSection> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }
}

/// Terminal-or-pending state of one generation record.
///
/// A record only ever moves `Pending -> Completed` or `Pending -> Failed`;
/// regeneration replaces the whole record rather than reverting the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Completed,
    Failed,
}

/// Marketing copy attached to a generated section or ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCopy {
    pub headline: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

impl SectionCopy {
    /// Placeholder shown while the autopilot has dispatched but nothing has
    /// come back yet.
    pub fn placeholder() -> Self {
        Self {
            headline: "Generating...".to_string(),
            body: String::new(),
            cta: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Vertical,
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Landscape
    }
}

/// Generation record for one landing section, keyed by section id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGeneration {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy: Option<SectionCopy>,
    pub aspect_ratio: AspectRatio,
    pub updated_at: DateTime<Utc>,
}

impl SectionGeneration {
    pub fn pending(aspect_ratio: AspectRatio, copy: Option<SectionCopy>) -> Self {
        Self {
            status: GenerationStatus::Pending,
            image_url: None,
            copy,
            aspect_ratio,
            updated_at: Utc::now(),
        }
    }
}

/// One ad creative idea proposed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdConcept {
    pub concept_id: String,
    pub title: String,
    pub hook: String,
}

/// Generation record for one ad creative, keyed by concept id.
pub type AdGeneration = SectionGeneration;

/// Generation record for a short video derived from a completed section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGeneration {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Which creative surface the session is currently working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Landing,
    Ads,
}

/// One unit of autopilot work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AutopilotTarget {
    Section(String),
    Ad(String),
}

impl AutopilotTarget {
    pub fn id(&self) -> &str {
        match self {
            AutopilotTarget::Section(id) | AutopilotTarget::Ad(id) => id,
        }
    }
}

/// The aggregate root for everything downstream of path selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingGenerationState {
    pub phase: Phase,
    pub proposed_structure: Option<LandingLayoutProposal>,
    pub selected_section_id: Option<String>,
    pub selected_reference_url: Option<String>,
    pub generations: HashMap<String, SectionGeneration>,
    pub ad_generations: HashMap<String, AdGeneration>,
    pub ad_concepts: Vec<AdConcept>,
    pub video_generations: HashMap<String, VideoGeneration>,
    pub auto_mode: bool,
    pub auto_queue: VecDeque<AutopilotTarget>,
    /// Identity anchor captured at discovery; never replaced by later output
    pub base_image_url: Option<String>,
}

impl Default for LandingGenerationState {
    fn default() -> Self {
        Self {
            phase: Phase::Landing,
            proposed_structure: None,
            selected_section_id: None,
            selected_reference_url: None,
            generations: HashMap::new(),
            ad_generations: HashMap::new(),
            ad_concepts: Vec::new(),
            video_generations: HashMap::new(),
            auto_mode: false,
            auto_queue: VecDeque::new(),
            base_image_url: None,
        }
    }
}

impl LandingGenerationState {
    /// Id of the entry currently in `Pending` status, if any, across all
    /// three generation maps.
    pub fn pending_target(&self) -> Option<String> {
        self.generations
            .iter()
            .chain(self.ad_generations.iter())
            .find(|(_, g)| g.status == GenerationStatus::Pending)
            .map(|(id, _)| id.clone())
            .or_else(|| {
                self.video_generations
                    .iter()
                    .find(|(_, g)| g.status == GenerationStatus::Pending)
                    .map(|(id, _)| id.clone())
            })
    }

    pub fn has_pending(&self) -> bool {
        self.pending_target().is_some()
    }

    /// The image of the most recently completed section preceding
    /// `section_id` in structural order. Used as the style-continuity
    /// reference for the next section.
    pub fn continuity_image_for(&self, section_id: &str) -> Option<&str> {
        let structure = self.proposed_structure.as_ref()?;
        let index = structure.section_index(section_id)?;
        structure.sections[..index]
            .iter()
            .rev()
            .find_map(|section| {
                self.generations.get(&section.section_id).and_then(|g| {
                    if g.status == GenerationStatus::Completed {
                        g.image_url.as_deref()
                    } else {
                        None
                    }
                })
            })
    }
}

/// The coarse phase of the session state machine, derived from which data
/// exists. Transitions are strictly forward except that discovery restarts
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    NoData,
    Discovered,
    PathsRecommended,
    StructureProposed,
    AdsProposed,
}
