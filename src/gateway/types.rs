//! Wire types for the remote generation gateway.
//!
//! Everything crossing the wire is camelCase JSON inside a
//! `{success, data, error}` envelope, except generation dispatches, which may
//! answer with either a job id or an immediate image.

use crate::chat::ChatDirective;
use crate::error::{Error, Result};
use crate::session::{
    AdConcept, AspectRatio, CreativePath, LandingGenerationState, ProductData, SectionCopy,
};
use serde::{Deserialize, Serialize};

/// Standard response envelope used by every JSON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T> {
        if self.success {
            self.data
                .ok_or_else(|| Error::Gateway("gateway returned no data".to_string()))
        } else {
            Err(Error::Gateway(
                self.error
                    .unwrap_or_else(|| "gateway reported failure".to_string()),
            ))
        }
    }
}

/// Discovery input: exactly one of `url` or `image_base64`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

impl DiscoveryRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            image_base64: None,
        }
    }

    pub fn from_image(image_base64: impl Into<String>) -> Self {
        Self {
            url: None,
            image_base64: Some(image_base64.into()),
        }
    }
}

/// Discovery payload: the product DNA plus the identity image the session
/// anchors every later generation to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryData {
    #[serde(flatten)]
    pub product: ProductData,
    pub base_image_url: Option<String>,
}

/// One generation dispatch for a landing section.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGenerationRequest {
    pub product_data: ProductData,
    pub creative_path: CreativePath,
    pub section_id: String,
    pub section_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
    pub is_correction: bool,
    /// Style reference, resolved by the dispatcher's precedence rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    /// Current output image when correcting an existing generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_image_url: Option<String>,
    /// Most recent completed predecessor, for style continuity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuity_image: Option<String>,
    /// Identity anchor captured at discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_image_url: Option<String>,
    pub aspect_ratio: AspectRatio,
}

/// One generation dispatch for an ad creative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdGenerationRequest {
    pub product_data: ProductData,
    pub creative_path: CreativePath,
    pub concept: AdConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
    pub is_correction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_image_url: Option<String>,
    pub aspect_ratio: AspectRatio,
}

/// One video render dispatch from a completed section image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerationRequest {
    pub product_data: ProductData,
    pub section_id: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_instructions: Option<String>,
}

/// What a generation dispatch came back with.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStart {
    /// A long-running job to hand to the poller
    Job { generation_id: String },
    /// The gateway finished synchronously
    Immediate {
        image_url: String,
        copy: Option<SectionCopy>,
    },
}

/// Raw shape of a generation dispatch response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<GenerationJobRef>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub copy: Option<SectionCopy>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJobRef {
    pub generation_id: String,
}

impl GenerationResponse {
    pub fn into_start(self) -> Result<GenerationStart> {
        if !self.success {
            return Err(Error::Gateway(
                self.error
                    .unwrap_or_else(|| "generation request rejected".to_string()),
            ));
        }
        if let Some(job) = self.data {
            return Ok(GenerationStart::Job {
                generation_id: job.generation_id,
            });
        }
        if let Some(image_url) = self.image_url {
            return Ok(GenerationStart::Immediate {
                image_url,
                copy: self.copy,
            });
        }
        Err(Error::Gateway(
            "generation response carried neither a job id nor an image".to_string(),
        ))
    }
}

/// Which status endpoint a job id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    LandingSection,
    Ad,
    Video,
}

impl JobKind {
    pub fn status_path(&self) -> &'static str {
        match self {
            JobKind::LandingSection => "/landing/status",
            JobKind::Ad => "/ads/status",
            JobKind::Video => "/video/status",
        }
    }
}

/// Status payload for a polled job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub done: bool,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub copy: Option<SectionCopy>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Context-bearing chat request; the gateway's agent sees the whole pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_data: Option<ProductData>,
    pub creative_paths: Vec<CreativePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_state: Option<LandingGenerationState>,
}

/// Chat reply: free text plus an optional typed directive the orchestrator
/// applies to the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    #[serde(default, rename = "protocol")]
    pub directive: Option<ChatDirective>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub balance: u64,
}
