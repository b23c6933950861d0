//! Remote generation gateway: trait seam plus the reqwest-backed client.
//!
//! The orchestrator, dispatcher, and poller all talk to the gateway through
//! [`GenerationGateway`], so tests can substitute a stub without any network.

use crate::error::Result;
use crate::session::{AdConcept, CreativePath, LandingLayoutProposal, ProductData};
use async_trait::async_trait;

mod http;
pub mod types;

pub use http::HttpGateway;
pub use types::{
    AdGenerationRequest, ApiEnvelope, ChatMessage, ChatReply, ChatRequest, CreditBalance,
    DiscoveryData, DiscoveryRequest, GenerationResponse, GenerationStart, JobKind, JobStatus,
    SectionGenerationRequest, VideoGenerationRequest,
};

/// The remote generation service the orchestration core drives.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Extract product DNA from a URL or uploaded image.
    async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryData>;

    /// Recommend exactly three creative strategy packages.
    async fn recommend_paths(&self, product: &ProductData) -> Result<Vec<CreativePath>>;

    /// Design the ordered landing-section structure for a creative path.
    async fn design_landing(
        &self,
        product: &ProductData,
        path: &CreativePath,
    ) -> Result<LandingLayoutProposal>;

    /// Dispatch one landing-section generation.
    async fn generate_section(&self, request: &SectionGenerationRequest)
        -> Result<GenerationStart>;

    /// Propose ad creative concepts for a creative path.
    async fn ad_concepts(
        &self,
        product: &ProductData,
        path: &CreativePath,
    ) -> Result<Vec<AdConcept>>;

    /// Dispatch one ad-creative generation.
    async fn generate_ad(&self, request: &AdGenerationRequest) -> Result<GenerationStart>;

    /// Dispatch one short-video render from a completed section image.
    async fn generate_video(&self, request: &VideoGenerationRequest) -> Result<GenerationStart>;

    /// Check a long-running job.
    async fn job_status(&self, kind: JobKind, generation_id: &str) -> Result<JobStatus>;

    /// One conversational turn with full pipeline context.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;

    /// Current credit balance for the authenticated account.
    async fn credit_balance(&self) -> Result<u64>;
}
