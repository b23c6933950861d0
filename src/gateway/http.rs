//! HTTP implementation of the generation gateway.

use super::types::*;
use super::GenerationGateway;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::session::{AdConcept, CreativePath, LandingLayoutProposal, ProductData};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use url::Url;

/// reqwest-backed gateway client. One shared `Client` with a request
/// timeout; bearer auth when an API key is configured.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        // `Url::join` treats a base without a trailing slash as a file and
        // would drop its last path segment, so normalize before parsing.
        let normalized = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("Invalid gateway base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid endpoint path {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "gateway POST");
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "gateway GET");
        let response = self
            .authorize(self.client.get(url))
            .query(query)
            .send()
            .await?;
        Self::parse(path, response).await
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(Error::Gateway(
                "Invalid or missing API key".to_string(),
            )),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::Gateway(
                "Rate limit exceeded, try again shortly".to_string(),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Gateway(format!(
                    "{} returned {}: {}",
                    path,
                    status,
                    body.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}

#[async_trait]
impl GenerationGateway for HttpGateway {
    async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryData> {
        let envelope: ApiEnvelope<DiscoveryData> = self.post("/discovery", request).await?;
        envelope.into_result()
    }

    async fn recommend_paths(&self, product: &ProductData) -> Result<Vec<CreativePath>> {
        let envelope: ApiEnvelope<Vec<CreativePath>> = self
            .post("/creative/recommend", &json!({ "productData": product }))
            .await?;
        envelope.into_result()
    }

    async fn design_landing(
        &self,
        product: &ProductData,
        path: &CreativePath,
    ) -> Result<LandingLayoutProposal> {
        let envelope: ApiEnvelope<LandingLayoutProposal> = self
            .post(
                "/landing/design",
                &json!({ "productData": product, "creativePath": path }),
            )
            .await?;
        envelope.into_result()
    }

    async fn generate_section(
        &self,
        request: &SectionGenerationRequest,
    ) -> Result<GenerationStart> {
        let response: GenerationResponse =
            self.post("/landing/generate-section", request).await?;
        response.into_start()
    }

    async fn ad_concepts(
        &self,
        product: &ProductData,
        path: &CreativePath,
    ) -> Result<Vec<AdConcept>> {
        let envelope: ApiEnvelope<Vec<AdConcept>> = self
            .post(
                "/ads/concepts",
                &json!({ "productData": product, "creativePath": path }),
            )
            .await?;
        envelope.into_result()
    }

    async fn generate_ad(&self, request: &AdGenerationRequest) -> Result<GenerationStart> {
        let response: GenerationResponse = self.post("/ads/generate-image", request).await?;
        response.into_start()
    }

    async fn generate_video(&self, request: &VideoGenerationRequest) -> Result<GenerationStart> {
        let response: GenerationResponse = self.post("/video/generate", request).await?;
        response.into_start()
    }

    async fn job_status(&self, kind: JobKind, generation_id: &str) -> Result<JobStatus> {
        self.get(kind.status_path(), &[("id", generation_id)]).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let envelope: ApiEnvelope<ChatReply> = self.post("/chat", request).await?;
        envelope.into_result()
    }

    async fn credit_balance(&self) -> Result<u64> {
        let envelope: ApiEnvelope<CreditBalance> = self.get("/credits", &[]).await?;
        Ok(envelope.into_result()?.balance)
    }
}
