//! The imperative action surface of the generation engine.
//!
//! Every user- or chat-initiated operation goes through [`Orchestrator`].
//! Errors never escape an action: gateway, transport, and poll failures are
//! absorbed into the session's transient error slot, and precondition
//! violations abort with a warning log only, because they mean "not ready
//! yet" rather than "broken". The `Result` returned by each action is
//! reserved for local faults such as session persistence.

use crate::autopilot::Autopilot;
use crate::chat::ChatDirective;
use crate::config::Config;
use crate::dispatcher::{AdDispatch, Dispatcher, SectionDispatch};
use crate::error::{Error, Result};
use crate::gateway::{ChatMessage, ChatRequest, DiscoveryRequest, GenerationGateway, HttpGateway};
use crate::session::{Phase, Session, SessionAction};
use crate::storage::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub struct Orchestrator {
    session: Arc<RwLock<Session>>,
    gateway: Arc<dyn GenerationGateway>,
    dispatcher: Arc<Dispatcher>,
    references: crate::config::ReferenceCatalog,
    autopilot_cooldown: Duration,
    store: Option<SessionStore>,
    chat_history: Mutex<Vec<ChatMessage>>,
}

impl Orchestrator {
    /// Build an orchestrator over an existing session and gateway.
    pub fn new(
        config: &Config,
        gateway: Arc<dyn GenerationGateway>,
        session: Session,
        store: Option<SessionStore>,
    ) -> Self {
        let session = Arc::new(RwLock::new(session));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&session),
            Arc::clone(&gateway),
            (&config.poll.image).into(),
            (&config.poll.video).into(),
        ));
        Self {
            session,
            gateway,
            dispatcher,
            references: config.references.clone(),
            autopilot_cooldown: crate::autopilot::DEFAULT_COOLDOWN,
            store,
            chat_history: Mutex::new(Vec::new()),
        }
    }

    /// Build an orchestrator with the HTTP gateway from config.
    pub fn from_config(
        config: &Config,
        session: Session,
        store: Option<SessionStore>,
    ) -> Result<Self> {
        let gateway: Arc<dyn GenerationGateway> = Arc::new(HttpGateway::new(&config.gateway)?);
        Ok(Self::new(config, gateway, session, store))
    }

    /// Shorten the autopilot cooldown, mainly for tests.
    pub fn with_autopilot_cooldown(mut self, cooldown: Duration) -> Self {
        self.autopilot_cooldown = cooldown;
        self
    }

    pub fn session(&self) -> Arc<RwLock<Session>> {
        Arc::clone(&self.session)
    }

    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Discover product DNA from a URL or image. Always starts a fresh
    /// creative pipeline, whatever state the session was in.
    pub async fn discover(&self, request: DiscoveryRequest) -> Result<()> {
        info!("running product discovery");
        match self.gateway.discover(&request).await {
            Ok(data) => {
                let mut session = self.session.write().await;
                session.apply(SessionAction::Discovered {
                    product: data.product,
                    base_image_url: data.base_image_url,
                })?;
                session.set_success("Product DNA discovered");
            }
            Err(e) => {
                warn!(error = %e, "discovery failed");
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Return to the empty initial state.
    pub async fn reset_discovery(&self) -> Result<()> {
        self.session.write().await.apply(SessionAction::Reset)?;
        self.chat_history.lock().await.clear();
        self.persist().await
    }

    /// Ask the gateway for the three creative strategy packages.
    pub async fn get_creative_recommendations(&self) -> Result<()> {
        let product = match self.session.read().await.product_data.clone() {
            Some(product) => product,
            None => {
                warn!("recommendation requested before discovery, skipping");
                return Ok(());
            }
        };

        match self.gateway.recommend_paths(&product).await {
            Ok(paths) if paths.len() == 3 => {
                let mut session = self.session.write().await;
                session.apply(SessionAction::PathsRecommended(paths))?;
                session.set_success("Creative paths recommended");
            }
            Ok(paths) => {
                warn!(count = paths.len(), "gateway returned wrong number of paths");
                self.session
                    .write()
                    .await
                    .set_error("Gateway returned an unexpected number of creative paths");
            }
            Err(e) => {
                warn!(error = %e, "recommendation failed");
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Select a creative path and design the landing structure for it.
    pub async fn generate_landing_proposal(&self, path_index: usize) -> Result<()> {
        let (product, path) = {
            let session = self.session.read().await;
            let product = match session.product_data.clone() {
                Some(p) => p,
                None => {
                    warn!("structure design requested before discovery, skipping");
                    return Ok(());
                }
            };
            let path = match session.creative_paths.get(path_index).cloned() {
                Some(p) => p,
                None => {
                    warn!(path_index, "creative path index out of range, skipping");
                    return Ok(());
                }
            };
            (product, path)
        };

        match self.gateway.design_landing(&product, &path).await {
            Ok(proposal) => {
                let mut session = self.session.write().await;
                session.apply(SessionAction::StructureProposed {
                    path_index,
                    proposal,
                })?;
                session.set_success("Landing structure proposed");
            }
            Err(e) => {
                warn!(error = %e, "landing design failed");
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Ask the gateway for ad concepts; switches the session to the ads
    /// phase.
    pub async fn get_ad_concepts(&self) -> Result<()> {
        let (product, path) = {
            let session = self.session.read().await;
            match (
                session.product_data.clone(),
                session.selected_creative_path().cloned(),
            ) {
                (Some(product), Some(path)) => (product, path),
                _ => {
                    warn!("ad concepts requested before a path was selected, skipping");
                    return Ok(());
                }
            }
        };

        match self.gateway.ad_concepts(&product, &path).await {
            Ok(concepts) => {
                let mut session = self.session.write().await;
                session.apply(SessionAction::AdConceptsProposed(concepts))?;
                session.set_success("Ad concepts proposed");
            }
            Err(e) => {
                warn!(error = %e, "ad concept generation failed");
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    pub async fn select_section(&self, section_id: Option<String>) -> Result<()> {
        self.session
            .write()
            .await
            .apply(SessionAction::SelectSection(section_id))?;
        self.persist().await
    }

    pub async fn select_reference(&self, url: Option<String>) -> Result<()> {
        self.session
            .write()
            .await
            .apply(SessionAction::SelectReference(url))?;
        self.persist().await
    }

    pub async fn update_section_instructions(
        &self,
        section_id: String,
        instructions: Option<String>,
    ) -> Result<()> {
        let applied = self.session.write().await.apply(
            SessionAction::UpdateSectionInstructions {
                section_id,
                instructions,
            },
        );
        if let Err(e) = applied {
            self.session.write().await.set_error(e.user_message());
        }
        self.persist().await
    }

    /// Toggle between the landing and ads surfaces without resetting
    /// generation data.
    pub async fn set_phase(&self, phase: Phase) -> Result<()> {
        let applied = self.session.write().await.apply(SessionAction::SetPhase(phase));
        if let Err(e) = applied {
            self.session.write().await.set_error(e.user_message());
        }
        self.persist().await
    }

    /// Generate one landing section and wait for it to settle.
    pub async fn generate_section(&self, dispatch: SectionDispatch) -> Result<()> {
        match self.dispatcher.generate_section(dispatch).await {
            Ok(()) => {}
            Err(Error::Precondition(reason)) | Err(Error::NotFound(reason)) => {
                warn!(%reason, "section generation skipped");
            }
            Err(e) => {
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Generate one ad creative and wait for it to settle.
    pub async fn generate_ad_image(&self, dispatch: AdDispatch) -> Result<()> {
        match self.dispatcher.generate_ad(dispatch).await {
            Ok(()) => {}
            Err(Error::Precondition(reason)) | Err(Error::NotFound(reason)) => {
                warn!(%reason, "ad generation skipped");
            }
            Err(e) => {
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Render a short video from a completed section image.
    pub async fn generate_video(
        &self,
        section_id: &str,
        extra_instructions: Option<String>,
    ) -> Result<()> {
        match self
            .dispatcher
            .generate_video(section_id, extra_instructions)
            .await
        {
            Ok(()) => {}
            Err(Error::Precondition(reason)) | Err(Error::NotFound(reason)) => {
                warn!(%reason, "video generation skipped");
            }
            Err(e) => {
                self.session.write().await.set_error(e.user_message());
            }
        }
        self.persist().await
    }

    /// Queue every unfinished section and ad, then drain the queue one job
    /// at a time. Returns after the queue empties or a stop clears it.
    pub async fn start_auto_generation(&self) -> Result<()> {
        let enqueued = self.session.write().await.apply(SessionAction::EnqueueAutopilot);
        if let Err(e) = enqueued {
            warn!(error = %e, "autopilot not started");
            return Ok(());
        }

        let worker = Autopilot::new(
            self.session(),
            Arc::clone(&self.dispatcher),
            self.references.clone(),
        )
        .with_cooldown(self.autopilot_cooldown);
        worker.run().await?;
        self.persist().await
    }

    /// Stop the autopilot: no further dispatches, queued work dropped. A job
    /// already in flight still settles.
    pub async fn stop_auto_generation(&self) -> Result<()> {
        self.session
            .write()
            .await
            .apply(SessionAction::StopAutopilot)?;
        self.persist().await
    }

    /// One conversational turn. Applies any typed directive the agent sends
    /// back and returns the reply text.
    pub async fn chat(&self, message: String) -> Result<Option<String>> {
        let request = {
            let session = self.session.read().await;
            let mut history = self.chat_history.lock().await;
            history.push(ChatMessage::user(message));
            ChatRequest {
                messages: history.clone(),
                product_data: session.product_data.clone(),
                creative_paths: session.creative_paths.clone(),
                landing_state: Some(session.landing.clone()),
            }
        };

        let reply = match self.gateway.chat(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "chat turn failed");
                self.session.write().await.set_error(e.user_message());
                return Ok(None);
            }
        };

        self.chat_history
            .lock()
            .await
            .push(ChatMessage::assistant(reply.text.clone()));

        if let Some(directive) = reply.directive {
            self.apply_directive(directive).await?;
        }

        self.persist().await?;
        Ok(Some(reply.text))
    }

    async fn apply_directive(&self, directive: ChatDirective) -> Result<()> {
        match directive {
            ChatDirective::UpdateDna(patch) => {
                if patch.is_empty() {
                    warn!("chat sent an empty DNA update, ignoring");
                    return Ok(());
                }
                let applied = self
                    .session
                    .write()
                    .await
                    .apply(SessionAction::UpdateDna(patch));
                if let Err(e) = applied {
                    warn!(error = %e, "chat DNA update rejected");
                }
            }
            ChatDirective::UpdateSection {
                section_id,
                extra_instructions,
            } => {
                let applied =
                    self.session
                        .write()
                        .await
                        .apply(SessionAction::UpdateSectionInstructions {
                            section_id,
                            instructions: Some(extra_instructions),
                        });
                if let Err(e) = applied {
                    warn!(error = %e, "chat section update rejected");
                }
            }
            ChatDirective::RegenerateStructure => {
                let path_index = self.session.read().await.selected_path;
                match path_index {
                    Some(index) => self.generate_landing_proposal(index).await?,
                    None => warn!("chat asked to regenerate structure with no path selected"),
                }
            }
        }
        Ok(())
    }

    /// Clear the transient notice slots, as the auto-dismiss timer would.
    pub async fn clear_notices(&self) -> Result<()> {
        self.session.write().await.clear_notices();
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        if let Some(store) = &self.store {
            let session = self.session.read().await.clone();
            store.save(&session).await?;
        }
        Ok(())
    }
}
