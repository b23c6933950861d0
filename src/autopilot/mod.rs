//! Unattended queue-driven generation.
//!
//! The autopilot is a single consumer over the FIFO snapshot the reducer
//! built at start time. Each iteration dequeues one target, waits a short
//! cooldown, and drives the dispatcher to settlement before looking at the
//! queue again, so nothing is ever dispatched while another job is pending.
//! Stopping clears the queue; the job already in flight still settles.

use crate::config::ReferenceCatalog;
use crate::dispatcher::{AdDispatch, Dispatcher, SectionDispatch};
use crate::error::Result;
use crate::session::{AutopilotTarget, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{info, warn};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

pub struct Autopilot {
    session: Arc<RwLock<Session>>,
    dispatcher: Arc<Dispatcher>,
    references: ReferenceCatalog,
    cooldown: Duration,
}

impl Autopilot {
    pub fn new(
        session: Arc<RwLock<Session>>,
        dispatcher: Arc<Dispatcher>,
        references: ReferenceCatalog,
    ) -> Self {
        Self {
            session,
            dispatcher,
            references,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Drain the queue. Returns once auto mode has been cleared, either by
    /// the queue running dry or by an explicit stop.
    pub async fn run(&self) -> Result<()> {
        loop {
            let target = {
                let mut session = self.session.write().await;
                if !session.landing.auto_mode {
                    info!("autopilot stopped");
                    break;
                }
                match session.dequeue_autopilot() {
                    Some(target) => target,
                    None => {
                        info!("autopilot queue drained");
                        break;
                    }
                }
            };

            sleep(self.cooldown).await;

            // A manually dispatched job may still be in flight; hold the
            // dequeued target until it settles.
            if !self.wait_until_idle().await {
                info!("autopilot stopped while waiting");
                break;
            }

            match target {
                AutopilotTarget::Section(section_id) => {
                    // Landing jobs need a style reference; fall back to a
                    // random catalog pick when the user has not selected one.
                    let reference_url = {
                        let session = self.session.read().await;
                        match session.landing.selected_reference_url {
                            Some(_) => None,
                            None => self.references.pick_random().map(|s| s.to_string()),
                        }
                    };
                    let dispatch = SectionDispatch {
                        reference_url,
                        placeholder_copy: true,
                        ..SectionDispatch::fresh(section_id.clone())
                    };
                    if let Err(e) = self.dispatcher.generate_section(dispatch).await {
                        warn!(%section_id, error = %e, "autopilot skipped section");
                    }
                }
                AutopilotTarget::Ad(concept_id) => {
                    // Ads deliberately go out without a reference so each
                    // creative lands somewhere different, even when the user
                    // has selected one for the landing page.
                    let dispatch = AdDispatch {
                        placeholder_copy: true,
                        omit_reference: true,
                        ..AdDispatch::fresh(concept_id.clone())
                    };
                    if let Err(e) = self.dispatcher.generate_ad(dispatch).await {
                        warn!(%concept_id, error = %e, "autopilot skipped ad");
                    }
                }
            }
        }
        Ok(())
    }

    /// Block until nothing is pending. Returns `false` when auto mode was
    /// cleared while waiting.
    async fn wait_until_idle(&self) -> bool {
        loop {
            {
                let session = self.session.read().await;
                if !session.landing.auto_mode {
                    return false;
                }
                if !session.landing.has_pending() {
                    return true;
                }
            }
            sleep(self.cooldown).await;
        }
    }
}
