//! On-disk session snapshots.
//!
//! The engine holds session state in memory; this store writes a JSON
//! snapshot after each orchestrator action so a session survives across CLI
//! invocations. One file per session id under the platform data directory.

use crate::config::get_global_dir;
use crate::error::{Error, Result};
use crate::session::{Session, SessionPhase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub phase: SessionPhase,
    pub product_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Store rooted at the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(get_global_dir()?.join("sessions")))
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        let path = self.session_path(&session.id);
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&path, json).await?;
        debug!(session_id = %session.id, path = %path.display(), "session saved");
        Ok(())
    }

    pub async fn load(&self, id: &str) -> Result<Session> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(Error::NotFound(format!("session {}", id)));
        }
        let contents = fs::read_to_string(&path).await?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("corrupt session file {}: {}", path.display(), e)))
    }

    /// The most recently updated session, if any exist.
    pub async fn load_latest(&self) -> Result<Option<Session>> {
        let mut latest: Option<Session> = None;
        for summary in self.list().await? {
            let session = self.load(&summary.id).await?;
            let newer = latest
                .as_ref()
                .map(|s| session.updated_at > s.updated_at)
                .unwrap_or(true);
            if newer {
                latest = Some(session);
            }
        }
        Ok(latest)
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Session>(&contents) {
                Ok(session) => summaries.push(SessionSummary {
                    id: session.id.clone(),
                    phase: session.phase(),
                    product_name: session.product_data.as_ref().map(|p| p.name.clone()),
                    updated_at: session.updated_at,
                }),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable session file");
                }
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(Error::NotFound(format!("session {}", id)));
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ProductData, SessionAction};
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        (dir, store)
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (_dir, store) = store();
        let mut session = Session::new();
        session
            .apply(SessionAction::Discovered {
                product: ProductData {
                    name: "Aurora Mug".to_string(),
                    angle: "a".to_string(),
                    buyer: "b".to_string(),
                    details: "d".to_string(),
                },
                base_image_url: None,
            })
            .unwrap();

        store.save(&session).await.unwrap();
        let loaded = store.load(&session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(
            loaded.product_data.as_ref().unwrap().name,
            "Aurora Mug"
        );
        assert_eq!(loaded.phase(), SessionPhase::Discovered);
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_orders_by_recency() {
        let (_dir, store) = store();
        let older = Session::new();
        store.save(&older).await.unwrap();
        let mut newer = Session::new();
        newer.set_success("later");
        store.save(&newer).await.unwrap();

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, newer.id);

        let latest = store.load_latest().await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let (_dir, store) = store();
        let session = Session::new();
        store.save(&session).await.unwrap();
        store.delete(&session.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
