//! File-backed checkpoint: one JSON file per session id.

use crate::checkpoint::{BoxFuture, Checkpointer};
use crate::error::SessionError;
use chrono::{DateTime, Utc};
use relay_types::Message;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk shape of one session log.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<Message>,
}

/// Checkpoint store writing each session to `<dir>/<session_id>.json`.
pub struct FileCheckpointer {
    sessions_dir: PathBuf,
}

impl FileCheckpointer {
    /// Create a new store, ensuring the sessions directory exists.
    pub async fn new(dir: PathBuf) -> Result<Self, SessionError> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { sessions_dir: dir })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    async fn read_record(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.session_path(session_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Checkpointer for FileCheckpointer {
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Vec<Message>, SessionError>> {
        Box::pin(async move {
            Ok(self
                .read_record(session_id)
                .await?
                .map(|record| record.messages)
                .unwrap_or_default())
        })
    }

    fn commit<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let created_at = match self.read_record(session_id).await {
                Ok(Some(record)) => record.created_at,
                Ok(None) => Utc::now(),
                Err(e) => {
                    tracing::warn!("Unreadable session record for '{session_id}': {e}");
                    Utc::now()
                }
            };

            let record = SessionRecord {
                session_id: session_id.to_string(),
                created_at,
                updated_at: Utc::now(),
                messages: messages.to_vec(),
            };

            // Atomic write: .tmp → rename
            let path = self.session_path(session_id);
            let tmp_path = path.with_extension("tmp");
            let json = serde_json::to_string_pretty(&record)?;
            tokio::fs::write(&tmp_path, json).await?;
            tokio::fs::rename(&tmp_path, &path).await?;
            Ok(())
        })
    }
}
