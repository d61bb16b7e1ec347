//! The checkpoint trait and the in-memory implementation.

use crate::error::SessionError;
use relay_types::Message;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// Boxed future used by the dyn-compatible checkpoint trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Append-only conversation log keyed by session identifier.
///
/// `commit` stores the caller's full history for the session; callers only
/// ever extend what a previous `load` returned, so a committed log is a
/// superset of every earlier commit.
pub trait Checkpointer: Send + Sync {
    /// Read the committed history for a session (empty if none).
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Vec<Message>, SessionError>>;

    /// Commit the history for a session.
    fn commit<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), SessionError>>;
}

/// In-memory checkpoint: state lives for the process lifetime only.
#[derive(Default)]
pub struct MemoryCheckpointer {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Vec<Message>, SessionError>> {
        Box::pin(async move {
            let sessions = self.sessions.lock().expect("checkpoint lock poisoned");
            Ok(sessions.get(session_id).cloned().unwrap_or_default())
        })
    }

    fn commit<'a>(
        &'a self,
        session_id: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().expect("checkpoint lock poisoned");
            sessions.insert(session_id.to_string(), messages.to_vec());
            Ok(())
        })
    }
}
