//! Conversation checkpoint storage for Relay.
//!
//! The running history is an append-only log keyed by a session identifier,
//! kept behind a narrow trait so the storage mechanism can be swapped without
//! touching the dispatcher or the agent loop.

pub mod checkpoint;
pub mod error;
pub mod file;

pub use checkpoint::{Checkpointer, MemoryCheckpointer};
pub use error::SessionError;
pub use file::FileCheckpointer;
