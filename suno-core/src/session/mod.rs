//! Session management for conversation history
//!
//! A session is an append-only list of role-tagged messages keyed by an
//! opaque string. Histories are cached in memory behind per-key locks and
//! optionally written through to JSONL files.

pub mod backend;
pub mod manager;
pub mod store;

pub use backend::{JsonlBackend, MemoryBackend, SessionBackend, SessionInfo};
pub use manager::{SessionHandle, SessionManager};
pub use store::{ChatMessage, Role, Session};
