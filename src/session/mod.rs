//! Session and conversation state.
//!
//! This module provides in-memory session storage. A session is started from
//! the text of one uploaded document, carries the instruction string derived
//! from it, and accumulates the user/assistant history.
//!
//! # Architecture
//!
//! - [`Session`]: one conversation over one document
//! - [`SessionStore`]: thread-safe store for all active sessions
//! - [`build_instruction`]: the fixed instruction string for a document
//!
//! # Example
//!
//! ```rust
//! use bilancio_chat::session::SessionStore;
//!
//! let store = SessionStore::new();
//! let session = store.start("A\nB\n");
//! session.append_user("What is the revenue?");
//!
//! assert_eq!(session.messages().len(), 1);
//! assert!(session.instruction().contains("A\nB"));
//! ```

mod instruction;
mod thread;

pub use instruction::{ANALYST_ROLE, build_instruction};
pub use thread::{DEFAULT_SESSION_TIMEOUT, Session, SessionStore, TurnGuard};
