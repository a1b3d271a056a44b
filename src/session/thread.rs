//! Conversation session and session storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::llm::{ApiKey, Message};

use super::instruction::build_instruction;

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A single conversation session over one loaded document.
///
/// The document text and instruction string are fixed at [`Session::start`].
/// The history only grows. Cloning is cheap and shares state.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    /// Extracted statement text.
    document: String,
    /// Instruction string derived from `document`.
    instruction: String,
    /// Credential used for generation requests.
    credential: RwLock<Option<ApiKey>>,
    /// Conversation messages.
    messages: RwLock<Vec<Message>>,
    /// Session creation time.
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
    /// Set while a reply is being generated.
    turn_active: AtomicBool,
}

/// Exclusive right to run one turn on a session.
///
/// Released when dropped.
#[derive(Debug)]
pub struct TurnGuard {
    session: Session,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.session.inner.turn_active.store(false, Ordering::Release);
    }
}

impl Session {
    /// Start a session over `document_text` with an empty history.
    pub fn start(id: impl Into<String>, document_text: impl Into<String>) -> Self {
        let document = document_text.into();
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id: id.into(),
                instruction: build_instruction(&document),
                document,
                credential: RwLock::new(None),
                messages: RwLock::new(Vec::new()),
                created_at: now,
                last_activity: RwLock::new(now),
                turn_active: AtomicBool::new(false),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The extracted document text.
    #[must_use]
    pub fn document_text(&self) -> &str {
        &self.inner.document
    }

    /// The instruction string sent with every request.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.inner.instruction
    }

    /// The credential, if one was supplied.
    #[must_use]
    pub fn credential(&self) -> Option<ApiKey> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the credential.
    pub fn set_credential(&self, key: Option<ApiKey>) {
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = key;
        self.touch();
    }

    /// Claim the session for one turn.
    ///
    /// Returns `None` while another turn holds it.
    #[must_use]
    pub fn try_begin_turn(&self) -> Option<TurnGuard> {
        self.inner
            .turn_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TurnGuard {
                session: self.clone(),
            })
    }

    /// Whether a turn is currently running.
    #[must_use]
    pub fn turn_in_progress(&self) -> bool {
        self.inner.turn_active.load(Ordering::Acquire)
    }

    /// Append a user message. Returns the new history length.
    pub fn append_user(&self, content: impl Into<String>) -> usize {
        self.append(Message::user(content))
    }

    /// Append an assistant message. Returns the new history length.
    pub fn append_assistant(&self, content: impl Into<String>) -> usize {
        self.append(Message::assistant(content))
    }

    fn append(&self, message: Message) -> usize {
        let mut guard = self
            .inner
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.push(message);
        let len = guard.len();
        drop(guard);
        self.touch();
        len
    }

    /// Snapshot of the conversation, in insertion order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the number of messages in the conversation.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Session creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Update the last activity timestamp.
    fn touch(&self) {
        *self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    /// Check if the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        // A negative span means clock skew; treat as fresh.
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

/// Thread-safe store for sessions.
///
/// Provides methods for starting, retrieving, and cleaning up sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session over `document_text` under a fresh ID.
    pub fn start(&self, document_text: impl Into<String>) -> Session {
        let id = Uuid::new_v4().to_string();
        self.replace(id, document_text)
    }

    /// Start a session under `id`, discarding any previous session with that ID.
    ///
    /// Loading a new document resets the conversation.
    pub fn replace(&self, id: impl Into<String>, document_text: impl Into<String>) -> Session {
        let session = Session::start(id, document_text);
        let previous = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().to_string(), session.clone());

        if let Some(previous) = previous {
            tracing::info!(
                session_id = %session.id(),
                discarded_messages = previous.message_count(),
                "Session reset by new document"
            );
        }
        session
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Get the number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        before - guard.len()
    }

    /// List all session IDs.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
