//! Chat assistant session.
//!
//! A `ChatSession` is created once with a fixed model and system instruction.
//! Each `send` appends the user's message to the visible transcript, forwards
//! the conversation to the model, and appends the reply. Chat is best-effort:
//! remote failures become a fixed fallback reply instead of an error, and a
//! send issued while another is outstanding is ignored. A reply that arrives
//! after `reset` belongs to the old conversation and is dropped.

use crate::brain::Brain;
use crate::config::ChatConfig;
use crate::types::Message;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

/// A conversational session with the remote model.
pub struct ChatSession {
    /// `None` when no credential was available at startup.
    brain: Option<Arc<Brain>>,
    model: Option<String>,
    system_instruction: String,
    fallback_reply: String,
    /// Everything shown to the user, including fallback replies.
    transcript: Mutex<Vec<Message>>,
    /// Exchanges the remote side has actually seen; failed turns are left out.
    history: Mutex<Vec<Message>>,
    pending: AtomicBool,
    /// Bumped by `reset`; a send only commits if it is unchanged.
    generation: AtomicU64,
}

/// Clears the pending flag when a send finishes, however it finishes.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatSession {
    /// Create a session backed by `brain`.
    pub fn new(brain: Arc<Brain>, config: &ChatConfig) -> Self {
        Self::build(Some(brain), config)
    }

    /// Create a session that never calls out. Every send is a no-op.
    pub fn inert(config: &ChatConfig) -> Self {
        Self::build(None, config)
    }

    fn build(brain: Option<Arc<Brain>>, config: &ChatConfig) -> Self {
        Self {
            brain,
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
            fallback_reply: config.fallback_reply.clone(),
            transcript: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            pending: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Send a message and return the reply.
    ///
    /// Returns `None` without touching the transcript or calling the model
    /// when the message is blank, the session is inert, or another send is
    /// still pending. A remote failure yields `Some(fallback_reply)`. If the
    /// session is reset while the reply is outstanding, the reply is
    /// discarded and `None` is returned.
    pub async fn send(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(brain) = &self.brain else {
            warn!("Chat is unavailable: no API key was configured at startup");
            return None;
        };
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Ignoring chat message while a reply is pending");
            return None;
        }
        let _guard = PendingGuard(&self.pending);
        let generation = self.generation.load(Ordering::Acquire);

        let user_message = Message::user(text);
        self.push_transcript(user_message.clone());

        let mut messages = vec![Message::system(&self.system_instruction)];
        messages.extend(self.history_snapshot());
        messages.push(user_message.clone());

        let result = brain.converse(messages, self.model.clone()).await;
        if self.generation.load(Ordering::Acquire) != generation {
            info!("Discarding chat reply that arrived after a reset");
            return None;
        }

        let reply = match result {
            Ok(reply) => {
                if let Ok(mut history) = self.history.lock() {
                    history.push(user_message);
                    history.push(Message::model(&reply));
                }
                reply
            }
            Err(e) => {
                warn!(error = %e, "Chat request failed, using fallback reply");
                self.fallback_reply.clone()
            }
        };

        self.push_transcript(Message::model(&reply));
        Some(reply)
    }

    /// The visible transcript, in send order.
    pub fn transcript(&self) -> Vec<Message> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether this session was created without a credential.
    pub fn is_inert(&self) -> bool {
        self.brain.is_none()
    }

    /// Start over with an empty conversation.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut t) = self.transcript.lock() {
            t.clear();
        }
        if let Ok(mut h) = self.history.lock() {
            h.clear();
        }
    }

    fn push_transcript(&self, message: Message) {
        if let Ok(mut t) = self.transcript.lock() {
            t.push(message);
        }
    }

    fn history_snapshot(&self) -> Vec<Message> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}
