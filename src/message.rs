//! Chat transcript types
//!
//! The transcript is the controller's output sink. It is shared between the UI
//! and any in-flight request task, and only ever grows.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A single chat message. Text is markdown-lite (`**bold**`, `*italic*`, newlines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            image: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }
}

/// Append-only, shareable list of messages.
///
/// Clones point at the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Message) {
        tracing::trace!(sender = ?message.sender, "transcript append");
        self.lock().push(message);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the messages at this instant, in arrival order
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // A panicking writer can only have finished a push or not started one.
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
