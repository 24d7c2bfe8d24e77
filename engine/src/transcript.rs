//! Append-only conversation log.

use std::sync::atomic::{AtomicU64, Ordering};

use arkaios_types::{Message, MessageDraft, MessageId};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> MessageId {
    MessageId::new(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Ordered message log. Entries are never edited or removed.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, draft: MessageDraft) -> MessageId {
        let id = next_message_id();
        tracing::debug!(%id, role = draft.role().as_str(), "Transcript append");
        self.messages.push(draft.into_message(id));
        id
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages appended at or after `index`, for incremental rendering.
    #[must_use]
    pub fn since(&self, index: usize) -> Vec<Message> {
        self.messages
            .get(index..)
            .map(<[Message]>::to_vec)
            .unwrap_or_default()
    }
}
