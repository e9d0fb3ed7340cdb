use murmur_llm::{MessageId, PendingId};

/// A validated user submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }

        Some(Self {
            content: text.to_string(),
        })
    }
}

/// What `submit_message` did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted {
        user_message_id: MessageId,
        pending_id: PendingId,
    },
    /// Blank input; nothing was appended.
    Rejected,
}

/// Why the rendering layer should redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Settled(PendingId),
    PreviewGrew(PendingId),
}

impl ViewChange {
    pub fn pending_id(self) -> PendingId {
        match self {
            Self::Settled(id) | Self::PreviewGrew(id) => id,
        }
    }
}
