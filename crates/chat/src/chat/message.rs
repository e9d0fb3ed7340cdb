use std::fmt;

use murmur_llm::MessageId;

use crate::chat::aggregate::PendingReply;

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Core immutable message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    from: Role,
    content: String,
}

impl Message {
    /// Creates a message with a freshly minted id.
    pub fn new(from: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v7(),
            from,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn from(&self) -> Role {
        self.from
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// One row of the message log.
///
/// The log never rewrites a `Pending` entry once its reply arrives; the
/// rendering layer re-evaluates the reply's state on every pass instead.
#[derive(Debug, Clone)]
pub enum MessageLogEntry {
    Resolved(Message),
    Pending(PendingReply),
}

impl MessageLogEntry {
    pub fn as_resolved(&self) -> Option<&Message> {
        match self {
            Self::Resolved(message) => Some(message),
            Self::Pending(_) => None,
        }
    }

    pub fn as_pending(&self) -> Option<&PendingReply> {
        match self {
            Self::Resolved(_) => None,
            Self::Pending(pending) => Some(pending),
        }
    }
}
