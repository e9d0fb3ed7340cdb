use crate::chat::message::MessageLogEntry;

/// Append-only, ordered list of chat entries for one session.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<MessageLogEntry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: MessageLogEntry) {
        self.entries.push(entry);
    }

    /// Every entry in display order.
    pub fn snapshot(&self) -> &[MessageLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
