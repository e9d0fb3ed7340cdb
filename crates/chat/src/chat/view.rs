use std::collections::HashMap;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use murmur_llm::PendingId;

use crate::chat::aggregate::PendingReply;
use crate::chat::events::ViewChange;
use crate::chat::log::MessageLog;
use crate::chat::message::{Message, MessageLogEntry, Role};

pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Thinking...";

/// Render state of one log entry. `Resolved`, `SettledOk` and `SettledError`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    Resolved,
    Pending,
    SettledOk,
    SettledError,
}

/// What the shell should draw for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedEntry {
    Message { from: Role, content: String },
    Placeholder { text: String, streaming: bool },
    Failure { message: String },
}

#[derive(Debug, Clone)]
enum Settlement {
    Ok(Message),
    Err(String),
}

/// Per-entry renderer acting as a fault boundary for every pending reply.
///
/// The first render that sees a reply settled records the outcome; later
/// renders draw from the record. A failed reply only ever turns its own
/// entry into a failure row.
#[derive(Debug)]
pub struct MessageView {
    placeholder: String,
    settled: HashMap<PendingId, Settlement>,
    // Preview fragments each streaming entry showed in its latest render.
    shown_fragments: HashMap<PendingId, usize>,
}

impl Default for MessageView {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_TEXT)
    }
}

impl MessageView {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            settled: HashMap::new(),
            shown_fragments: HashMap::new(),
        }
    }

    /// Text shown for entries with nothing to display yet.
    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder = placeholder.into();
    }

    /// Phase as of the last render; does not look at the reply itself.
    pub fn phase(&self, entry: &MessageLogEntry) -> EntryPhase {
        match entry {
            MessageLogEntry::Resolved(_) => EntryPhase::Resolved,
            MessageLogEntry::Pending(pending) => match self.settled.get(&pending.id()) {
                None => EntryPhase::Pending,
                Some(Settlement::Ok(_)) => EntryPhase::SettledOk,
                Some(Settlement::Err(_)) => EntryPhase::SettledError,
            },
        }
    }

    pub fn render(&mut self, log: &MessageLog) -> Vec<RenderedEntry> {
        log.snapshot()
            .iter()
            .map(|entry| self.render_entry(entry))
            .collect()
    }

    pub fn render_entry(&mut self, entry: &MessageLogEntry) -> RenderedEntry {
        match entry {
            MessageLogEntry::Resolved(message) => message_row(message),
            MessageLogEntry::Pending(pending) => self.render_pending(pending),
        }
    }

    /// True while some entry in `log` has not been seen settled by a render.
    pub fn has_outstanding(&self, log: &MessageLog) -> bool {
        log.snapshot()
            .iter()
            .filter_map(MessageLogEntry::as_pending)
            .any(|pending| !self.settled.contains_key(&pending.id()))
    }

    /// Resolves when an outstanding reply settles or a streaming preview
    /// holds more than the last render showed. Resolves at once if a preview
    /// already grew since that render. Never resolves while nothing is
    /// outstanding.
    pub async fn next_change(&self, log: &MessageLog) -> ViewChange {
        let mut waits: Vec<BoxFuture<'static, ViewChange>> = Vec::new();

        for pending in log.snapshot().iter().filter_map(MessageLogEntry::as_pending) {
            let id = pending.id();
            if self.settled.contains_key(&id) {
                continue;
            }

            let reply = pending.clone();
            waits.push(
                async move {
                    reply.settled().await.ok();
                    ViewChange::Settled(id)
                }
                .boxed(),
            );

            if let Some(preview) = pending.preview()
                && !preview.is_finished()
            {
                let shown = self.shown_fragments.get(&id).copied().unwrap_or(0);
                let mut preview = preview.clone();
                waits.push(
                    async move {
                        if preview.grown_past(shown).await {
                            ViewChange::PreviewGrew(id)
                        } else {
                            // The renderer is gone; settlement will report the rest.
                            future::pending().await
                        }
                    }
                    .boxed(),
                );
            }
        }

        if waits.is_empty() {
            return future::pending().await;
        }

        let (change, _, _) = future::select_all(waits).await;
        change
    }

    fn render_pending(&mut self, pending: &PendingReply) -> RenderedEntry {
        let id = pending.id();
        if let Some(settlement) = self.settled.get(&id) {
            return settlement_row(settlement);
        }

        let Some(result) = pending.peek() else {
            return self.placeholder_row(pending);
        };

        let settlement = match result {
            Ok(message) => {
                tracing::info!(
                    pending_id = %id,
                    message_id = %message.id(),
                    "pending entry settled"
                );
                Settlement::Ok(message.clone())
            }
            Err(error) => {
                tracing::warn!(
                    pending_id = %id,
                    stage = error.stage(),
                    error = %error,
                    "pending entry failed; showing failure in place"
                );
                Settlement::Err(error.user_message())
            }
        };

        let row = settlement_row(&settlement);
        self.settled.insert(id, settlement);
        self.shown_fragments.remove(&id);
        row
    }

    fn placeholder_row(&mut self, pending: &PendingReply) -> RenderedEntry {
        match pending.preview() {
            Some(preview) => {
                let (text, fragments) = preview.snapshot();
                self.shown_fragments.insert(pending.id(), fragments);
                RenderedEntry::Placeholder {
                    text: if text.is_empty() {
                        self.placeholder.clone()
                    } else {
                        text
                    },
                    streaming: true,
                }
            }
            None => RenderedEntry::Placeholder {
                text: self.placeholder.clone(),
                streaming: false,
            },
        }
    }
}

fn message_row(message: &Message) -> RenderedEntry {
    RenderedEntry::Message {
        from: message.from(),
        content: message.content().to_string(),
    }
}

fn settlement_row(settlement: &Settlement) -> RenderedEntry {
    match settlement {
        Settlement::Ok(message) => message_row(message),
        Settlement::Err(message) => RenderedEntry::Failure {
            message: message.clone(),
        },
    }
}
