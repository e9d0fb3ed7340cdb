use std::sync::Arc;

use murmur_llm::FailureRoll;

use crate::chat::aggregate::{PendingReply, aggregate, from_reply};
use crate::chat::events::{Submit, SubmitOutcome};
use crate::chat::incremental::{AttachOutcome, IncrementalRenderer};
use crate::chat::log::MessageLog;
use crate::chat::message::{Message, MessageLogEntry};
use crate::chat::tee::{SplitStream, split};
use crate::settings::{ChatSettings, ReplyMode, SettingsError, SettingsStore};

/// One chat session: the message log plus whatever produces assistant replies.
///
/// Backing work is spawned on the ambient tokio runtime and runs to completion
/// or failure; nothing is ever cancelled.
pub struct ChatSession {
    store: SettingsStore,
    roll: Box<dyn FailureRoll>,
    log: MessageLog,
}

impl ChatSession {
    pub fn new(store: SettingsStore, roll: Box<dyn FailureRoll>) -> Self {
        Self {
            store,
            roll,
            log: MessageLog::new(),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.store.settings()
    }

    pub fn update_settings(&self, settings: ChatSettings) -> Result<(), SettingsError> {
        self.store.update(settings)
    }

    /// Appends the user message and then its pending assistant reply.
    /// Blank input appends nothing.
    pub fn submit_message(&mut self, text: &str) -> SubmitOutcome {
        let Some(submit) = Submit::parse(text) else {
            tracing::debug!("ignoring blank submission");
            return SubmitOutcome::Rejected;
        };

        let settings = self.store.settings();
        let user_message = Message::user(submit.content);
        let user_message_id = user_message.id();

        let pending = match settings.reply_mode {
            ReplyMode::Streaming => self.start_streaming_reply(&settings),
            ReplyMode::Deferred => self.start_deferred_reply(&settings),
        };
        let pending_id = pending.id();

        self.log.append(MessageLogEntry::Resolved(user_message));
        self.log.append(MessageLogEntry::Pending(pending));

        tracing::info!(
            user_message_id = %user_message_id,
            pending_id = %pending_id,
            reply_mode = ?settings.reply_mode,
            entries = self.log.len(),
            "submitted message"
        );

        SubmitOutcome::Accepted {
            user_message_id,
            pending_id,
        }
    }

    fn start_streaming_reply(&self, settings: &ChatSettings) -> PendingReply {
        let SplitStream {
            left,
            right,
            worker,
        } = split(settings.stream_source());

        // Both consumers take their views before the worker is spawned, so
        // neither can miss a fragment.
        let (mut renderer, preview) = IncrementalRenderer::new();
        let attached = renderer.attach(right);
        if attached != AttachOutcome::Attached {
            tracing::warn!(
                outcome = ?attached,
                "fresh renderer declined its view; the reply will show no preview"
            );
        }
        let pending = aggregate(left).with_preview(preview);

        tokio::spawn(pending.drive());
        tokio::spawn(renderer.run());
        tokio::spawn(worker);
        pending
    }

    fn start_deferred_reply(&mut self, settings: &ChatSettings) -> PendingReply {
        let reply = settings.reply_source().respond(self.roll.as_mut());
        let pending = from_reply(reply);
        tokio::spawn(pending.drive());
        pending
    }
}
