use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use murmur_llm::{PendingId, SourceError, SourceResult};

use crate::chat::incremental::StreamPreview;
use crate::chat::message::Message;
use crate::chat::tee::{SplitView, ViewRead};

pub type ReplyResult = Result<Message, SourceError>;

/// Handle to an assistant message that has not arrived yet.
///
/// Clones share one underlying attempt: the reply is produced once, and every
/// clone observes the same `Ok` or `Err`.
#[derive(Clone)]
pub struct PendingReply {
    id: PendingId,
    reply: Shared<BoxFuture<'static, ReplyResult>>,
    preview: Option<StreamPreview>,
}

impl PendingReply {
    fn new(reply: BoxFuture<'static, ReplyResult>) -> Self {
        Self {
            id: PendingId::new_v7(),
            reply: reply.shared(),
            preview: None,
        }
    }

    pub(crate) fn with_preview(mut self, preview: StreamPreview) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn id(&self) -> PendingId {
        self.id
    }

    pub fn preview(&self) -> Option<&StreamPreview> {
        self.preview.as_ref()
    }

    /// Settled result, or `None` while the reply is outstanding. Never polls.
    pub fn peek(&self) -> Option<&ReplyResult> {
        self.reply.peek()
    }

    /// Waits for the shared attempt to settle.
    pub async fn settled(&self) -> ReplyResult {
        self.reply.clone().await
    }

    /// Future that drives the attempt to completion; spawn it once per reply.
    pub fn drive(&self) -> impl Future<Output = ()> + Send + 'static {
        let id = self.id;
        let reply = self.reply.clone();
        async move {
            match reply.await {
                Ok(message) => tracing::debug!(
                    pending_id = %id,
                    message_id = %message.id(),
                    content_len = message.content().len(),
                    "pending reply resolved"
                ),
                Err(error) => tracing::debug!(
                    pending_id = %id,
                    stage = error.stage(),
                    error = %error,
                    "pending reply failed"
                ),
            }
        }
    }
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingReply")
            .field("id", &self.id)
            .field("settled", &self.peek())
            .field("streaming", &self.preview.is_some())
            .finish()
    }
}

/// Reads `view` to its end and resolves to one assistant message holding the
/// concatenated fragments, or to the view's error unchanged.
pub fn aggregate(mut view: SplitView) -> PendingReply {
    PendingReply::new(
        async move {
            let mut content = String::new();
            loop {
                match view.read().await {
                    ViewRead::Fragment(fragment) => content.push_str(&fragment),
                    ViewRead::End => return Ok(Message::assistant(content)),
                    ViewRead::Error(error) => return Err(error),
                }
            }
        }
        .boxed(),
    )
}

/// Maps a whole-reply future into a pending assistant message.
pub fn from_reply<F>(reply: F) -> PendingReply
where
    F: Future<Output = SourceResult<String>> + Send + 'static,
{
    PendingReply::new(reply.map(|result| result.map(Message::assistant)).boxed())
}
