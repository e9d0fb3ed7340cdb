/// Deferred assistant replies and their shared attempt.
pub mod aggregate;
/// Event contracts between the session, the view and the shell.
pub mod events;
pub mod incremental;
pub mod log;
/// Domain entities for the message log.
pub mod message;
/// Two-way split of a chunk source.
pub mod tee;
pub mod view;

pub use aggregate::{PendingReply, ReplyResult, aggregate, from_reply};
pub use events::{Submit, SubmitOutcome, ViewChange};
pub use incremental::{AttachOutcome, IncrementalRenderer, StreamPreview};
pub use log::MessageLog;
pub use message::{Message, MessageLogEntry, Role};
pub use tee::{SplitStream, SplitView, ViewRead, ViewSide, split};
pub use view::{DEFAULT_PLACEHOLDER_TEXT, EntryPhase, MessageView, RenderedEntry};
