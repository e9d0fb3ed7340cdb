//! Simulated assistant backends.
//!
//! A [`ChunkSource`] pushes text fragments into a [`ChunkSink`]; a
//! [`DelayedReplySource`] produces one whole reply after a fixed delay.

mod error;
mod ids;
mod source;
mod synthetic;

pub use error::{GENERIC_FAILURE_MESSAGE, IdError, SourceError, SourceResult};
pub use ids::{MessageId, PendingId, SourceId};
pub use source::{ChunkEvent, ChunkSink, ChunkSource, SourceState, SourceWorker};
pub use synthetic::{
    DEFAULT_CANNED_REPLY, DEFAULT_FAILURE_PROBABILITY, DelayedReplySource, FailureRoll, FixedRoll,
    REQUEST_FAILED_MESSAGE, RandomRoll, ScriptedSource, WordStreamSource, clamp_probability,
};
