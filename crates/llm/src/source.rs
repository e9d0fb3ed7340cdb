use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::error::SourceError;
use super::ids::SourceId;

/// Emission task for one chunk source; the caller spawns it.
pub type SourceWorker = BoxFuture<'static, ()>;

/// One item delivered to every consumer of a chunk source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    Fragment(String),
    Completed,
    Failed(SourceError),
}

/// Emission lifecycle of a chunk source. `Completed` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    #[default]
    NotStarted,
    Emitting,
    Completed,
    Failed,
}

impl SourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Produces an ordered run of text fragments followed by one terminal signal.
///
/// `start` only builds the worker. Nothing is emitted until the caller spawns
/// the returned future, so every consumer can attach to the sink's outputs first.
pub trait ChunkSource: Send + 'static {
    fn start(self, sink: ChunkSink) -> SourceWorker
    where
        Self: Sized;
}

/// Write side handed to a [`ChunkSource`].
///
/// Every event is pushed to all outputs synchronously, in production order.
/// The terminal methods consume the sink, so a source can signal completion
/// or failure exactly once. A sink dropped before either reports
/// [`SourceError::StreamTruncated`] to its consumers.
pub struct ChunkSink {
    source_id: SourceId,
    outputs: Vec<mpsc::UnboundedSender<ChunkEvent>>,
    state: SourceState,
    emitted: usize,
}

impl ChunkSink {
    pub fn new(source_id: SourceId, outputs: Vec<mpsc::UnboundedSender<ChunkEvent>>) -> Self {
        Self {
            source_id,
            outputs,
            state: SourceState::NotStarted,
            emitted: 0,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Pushes one fragment. Returns `false` once every consumer has gone away.
    pub fn chunk(&mut self, fragment: impl Into<String>) -> bool {
        self.state = SourceState::Emitting;
        self.emitted += 1;
        self.broadcast(ChunkEvent::Fragment(fragment.into()))
    }

    pub fn complete(mut self) {
        tracing::debug!(
            source_id = %self.source_id,
            emitted = self.emitted,
            "chunk source completed"
        );
        self.finish(ChunkEvent::Completed, SourceState::Completed);
    }

    pub fn fail(mut self, error: SourceError) {
        tracing::debug!(
            source_id = %self.source_id,
            emitted = self.emitted,
            stage = error.stage(),
            error = %error,
            "chunk source failed"
        );
        self.finish(ChunkEvent::Failed(error), SourceState::Failed);
    }

    fn finish(&mut self, event: ChunkEvent, state: SourceState) {
        self.state = state;
        self.broadcast(event);
        self.outputs.clear();
    }

    fn broadcast(&mut self, event: ChunkEvent) -> bool {
        // A closed output means that consumer was dropped; the others keep receiving.
        self.outputs.retain(|output| output.send(event.clone()).is_ok());
        !self.outputs.is_empty()
    }
}

impl Drop for ChunkSink {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        tracing::warn!(
            source_id = %self.source_id,
            emitted = self.emitted,
            "chunk sink dropped without a terminal signal"
        );
        self.finish(
            ChunkEvent::Failed(SourceError::StreamTruncated {
                stage: "chunk-sink-dropped",
            }),
            SourceState::Failed,
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn drain(receiver: &mut mpsc::UnboundedReceiver<ChunkEvent>) -> Vec<ChunkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn fragments_reach_every_output_in_order() {
        let (left_tx, mut left_rx) = mpsc::unbounded_channel();
        let (right_tx, mut right_rx) = mpsc::unbounded_channel();
        let mut sink = ChunkSink::new(SourceId::new_v7(), vec![left_tx, right_tx]);

        assert_eq!(sink.state(), SourceState::NotStarted);
        assert!(sink.chunk("one "));
        assert!(sink.chunk("two "));
        assert_eq!(sink.state(), SourceState::Emitting);
        sink.complete();

        let expected = vec![
            ChunkEvent::Fragment("one ".to_string()),
            ChunkEvent::Fragment("two ".to_string()),
            ChunkEvent::Completed,
        ];
        assert_eq!(drain(&mut left_rx), expected);
        assert_eq!(drain(&mut right_rx), expected);
    }

    #[test]
    fn dropped_sink_reports_truncation_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChunkSink::new(SourceId::new_v7(), vec![tx]);
        sink.chunk("partial ");
        drop(sink);

        assert_eq!(
            drain(&mut rx),
            vec![
                ChunkEvent::Fragment("partial ".to_string()),
                ChunkEvent::Failed(SourceError::StreamTruncated {
                    stage: "chunk-sink-dropped",
                }),
            ]
        );
    }

    #[test]
    fn failed_sink_sends_exactly_one_terminal_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChunkSink::new(SourceId::new_v7(), vec![tx]);
        let error = SourceError::StreamFailed {
            stage: "test",
            message: "connection reset".to_string(),
        };
        sink.fail(error.clone());

        assert_eq!(drain(&mut rx), vec![ChunkEvent::Failed(error)]);
    }

    #[test]
    fn closed_output_does_not_stop_the_others() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, mut right_rx) = mpsc::unbounded_channel();
        let mut sink = ChunkSink::new(SourceId::new_v7(), vec![left_tx, right_tx]);
        drop(left_rx);

        assert!(sink.chunk("still here "));
        sink.complete();

        assert_eq!(
            drain(&mut right_rx),
            vec![
                ChunkEvent::Fragment("still here ".to_string()),
                ChunkEvent::Completed,
            ]
        );
    }

    #[test]
    fn chunk_reports_when_nobody_listens() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = ChunkSink::new(SourceId::new_v7(), vec![tx]);
        drop(rx);

        assert!(!sink.chunk("lost "));
        assert_eq!(sink.emitted(), 1);
    }
}
