use murmur_llm::{ChunkEvent, ChunkSink, ChunkSource, SourceError, SourceId, SourceWorker};
use tokio::sync::mpsc;

/// Result of reading one step from a [`SplitView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRead {
    Fragment(String),
    End,
    Error(SourceError),
}

/// Which half of a split a view is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewSide {
    Left,
    Right,
}

/// One independent cursor over a split chunk source.
///
/// Each view owns its queue. Fragments wait there until this view reads them,
/// so a view that starts reading late still replays the whole sequence.
#[derive(Debug)]
pub struct SplitView {
    source_id: SourceId,
    side: ViewSide,
    events: mpsc::UnboundedReceiver<ChunkEvent>,
    terminal: Option<ViewRead>,
    consumed: usize,
}

impl SplitView {
    fn new(source_id: SourceId, side: ViewSide, events: mpsc::UnboundedReceiver<ChunkEvent>) -> Self {
        Self {
            source_id,
            side,
            events,
            terminal: None,
            consumed: 0,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn side(&self) -> ViewSide {
        self.side
    }

    /// Fragments this view has handed out so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// True until the first read returns anything.
    pub fn is_untouched(&self) -> bool {
        self.consumed == 0 && self.terminal.is_none()
    }

    /// Waits for the next step. Once a terminal result has been returned,
    /// every later call returns that same result again.
    pub async fn read(&mut self) -> ViewRead {
        if let Some(terminal) = &self.terminal {
            return terminal.clone();
        }

        match self.events.recv().await {
            Some(event) => self.accept(event),
            None => self.accept_closed(),
        }
    }

    fn accept(&mut self, event: ChunkEvent) -> ViewRead {
        match event {
            ChunkEvent::Fragment(fragment) => {
                self.consumed += 1;
                ViewRead::Fragment(fragment)
            }
            ChunkEvent::Completed => self.settle(ViewRead::End),
            ChunkEvent::Failed(error) => self.settle(ViewRead::Error(error)),
        }
    }

    fn accept_closed(&mut self) -> ViewRead {
        // The sink always sends a terminal event, even when dropped, so a bare
        // close means the producer vanished without running its drop path.
        tracing::warn!(
            source_id = %self.source_id,
            side = ?self.side,
            consumed = self.consumed,
            "split view closed without a terminal event"
        );
        self.settle(ViewRead::Error(SourceError::StreamTruncated {
            stage: "split-view-closed",
        }))
    }

    fn settle(&mut self, terminal: ViewRead) -> ViewRead {
        self.terminal = Some(terminal.clone());
        terminal
    }
}

/// Both views of a split source plus the worker that drives emission.
///
/// Emission starts only when the caller spawns `worker`; both views are
/// already attached by then.
pub struct SplitStream {
    pub left: SplitView,
    pub right: SplitView,
    pub worker: SourceWorker,
}

/// Tees one chunk source into two independent views by pushing every event
/// to both view queues as it is produced.
pub fn split<S>(source: S) -> SplitStream
where
    S: ChunkSource,
{
    let source_id = SourceId::new_v7();
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();
    let sink = ChunkSink::new(source_id, vec![left_tx, right_tx]);

    tracing::debug!(source_id = %source_id, "split chunk source into two views");

    SplitStream {
        left: SplitView::new(source_id, ViewSide::Left, left_rx),
        right: SplitView::new(source_id, ViewSide::Right, right_rx),
        worker: source.start(sink),
    }
}
