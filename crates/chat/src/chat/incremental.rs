use tokio::sync::watch;

use crate::chat::tee::{SplitView, ViewRead};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PreviewState {
    text: String,
    fragments: usize,
    finished: bool,
}

/// Outcome of [`IncrementalRenderer::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    /// A view is already attached; the offered one was ignored.
    AlreadyAttached,
    /// The offered view has already been read by someone else.
    ViewConsumed,
}

/// Accumulates the fragments of one view into a growing preview string.
///
/// The accumulator lives here, not in the preview handles, so re-renders that
/// clone a [`StreamPreview`] never restart from empty.
#[derive(Debug)]
pub struct IncrementalRenderer {
    view: Option<SplitView>,
    state: watch::Sender<PreviewState>,
}

/// Read-only handle to a renderer's accumulator.
#[derive(Debug, Clone)]
pub struct StreamPreview {
    state: watch::Receiver<PreviewState>,
}

impl IncrementalRenderer {
    pub fn new() -> (Self, StreamPreview) {
        let (state, receiver) = watch::channel(PreviewState::default());
        (Self { view: None, state }, StreamPreview { state: receiver })
    }

    /// Binds the renderer to `view`. A renderer reads at most one view, and
    /// only one nobody has read from yet; anything else is declined quietly.
    pub fn attach(&mut self, view: SplitView) -> AttachOutcome {
        if let Some(current) = &self.view {
            tracing::debug!(
                attached_source = %current.source_id(),
                offered_source = %view.source_id(),
                offered_side = ?view.side(),
                "renderer already attached; declining second view"
            );
            return AttachOutcome::AlreadyAttached;
        }

        if !view.is_untouched() {
            tracing::debug!(
                source_id = %view.source_id(),
                side = ?view.side(),
                consumed = view.consumed(),
                "offered view was already read; declining"
            );
            return AttachOutcome::ViewConsumed;
        }

        self.view = Some(view);
        AttachOutcome::Attached
    }

    /// Reads the attached view until it terminates.
    pub async fn run(mut self) {
        let Some(mut view) = self.view.take() else {
            tracing::debug!("renderer started without a view");
            return;
        };

        loop {
            let read = view.read().await;
            if !apply(&self.state, read) {
                break;
            }
        }
    }
}

// Returns true when a fragment was appended; terminal reads only mark the
// preview finished. Errors carry no separate state here.
fn apply(state: &watch::Sender<PreviewState>, read: ViewRead) -> bool {
    match read {
        ViewRead::Fragment(fragment) => {
            state.send_modify(|state| {
                state.text.push_str(&fragment);
                state.fragments += 1;
            });
            true
        }
        ViewRead::End | ViewRead::Error(_) => {
            state.send_if_modified(|state| {
                let changed = !state.finished;
                state.finished = true;
                changed
            });
            false
        }
    }
}

impl StreamPreview {
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Text and fragment count read together.
    pub fn snapshot(&self) -> (String, usize) {
        let state = self.state.borrow();
        (state.text.clone(), state.fragments)
    }

    /// Waits until more than `seen` fragments have arrived or the stream has
    /// finished. Returns at once if that is already true. Returns `false`
    /// when the renderer is gone first.
    pub async fn grown_past(&mut self, seen: usize) -> bool {
        self.state
            .wait_for(|state| state.fragments > seen || state.finished)
            .await
            .is_ok()
    }
}
