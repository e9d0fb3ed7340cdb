use snafu::Snafu;

/// Shown in place of an error whose display text is empty.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong.";

/// Failure reported by a simulated backend.
///
/// Cloneable because one failure is observed by every split view and every
/// render of the entry it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("{message}"))]
    RequestFailed {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("{message}"))]
    StreamFailed {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("chunk source ended before a terminal event"))]
    StreamTruncated { stage: &'static str },
}

impl SourceError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::RequestFailed { stage, .. }
            | Self::StreamFailed { stage, .. }
            | Self::StreamTruncated { stage } => stage,
        }
    }

    /// Text for the failing entry, falling back to a generic line when the
    /// error carries no message.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IdError {
    #[snafu(display("id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
}
