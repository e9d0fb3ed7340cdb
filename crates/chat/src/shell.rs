use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::chat::{MessageView, RenderedEntry, SubmitOutcome};
use crate::session::ChatSession;
use crate::settings::{ChatSettings, ReplyMode, SettingsError};

pub const HELP_TEXT: &str = "type a message and press enter; /mode streaming|deferred switches \
the reply mode; /quit exits";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShellError {
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to save settings on `{stage}`: {source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    SwitchMode(ReplyMode),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "/quit" | "/exit" => return Self::Quit,
            "/help" => return Self::Help,
            _ => {}
        }

        if let Some(mode) = trimmed.strip_prefix("/mode") {
            return match mode.trim() {
                "streaming" | "stream" => Self::SwitchMode(ReplyMode::Streaming),
                "deferred" => Self::SwitchMode(ReplyMode::Deferred),
                _ => Self::Help,
            };
        }

        Self::Submit(line.to_string())
    }
}

/// Stand-in for a UI rendering engine: redraws the whole log whenever the
/// input changes it, a reply settles, or a streaming preview grows.
pub struct Shell {
    session: ChatSession,
    view: MessageView,
}

impl Shell {
    pub fn new(session: ChatSession) -> Self {
        let view = MessageView::new(session.settings().placeholder_text.clone());
        Self { session, view }
    }

    pub async fn run(mut self) -> Result<(), ShellError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        write_line(&mut stdout, HELP_TEXT).await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.context(ReadInputSnafu { stage: "read-stdin-line" })?;
                    let Some(line) = line else {
                        tracing::debug!("stdin closed; waiting for outstanding replies");
                        break;
                    };
                    if !self.handle_line(&line, &mut stdout).await? {
                        return Ok(());
                    }
                }
                change = self.view.next_change(self.session.log()) => {
                    tracing::debug!(
                        pending_id = %change.pending_id(),
                        change = ?change,
                        "view changed"
                    );
                    self.redraw(&mut stdout).await?;
                }
            }
        }

        self.drain(&mut stdout).await
    }

    /// Returns `false` when the shell should exit.
    async fn handle_line<W>(&mut self, line: &str, out: &mut W) -> Result<bool, ShellError>
    where
        W: AsyncWrite + Unpin,
    {
        match Command::parse(line) {
            Command::Quit => Ok(false),
            Command::Help => {
                write_line(out, HELP_TEXT).await?;
                Ok(true)
            }
            Command::SwitchMode(mode) => {
                let settings = ChatSettings {
                    reply_mode: mode,
                    ..(*self.session.settings()).clone()
                };
                self.session
                    .update_settings(settings)
                    .context(SettingsSnafu {
                        stage: "switch-reply-mode",
                    })?;
                self.view
                    .set_placeholder(self.session.settings().placeholder_text.clone());
                write_line(out, &format!("reply mode: {mode:?}")).await?;
                Ok(true)
            }
            Command::Submit(text) => {
                if let SubmitOutcome::Accepted { .. } = self.session.submit_message(&text) {
                    self.redraw(out).await?;
                }
                Ok(true)
            }
        }
    }

    /// Keeps redrawing until every reply has settled.
    pub async fn drain<W>(&mut self, out: &mut W) -> Result<(), ShellError>
    where
        W: AsyncWrite + Unpin,
    {
        while self.view.has_outstanding(self.session.log()) {
            self.view.next_change(self.session.log()).await;
            self.redraw(out).await?;
        }
        Ok(())
    }

    pub async fn redraw<W>(&mut self, out: &mut W) -> Result<(), ShellError>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self
            .view
            .render(self.session.log())
            .iter()
            .map(format_entry)
            .collect::<Vec<_>>()
            .join("\n");

        write_line(out, "----").await?;
        write_line(out, &frame).await
    }
}

pub fn format_entry(entry: &RenderedEntry) -> String {
    match entry {
        RenderedEntry::Message { from, content } => format!("[{from}] {content}"),
        RenderedEntry::Placeholder { text, streaming } => {
            let marker = if *streaming { "streaming" } else { "waiting" };
            format!("[assistant, {marker}] {text}")
        }
        RenderedEntry::Failure { message } => format!("[assistant, failed] {message}"),
    }
}

async fn write_line<W>(out: &mut W, text: &str) -> Result<(), ShellError>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes())
        .await
        .context(WriteOutputSnafu {
            stage: "write-frame",
        })?;
    out.write_all(b"\n").await.context(WriteOutputSnafu {
        stage: "write-newline",
    })?;
    out.flush().await.context(WriteOutputSnafu {
        stage: "flush-output",
    })
}
