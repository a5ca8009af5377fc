//! services/client/src/terminal/session.rs
//!
//! The interactive loop: reads a command per line, applies it to the
//! controller, and prints the resulting view. A summary request runs in its
//! own task so the loop keeps reading, which lets `reset` abort it.

use open_blinkist_core::carousel::NavKey;
use open_blinkist_core::controller::{Controller, SubmitOutcome};
use open_blinkist_core::domain::SummaryRequest;
use open_blinkist_core::speech::PlayOutcome;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::terminal::command::{Command, HELP};
use crate::terminal::render::{render, render_history};

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

enum Event {
    Line(Option<String>),
    Settled(Result<SubmitOutcome, JoinError>),
}

pub struct Session {
    controller: Arc<Controller>,
    form: SummaryRequest,
    history_limit: i64,
    in_flight: Option<JoinHandle<SubmitOutcome>>,
}

impl Session {
    pub fn new(controller: Arc<Controller>, history_limit: i64) -> Self {
        Self {
            controller,
            form: SummaryRequest::default(),
            history_limit,
            in_flight: None,
        }
    }

    pub fn form(&self) -> &SummaryRequest {
        &self.form
    }

    /// Applies one command and returns the text to show for it.
    pub async fn handle(&mut self, command: Command) -> (Flow, String) {
        let mut notice = String::new();
        match command {
            Command::Book(title) => self.form.book_name = title,
            Command::Role(role) => self.form.role = role,
            Command::Insights(n) => self.form.num_insights = n,
            Command::Submit => {
                if self.form.is_submittable() {
                    self.start(self.form.clone(), &mut notice);
                } else {
                    notice.push_str("Set a book title first.\n");
                }
            }
            Command::Retry => match self.controller.last_request() {
                Some(request) => self.start(request, &mut notice),
                None => notice.push_str("Nothing to retry yet.\n"),
            },
            Command::Next => {
                self.controller.handle_key(NavKey::Right);
            }
            Command::Prev => {
                self.controller.handle_key(NavKey::Left);
            }
            Command::GoTo(n) => {
                let moved = n
                    .checked_sub(1)
                    .is_some_and(|index| self.controller.go_to_insight(index));
                if !moved {
                    notice.push_str("No such insight.\n");
                }
            }
            Command::Play => match self.controller.play_summary() {
                Some(PlayOutcome::Started) => notice.push_str("Reading the summary aloud.\n"),
                Some(PlayOutcome::Stopped) => notice.push_str("Playback stopped.\n"),
                None => {}
            },
            Command::Stop => self.controller.stop_audio(),
            Command::Dismiss => self.controller.dismiss_error(),
            Command::Reset => {
                self.controller.reset();
                self.form.book_name.clear();
            }
            Command::History => {
                return match self.controller.history(self.history_limit).await {
                    Ok(records) => (Flow::Continue, render_history(&records)),
                    Err(e) => {
                        error!("Failed to load history: {}", e);
                        (Flow::Continue, "History is unavailable right now.\n".to_string())
                    }
                };
            }
            Command::Help => return (Flow::Continue, format!("{}\n", HELP)),
            Command::Quit => {
                self.controller.reset();
                if let Some(handle) = self.in_flight.take() {
                    // Let the aborted request record itself before leaving.
                    if let Err(e) = handle.await {
                        error!("Summary task stopped abnormally: {}", e);
                    }
                }
                return (Flow::Quit, String::new());
            }
        }
        notice.push_str(&render(&self.controller.snapshot(), &self.form));
        (Flow::Continue, notice)
    }

    /// Puts the view into Loading and sends the request in the background.
    fn start(&mut self, request: SummaryRequest, notice: &mut String) {
        match self.controller.begin(request) {
            Some(pending) => {
                let controller = Arc::clone(&self.controller);
                self.in_flight = Some(tokio::spawn(async move { controller.complete(pending).await }));
            }
            None => notice.push_str("A request is already running. Type 'reset' to cancel it.\n"),
        }
    }

    /// Waits for the running request, if there is one, and returns the view
    /// to show once it has settled.
    pub async fn settle(&mut self) -> Option<String> {
        let handle = self.in_flight.take()?;
        Some(self.settled(handle.await))
    }

    fn settled(&self, joined: Result<SubmitOutcome, JoinError>) -> String {
        let mut notice = String::new();
        match joined {
            Ok(SubmitOutcome::Completed) => {
                info!("Summary ready.");
                notice.push_str("Insights ready. Use 'next'/'prev' to browse.\n");
            }
            Ok(SubmitOutcome::Cancelled) => notice.push_str("Request cancelled.\n"),
            Ok(SubmitOutcome::Failed(_)) | Ok(SubmitOutcome::Ignored) => {}
            Err(e) => {
                error!("Summary task stopped abnormally: {}", e);
                notice.push_str("The request stopped unexpectedly.\n");
            }
        }
        notice.push_str(&render(&self.controller.snapshot(), &self.form));
        notice
    }

    /// Runs until `quit` or end of input. While a request is running, lines
    /// are still read and applied.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let greeting = render(&self.controller.snapshot(), &self.form);
        writer
            .write_all(format!("{}Type 'help' for commands.\n> ", greeting).as_bytes())
            .await?;
        writer.flush().await?;

        let mut lines = reader.lines();
        loop {
            let event = match self.in_flight.as_mut() {
                Some(handle) => tokio::select! {
                    joined = handle => Event::Settled(joined),
                    line = lines.next_line() => Event::Line(line?),
                },
                None => Event::Line(lines.next_line().await?),
            };

            let output = match event {
                Event::Settled(joined) => {
                    self.in_flight = None;
                    self.settled(joined)
                }
                Event::Line(None) => {
                    if let Some(output) = self.settle().await {
                        writer.write_all(output.as_bytes()).await?;
                    }
                    break;
                }
                Event::Line(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        let (flow, output) = self.handle(command).await;
                        if flow == Flow::Quit {
                            break;
                        }
                        output
                    }
                    Err(e) => format!("{}\n", e),
                },
            };
            writer.write_all(output.as_bytes()).await?;
            writer.write_all(b"> ").await?;
            writer.flush().await?;
        }
        writer.write_all(b"Bye.\n").await?;
        writer.flush().await
    }
}
