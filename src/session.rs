//! Session loop: wake-word gating in front of the dispatcher.
//!
//! Starts `Idle`. Lines are ignored until one contains a wake word, then the
//! session is `Active` and every line goes to the [`Dispatcher`] until an exit
//! intent, end of input, or the shutdown token fires. The token is also
//! watched while a line is being handled, so a slow service call does not
//! hold off Ctrl-C.
//!
//! Lines are normalised (lowercased) before the wake-word test, so of the
//! three wake-word spellings only the lowercase one can ever match.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Flow};
use crate::intent::normalize;

/// `{name, lowercase(name), uppercase(name)}` of the assistant.
#[derive(Debug, Clone)]
pub struct WakeWords(Vec<String>);

impl WakeWords {
    pub fn for_name(name: &str) -> Self {
        Self(vec![name.to_string(), name.to_lowercase(), name.to_uppercase()])
    }

    /// Substring test against an already-normalised line.
    pub fn heard_in(&self, line: &str) -> bool {
        self.0.iter().any(|w| !w.is_empty() && line.contains(w.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

/// Why [`Session::run`] returned. All three are a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ExitRequested,
    EndOfInput,
    Interrupted,
}

pub struct Session {
    user_name: String,
    assistant_name: String,
    wake_words: WakeWords,
    state: SessionState,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(user_name: &str, assistant_name: &str, dispatcher: Dispatcher) -> Self {
        Self {
            user_name: user_name.to_string(),
            assistant_name: assistant_name.to_string(),
            wake_words: WakeWords::for_name(assistant_name),
            state: SessionState::Idle,
            dispatcher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn run<R>(&mut self, input: R, shutdown: CancellationToken) -> SessionEnd
    where
        R: AsyncBufRead + Unpin,
    {
        info!(user = %self.user_name, assistant = %self.assistant_name, "session started");
        self.dispatcher.sink().say(&format!(
            "Hello {}, I am {}, your personal assistant. How can I help you today?",
            self.user_name, self.assistant_name
        ));

        let mut lines = input.lines();
        let end = loop {
            self.dispatcher.sink().prompt(&self.user_name);

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown signal received");
                    break SessionEnd::Interrupted;
                }

                line = lines.next_line() => {
                    let raw = match line {
                        Ok(Some(raw)) => raw,
                        Ok(None) => {
                            info!("input closed");
                            break SessionEnd::EndOfInput;
                        }
                        Err(e) => {
                            warn!("input read error: {e}");
                            break SessionEnd::EndOfInput;
                        }
                    };
                    let line = normalize(&raw);
                    if line.is_empty() && self.state == SessionState::Idle {
                        continue;
                    }
                    tokio::select! {
                        biased;

                        _ = shutdown.cancelled() => {
                            info!("shutdown signal received while handling a line");
                            break SessionEnd::Interrupted;
                        }

                        flow = self.step(&line) => {
                            if flow == Flow::Exit {
                                break SessionEnd::ExitRequested;
                            }
                        }
                    }
                }
            }
        };
        info!(?end, "session ended");
        end
    }

    async fn step(&mut self, line: &str) -> Flow {
        match self.state {
            SessionState::Idle => {
                if self.wake_words.heard_in(line) {
                    debug!("wake word heard");
                    self.state = SessionState::Active;
                    self.dispatcher.sink().say(&format!("Yes {}?", self.user_name));
                }
                Flow::Continue
            }
            SessionState::Active => self.dispatcher.handle(line).await,
        }
    }
}
