//! Response sink: the only user-facing output channel.
//!
//! Every response is printed as `"{assistant}: {text}"`. Logs go through
//! `tracing` to stderr (or the log file) and never through here.

use std::io::Write as _;
use std::sync::{Arc, Mutex};

use tracing::warn;

/// ANSI erase-display + cursor-home.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Lines written to a capturing sink, shared with the test that created it.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut l) = self.0.lock() {
            l.push(line);
        }
    }
}

enum Output {
    Stdout,
    Capture(Transcript),
}

pub struct Sink {
    assistant_name: String,
    out: Output,
}

impl Sink {
    pub fn stdout(assistant_name: impl Into<String>) -> Self {
        Self { assistant_name: assistant_name.into(), out: Output::Stdout }
    }

    /// Sink that records instead of printing. Prompts are not recorded.
    pub fn capture(assistant_name: impl Into<String>) -> (Self, Transcript) {
        let transcript = Transcript::default();
        let sink = Self {
            assistant_name: assistant_name.into(),
            out: Output::Capture(transcript.clone()),
        };
        (sink, transcript)
    }

    pub fn say(&self, text: &str) {
        let line = format!("{}: {text}", self.assistant_name);
        match &self.out {
            Output::Stdout => write_stdout(&format!("{line}\n")),
            Output::Capture(t) => t.push(line),
        }
    }

    pub fn clear(&self) {
        match &self.out {
            Output::Stdout => write_stdout(CLEAR_SCREEN),
            Output::Capture(t) => t.push(CLEAR_SCREEN.to_string()),
        }
    }

    /// Show `"{user_name}: "` before a read.
    pub fn prompt(&self, user_name: &str) {
        if let Output::Stdout = self.out {
            write_stdout(&format!("{user_name}: "));
        }
    }
}

fn write_stdout(text: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        warn!("stdout write failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_prefixes_assistant_name() {
        let (sink, t) = Sink::capture("Jarvis");
        sink.say("Hello");
        assert_eq!(t.lines(), ["Jarvis: Hello"]);
    }

    #[test]
    fn prompt_is_not_captured() {
        let (sink, t) = Sink::capture("Jarvis");
        sink.prompt("Ada");
        sink.clear();
        assert_eq!(t.lines(), [CLEAR_SCREEN]);
    }
}
