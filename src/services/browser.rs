//! Resource opener: hands a URL or path to the desktop's default handler.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use tracing::debug;

use crate::config::BrowserConfig;

use super::{DummyMode, Outcome, ServiceError, unknown_provider};

pub enum Opener {
    System,
    Dummy(DummyMode),
}

impl Opener {
    pub fn build(config: &BrowserConfig) -> Result<Self, String> {
        match config.provider.as_str() {
            "system" => Ok(Opener::System),
            "dummy" => Ok(Opener::Dummy(DummyMode::Echo)),
            other => Err(unknown_provider("browser", other)),
        }
    }

    /// Open `target`; `Found` carries what was actually launched.
    pub fn open(&self, target: &str) -> Outcome<String> {
        let Some(resolved) = resolve_target(target) else {
            return Outcome::NotFound;
        };
        match self {
            Opener::System => match launch(&resolved) {
                Ok(()) => Outcome::Found(resolved),
                Err(e) => Outcome::Failed(ServiceError::Unavailable(e.to_string())),
            },
            Opener::Dummy(mode) => mode.outcome(|| resolved),
        }
    }
}

/// Existing paths and URLs with a scheme pass through; bare host names such
/// as `rust-lang.org` get `https://`. Empty input resolves to nothing.
pub(crate) fn resolve_target(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    if target.contains("://") || target.starts_with("mailto:") || Path::new(target).exists() {
        return Some(target.to_string());
    }
    if !target.contains(char::is_whitespace) && target.contains('.') {
        return Some(format!("https://{target}"));
    }
    Some(target.to_string())
}

/// Launch the platform opener without waiting for it. The child is reaped on
/// a background thread once it exits.
pub fn launch(target: &str) -> io::Result<()> {
    debug!(%target, "opening with system handler");
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(target);
    spawn_reaped(cmd).map(|_| ())
}

fn spawn_reaped(mut cmd: Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(std::thread::spawn(move || {
        let status = child.wait();
        debug!(?status, "opener exited");
        status
    }))
}
