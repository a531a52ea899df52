//! User interaction: username prompts and notifications.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Info,
    Error,
}

/// Trait for the user-facing side of the tool.
#[async_trait]
pub trait UiShell: Send + Sync {
    /// Ask for the gateway username. `None` means the user cancelled or
    /// entered nothing.
    async fn prompt_for_username(&self, prompt: &str) -> Option<String>;

    fn notify(&self, kind: NotifyKind, message: &str);
}

/// [`UiShell`] on the terminal: prompts on stderr, reads stdin.
///
/// A preset username (from `--user`) answers the prompt without reading.
#[derive(Debug, Default, Clone)]
pub struct ConsoleShell {
    preset_username: Option<String>,
}

impl ConsoleShell {
    pub fn new(preset_username: Option<String>) -> Self {
        Self { preset_username }
    }
}

#[async_trait]
impl UiShell for ConsoleShell {
    async fn prompt_for_username(&self, prompt: &str) -> Option<String> {
        if let Some(preset) = &self.preset_username {
            return normalize_username(preset);
        }

        let mut stderr = tokio::io::stderr();
        if let Err(e) = stderr.write_all(format!("{}: ", prompt).as_bytes()).await {
            warn!("Failed to write prompt: {}", e);
        }
        let _ = stderr.flush().await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => normalize_username(&line),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read username: {}", e);
                None
            }
        }
    }

    fn notify(&self, kind: NotifyKind, message: &str) {
        match kind {
            NotifyKind::Info => {
                debug!("notify: {}", message);
                eprintln!("{}", message);
            }
            NotifyKind::Error => {
                debug!("notify error: {}", message);
                eprintln!("error: {}", message);
            }
        }
    }
}

/// Trimmed username, or `None` when blank.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
