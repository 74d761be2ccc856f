//! Clipboard capability for generated share links

use async_trait::async_trait;
use std::io::Write;
use tokio::sync::Mutex;

/// Somewhere a share link can be handed to the user
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> std::io::Result<()>;
}

/// Keeps the last copied text; used in tests and embedding code
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last text written, if any
    pub async fn contents(&self) -> Option<String> {
        self.contents.lock().await.clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> std::io::Result<()> {
        *self.contents.lock().await = Some(text.to_string());
        Ok(())
    }
}

/// Prints the text on stdout for terminal sessions without a system clipboard
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutClipboard;

#[async_trait]
impl Clipboard for StdoutClipboard {
    async fn write_text(&self, text: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()
    }
}
