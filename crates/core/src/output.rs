//! Live output stream: the "output panel" the executor and runner write to.
//!
//! Commands, their streamed output, and editor-ish notices are published as
//! [`OutputEvent`]s. Any number of consumers (the CLI printer, tests) can
//! subscribe without the producers knowing about them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything that appears in the live output panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputEvent {
    /// A command is about to start.
    Command { command: String, cwd: String },

    /// A chunk of stdout/stderr from a running command.
    Output(String),

    /// A foreground command finished.
    Exited { code: i32 },

    /// A long-running command outlived its grace period and keeps running.
    Backgrounded { command: String },

    /// Free-form status line (kills, image saves, backups).
    Notice(String),

    /// A file should be shown to the user.
    OpenFile { path: String },
}

/// Broadcast-based output stream.
///
/// Publishing never blocks; slow subscribers lag and lose the oldest events.
#[derive(Clone)]
pub struct OutputStream {
    sender: broadcast::Sender<Arc<OutputEvent>>,
}

impl OutputStream {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: OutputEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OutputEvent>> {
        self.sender.subscribe()
    }

    pub fn notice(&self, text: impl Into<String>) {
        self.publish(OutputEvent::Notice(text.into()));
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
