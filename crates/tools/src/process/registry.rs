//! Live process registry: the active foreground slot plus the background list.
//!
//! Written only by the runner (register, promote, finish) and cleared by kill
//! actions. Guarded by a plain mutex: no lock is ever held across an await.
//!
//! Forwarded input goes to the active process, or, when none is active, to
//! the most recently backgrounded one that is still alive. A command that
//! stops to ask a question outlives its grace period and must stay reachable.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Handle to a spawned child, owned by the registry while the child lives.
#[derive(Debug)]
pub struct ProcessHandle {
    pub id: u64,
    pub pid: Option<u32>,
    pub command: String,
    kill: Option<oneshot::Sender<()>>,
    input: mpsc::UnboundedSender<Vec<u8>>,
}

impl ProcessHandle {
    pub fn new(
        id: u64,
        pid: Option<u32>,
        command: impl Into<String>,
        kill: oneshot::Sender<()>,
        input: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            pid,
            command: command.into(),
            kill: Some(kill),
            input,
        }
    }

    /// Ask the owning wait task to kill the child. Returns false when the
    /// child already exited (its wait task dropped the receiver).
    fn signal_kill(&mut self) -> bool {
        self.kill.take().is_some_and(|tx| tx.send(()).is_ok())
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    active: Option<ProcessHandle>,
    background: Vec<ProcessHandle>,
    /// Input target once the active slot has been vacated by a promotion
    last_promoted: Option<u64>,
}

impl RegistryState {
    fn input_target(&self) -> Option<&ProcessHandle> {
        self.active.as_ref().or_else(|| {
            let id = self.last_promoted?;
            self.background.iter().find(|h| h.id == id)
        })
    }
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Make `handle` the foreground process. A previous occupant that is
    /// somehow still registered is moved to the background so it stays killable.
    pub fn set_active(&self, handle: ProcessHandle) {
        self.with_state(|state| {
            if let Some(previous) = state.active.replace(handle) {
                state.background.push(previous);
            }
        });
    }

    /// Move the active process with `id` into the background.
    /// Returns false if it is no longer active (it already exited).
    pub fn promote(&self, id: u64) -> bool {
        self.with_state(|state| match state.active.take() {
            Some(handle) if handle.id == id => {
                debug!(id, command = %handle.command, "Process moved to background");
                state.background.push(handle);
                state.last_promoted = Some(id);
                true
            }
            other => {
                state.active = other;
                false
            }
        })
    }

    /// Forget a process that exited on its own.
    pub fn finished(&self, id: u64) {
        self.with_state(|state| {
            if state.active.as_ref().is_some_and(|h| h.id == id) {
                state.active = None;
            }
            state.background.retain(|h| h.id != id);
            if state.last_promoted == Some(id) {
                state.last_promoted = None;
            }
        });
    }

    /// Write `data` to the stdin of the active process, falling back to the
    /// last backgrounded one. False when neither is alive.
    pub fn forward_input(&self, data: impl Into<Vec<u8>>) -> bool {
        let data = data.into();
        self.with_state(|state| {
            state
                .input_target()
                .is_some_and(|h| h.input.send(data).is_ok())
        })
    }

    /// Whether [`forward_input`](Self::forward_input) has somewhere to go.
    pub fn accepts_input(&self) -> bool {
        self.with_state(|state| state.input_target().is_some())
    }

    /// Signal the active process and every background process, then clear
    /// both. Returns how many live processes were signaled.
    pub fn kill_all(&self) -> usize {
        let handles: Vec<ProcessHandle> = self.with_state(|state| {
            state.last_promoted = None;
            state
                .active
                .take()
                .into_iter()
                .chain(state.background.drain(..))
                .collect()
        });
        handles
            .into_iter()
            .map(|mut h| {
                let killed = h.signal_kill();
                debug!(id = h.id, pid = ?h.pid, command = %h.command, killed, "Kill requested");
                killed
            })
            .filter(|killed| *killed)
            .count()
    }

    pub fn has_active(&self) -> bool {
        self.with_state(|state| state.active.is_some())
    }

    pub fn background_len(&self) -> usize {
        self.with_state(|state| state.background.len())
    }

    pub fn background_commands(&self) -> Vec<String> {
        self.with_state(|state| state.background.iter().map(|h| h.command.clone()).collect())
    }
}
