//! Shell command runner.
//!
//! Spawns `sh -c` (`cmd /C` on Windows), streams stdout/stderr into a shared
//! [`TailBuffer`] and onto the [`OutputStream`], and waits for exit. With a
//! timeout, a child still alive when it elapses is promoted into the
//! background registry and the call returns `still_running`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strata_config::RunnerConfig;
use strata_core::{OutputEvent, OutputStream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::chain::split_chain;
use super::classify::CommandClassifier;
use super::registry::{ProcessHandle, ProcessRegistry};
use super::tail::TailBuffer;
use crate::text::Utf8Decoder;

/// How long readers may keep draining after the child exits. Grandchildren
/// that inherited the pipes can hold them open indefinitely.
const READER_DRAIN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// `None` waits for exit. `Some(t)` backgrounds the child after `t`.
    pub timeout: Option<Duration>,
}

/// What happened to one command.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// The (sub-)command this outcome describes
    pub command: String,
    /// `None` while still running
    pub exit_code: Option<i32>,
    pub output_tail: String,
    pub still_running: bool,
    /// Spawn failure or status note
    pub message: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub struct ProcessRunner {
    registry: Arc<ProcessRegistry>,
    output: OutputStream,
    classifier: CommandClassifier,
    tail_bytes: usize,
    long_running_grace: Duration,
    env: HashMap<String, String>,
}

impl ProcessRunner {
    pub fn new(config: &RunnerConfig, registry: Arc<ProcessRegistry>, output: OutputStream) -> Self {
        Self {
            registry,
            output,
            classifier: CommandClassifier::with_extra(&config.extra_long_running_patterns),
            tail_bytes: config.tail_bytes,
            long_running_grace: config.long_running_grace(),
            env: config.env.clone(),
        }
    }

    /// Replace the long-running predicate.
    pub fn with_classifier(mut self, classifier: CommandClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn output(&self) -> &OutputStream {
        &self.output
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }

    /// Run a possibly `&&`-chained command.
    ///
    /// Sub-commands run in order. Long-running ones get the grace timeout,
    /// the rest none. Stops at the first non-zero exit or the first
    /// sub-command left running, and returns that sub-command's outcome.
    pub async fn run_command(&self, command: &str, cwd: Option<&Path>) -> RunOutcome {
        self.output.publish(OutputEvent::Command {
            command: command.to_string(),
            cwd: cwd.map_or_else(|| "(workspace)".to_string(), |p| p.display().to_string()),
        });

        let mut last = RunOutcome {
            command: command.to_string(),
            exit_code: Some(0),
            output_tail: String::new(),
            still_running: false,
            message: None,
        };

        for part in split_chain(command) {
            let timeout = self
                .classifier
                .is_long_running(part)
                .then_some(self.long_running_grace);
            last = self.run(part, cwd, RunOptions { timeout }).await;

            if last.still_running {
                self.output.publish(OutputEvent::Backgrounded {
                    command: part.to_string(),
                });
                break;
            }
            if !last.succeeded() {
                break;
            }
        }
        last
    }

    /// Run one command without chain handling.
    pub async fn run(&self, command: &str, cwd: Option<&Path>, opts: RunOptions) -> RunOutcome {
        debug!(command, cwd = ?cwd, timeout = ?opts.timeout, "Spawning command");

        let mut child = match self.spawn(command, cwd) {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("Failed to start '{command}': {e}");
                warn!("{msg}");
                self.output.publish(OutputEvent::Output(format!("\n{msg}\n")));
                return RunOutcome {
                    command: command.to_string(),
                    exit_code: Some(-1),
                    output_tail: msg.clone(),
                    still_running: false,
                    message: Some(msg),
                };
            }
        };

        let tail = Arc::new(Mutex::new(TailBuffer::new(self.tail_bytes)));
        let readers: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|s| self.spawn_reader(s, tail.clone())),
            child.stderr.take().map(|s| self.spawn_reader(s, tail.clone())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(forward_stdin(stdin, input_rx));
        }

        let id = self.registry.next_id();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.registry.set_active(ProcessHandle::new(
            id,
            child.id(),
            command,
            kill_tx,
            input_tx,
        ));

        let (done_tx, mut done_rx) = oneshot::channel::<i32>();
        let registry = self.registry.clone();
        let output = self.output.clone();
        tokio::spawn(async move {
            let code = wait_or_kill(&mut child, kill_rx).await;
            for reader in readers {
                let _ = tokio::time::timeout(READER_DRAIN, reader).await;
            }
            registry.finished(id);
            output.publish(OutputEvent::Exited { code });
            let _ = done_tx.send(code);
        });

        let snapshot = |tail: &Arc<Mutex<TailBuffer>>| {
            tail.lock()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default()
        };

        let waited = match opts.timeout {
            Some(t) => tokio::time::timeout(t, &mut done_rx).await.ok(),
            None => Some((&mut done_rx).await),
        };

        let code = match waited {
            Some(result) => result.unwrap_or(-1),
            None if self.registry.promote(id) => {
                debug!(command, "Command still running after grace period");
                return RunOutcome {
                    command: command.to_string(),
                    exit_code: None,
                    output_tail: snapshot(&tail),
                    still_running: true,
                    message: Some("Process still running".into()),
                };
            }
            // Exited between the timeout firing and the promotion attempt
            None => done_rx.await.unwrap_or(-1),
        };

        RunOutcome {
            command: command.to_string(),
            exit_code: Some(code),
            output_tail: snapshot(&tail),
            still_running: false,
            message: None,
        }
    }

    fn spawn(&self, command: &str, cwd: Option<&Path>) -> std::io::Result<Child> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    fn spawn_reader<R>(&self, mut stream: R, tail: Arc<Mutex<TailBuffer>>) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let output = self.output.clone();
        let emit = move |text: String| {
            if text.is_empty() {
                return;
            }
            if let Ok(mut t) = tail.lock() {
                t.push(&text);
            }
            output.publish(OutputEvent::Output(text));
        };
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let mut decoder = Utf8Decoder::new();
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => emit(decoder.push(&buf[..n])),
                }
            }
            emit(decoder.finish());
        })
    }
}

/// Wait for the child, or kill it when the registry asks. A signal-terminated
/// child reports -1.
async fn wait_or_kill(child: &mut Child, kill_rx: oneshot::Receiver<()>) -> i32 {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill child process");
            }
            child.wait().await
        }
    };
    status.ok().and_then(|s| s.code()).unwrap_or(-1)
}

async fn forward_stdin(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(data) = rx.recv().await {
        if stdin.write_all(&data).await.is_err() || stdin.flush().await.is_err() {
            break;
        }
    }
}
