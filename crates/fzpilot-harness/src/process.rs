//! Finder process management
//!
//! The `Child` handle is moved into a dedicated `wait_for_exit` background
//! task that calls `child.wait()`, so the real exit code is always captured.
//! `FinderProcess` keeps a kill channel to request a force-kill, an atomic
//! flag for synchronous `has_exited()` checks, and a `Notify` handle so
//! `wait()` can await the exit without holding a lock across `.await`.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Notify};

use fzpilot_core::prelude::*;

use crate::config::EntryDelimiter;

/// A spawned finder subprocess with piped standard streams.
pub struct FinderProcess {
    /// Sender for entry lines written to the finder's stdin.
    stdin_tx: Option<mpsc::Sender<String>>,
    /// Process ID for logging.
    pid: Option<u32>,
    /// One-shot sender that tells the wait task to force-kill the process.
    kill_tx: Option<oneshot::Sender<()>>,
    /// Set to `true` by the wait task once the child has exited.
    exited: Arc<AtomicBool>,
    /// Notified by the wait task immediately after the child exits.
    exit_notify: Arc<Notify>,
    /// Exit code captured by the wait task; `None` means killed by a signal.
    exit_code: Arc<Mutex<Option<i32>>>,
    /// Accumulated stderr, attached to process errors.
    stderr_buf: Arc<Mutex<String>>,
    /// Collector task handle; awaited once so `stderr_output` sees all of it.
    stderr_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FinderProcess {
    /// Spawn the finder with piped streams and start the stream tasks.
    pub fn spawn(
        program: &Path,
        args: &[String],
        envs: &[(String, String)],
        delimiter: EntryDelimiter,
    ) -> Result<Self> {
        info!("Spawning finder: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.clone(), v.clone())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FinderNotFound {
                        program: program.display().to_string(),
                    }
                } else {
                    Error::process_spawn(e.to_string())
                }
            })?;

        let pid = child.id();
        info!("Finder process started with PID: {:?}", pid);

        let stdin = child.stdin.take().expect("stdin was configured");
        let (stdin_tx, stdin_rx) = mpsc::channel::<String>(64);
        tokio::spawn(Self::stdin_writer(stdin, stdin_rx, delimiter));

        let stdout = child.stdout.take().expect("stdout was configured");
        tokio::spawn(Self::stdout_drain(stdout));

        let stderr = child.stderr.take().expect("stderr was configured");
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = tokio::spawn(Self::stderr_collector(stderr, Arc::clone(&stderr_buf)));

        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let exit_code = Arc::new(Mutex::new(None));
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(Self::wait_for_exit(
            child,
            kill_rx,
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
            Arc::clone(&exit_code),
        ));

        Ok(Self {
            stdin_tx: Some(stdin_tx),
            pid,
            kill_tx: Some(kill_tx),
            exited,
            exit_notify,
            exit_code,
            stderr_buf,
            stderr_task: Mutex::new(Some(stderr_task)),
        })
    }

    /// Background task: owns `child`, waits for it to exit, records the code.
    async fn wait_for_exit(
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
        exit_code: Arc<Mutex<Option<i32>>>,
    ) {
        let code: Option<i32> = tokio::select! {
            result = child.wait() => {
                match result {
                    Ok(status) => {
                        info!("Finder process exited with status: {:?}", status);
                        status.code()
                    }
                    Err(e) => {
                        error!("Error waiting for finder process: {}", e);
                        None
                    }
                }
            }
            _ = kill_rx => {
                info!("Kill signal received, force-killing finder process");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill finder process: {}", e);
                }
                match child.wait().await {
                    Ok(status) => status.code(),
                    Err(e) => {
                        error!("Error waiting after kill: {}", e);
                        None
                    }
                }
            }
        };

        *exit_code.lock().expect("exit code lock poisoned") = code;
        // Order matters: has_exited() must be true before waiters wake.
        exited.store(true, Ordering::Release);
        exit_notify.notify_waiters();
    }

    /// Write entry lines to stdin, one delimiter byte after each.
    async fn stdin_writer(
        mut stdin: tokio::process::ChildStdin,
        mut rx: mpsc::Receiver<String>,
        delimiter: EntryDelimiter,
    ) {
        let delim = [delimiter.byte()];
        while let Some(line) = rx.recv().await {
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                debug!("Failed to write entry to stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.write_all(&delim).await {
                debug!("Failed to write delimiter: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                debug!("Failed to flush stdin: {}", e);
                break;
            }
        }

        // Dropping stdin closes the pipe; the finder sees end of input.
        debug!("stdin writer finished");
    }

    /// Drain stdout. The finder's terminal UI runs on the tty; anything on
    /// stdout (the accepted lines) is superseded by the recorded result.
    async fn stdout_drain(stdout: tokio::process::ChildStdout) {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            trace!("finder stdout: {}", line);
        }
        debug!("stdout drain finished");
    }

    /// Collect stderr for attachment to process errors.
    async fn stderr_collector(stderr: tokio::process::ChildStderr, buf: Arc<Mutex<String>>) {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            trace!("finder stderr: {}", line);
            let mut buf = buf.lock().expect("stderr buffer lock poisoned");
            buf.push_str(&line);
            buf.push('\n');
        }
        debug!("stderr collector finished");
    }

    /// Queue one entry line for the finder's stdin.
    pub async fn send_entry(&self, line: String) -> Result<()> {
        let tx = self.stdin_tx.as_ref().ok_or(Error::ChannelClosed)?;
        tx.send(line)
            .await
            .map_err(|_| Error::channel_send("stdin channel closed"))
    }

    /// A clonable sender for incremental entry producers.
    pub fn entry_sender(&self) -> Result<mpsc::Sender<String>> {
        self.stdin_tx.clone().ok_or(Error::ChannelClosed)
    }

    /// Close the finder's stdin once every entry is queued.
    ///
    /// Clones handed out by [`entry_sender`](Self::entry_sender) keep the pipe
    /// open until they are dropped too.
    pub fn close_input(&mut self) {
        self.stdin_tx = None;
    }

    /// Wait for the process to exit and return its code.
    ///
    /// The `notified()` future is created before the `has_exited()` check so a
    /// notification firing in between cannot be missed.
    pub async fn wait(&self) -> Option<i32> {
        let notified = self.exit_notify.notified();
        if self.has_exited() {
            return self.code();
        }
        notified.await;
        self.code()
    }

    fn code(&self) -> Option<i32> {
        *self.exit_code.lock().expect("exit code lock poisoned")
    }

    /// Non-blocking, synchronous exit check backed by the wait task's flag.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// Get the process ID
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Everything the process wrote to stderr.
    ///
    /// Waits for the collector to drain the pipe, so after exit this is the
    /// complete stream, not a prefix of it.
    pub async fn stderr_output(&self) -> String {
        let task = self
            .stderr_task
            .lock()
            .expect("stderr task lock poisoned")
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.stderr_buf
            .lock()
            .expect("stderr buffer lock poisoned")
            .clone()
    }

    /// Force kill by signalling the wait task, which reaps the child.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            warn!("Force killing finder process via kill channel");
            let _ = tx.send(());
        }
    }
}

impl Drop for FinderProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("FinderProcess dropped while process may still be running");
            // Send kill signal so the wait task tears down the child cleanly.
            if let Some(tx) = self.kill_tx.take() {
                let _ = tx.send(());
            }
        }
        // kill_on_drop(true) on the Child is the final safety net if the
        // wait task hasn't had a chance to handle the kill yet.
        debug!("FinderProcess dropped");
    }
}
