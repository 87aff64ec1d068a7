//! The top-level driver: spawn the finder, serve callbacks, return the result
//!
//! One foreground future owns the finder's standard streams; the RPC server
//! runs on its own task for the session's entire lifetime; the automator, when
//! scripted, runs on a third. All three share exactly one session behind a
//! mutex, and the stage machine is what makes the final read safe: the result
//! is only taken after the process exited and the session reached `Finished`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use fzpilot_core::prelude::*;
use fzpilot_core::{EntryRef, SessionResult, SessionState, Stage, PORT_ENV};
use fzpilot_rpc::Server;

use crate::automator::{Automator, ScriptStep};
use crate::config::FinderConfig;
use crate::process::FinderProcess;

/// Exit code the finder uses for "no match accepted". Non-fatal.
pub const EXIT_NO_MATCH: i32 = 1;

/// Exit code the finder uses for a user abort. Non-fatal.
pub const EXIT_ABORTED: i32 = 130;

/// Orchestrates finder runs for one configuration.
pub struct Finder {
    config: FinderConfig,
}

impl Default for Finder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder {
    pub fn new() -> Self {
        Self {
            config: FinderConfig::default(),
        }
    }

    pub fn with_config(config: FinderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Run an interactive session to completion.
    pub async fn run(&self, session: SessionState) -> Result<SessionResult> {
        self.execute(session, None, None).await
    }

    /// Run a session driven by an automation script instead of a human.
    pub async fn run_scripted(
        &self,
        session: SessionState,
        steps: Vec<ScriptStep>,
    ) -> Result<SessionResult> {
        self.execute(session, Some(steps), None).await
    }

    /// Run a session whose entries arrive incrementally from a producer.
    /// Entries already in the session are fed first.
    pub async fn run_streaming(
        &self,
        session: SessionState,
        entries: mpsc::Receiver<EntryRef>,
    ) -> Result<SessionResult> {
        self.execute(session, None, Some(entries)).await
    }

    async fn execute(
        &self,
        mut session: SessionState,
        script: Option<Vec<ScriptStep>>,
        stream: Option<mpsc::Receiver<EntryRef>>,
    ) -> Result<SessionResult> {
        match session.stage() {
            Stage::Created => session.finalize()?,
            Stage::ReadyToRun => {}
            other => return Err(Error::stage("execute", other)),
        }
        let resolved = session
            .resolved()
            .cloned()
            .ok_or_else(|| Error::stage("execute", session.stage()))?;
        let registry = session.registry().clone();

        let automator = script
            .map(|steps| Automator::prepare(steps, &resolved, &registry))
            .transpose()?;

        let program = self.config.resolve_program()?;
        let lines = session.entry_lines();

        let session = Arc::new(Mutex::new(session));
        let server = Server::new(registry, Arc::clone(&session)).start().await?;

        let mut args = self.config.base_args.clone();
        args.extend(resolved.flags.iter().cloned());
        if let Some(flag) = self.config.delimiter.flag() {
            args.push(flag.to_string());
        }
        if automator.is_some() || self.config.listen {
            // Ephemeral remote-control port; the finder reports the actual
            // port through the start-event endpoint.
            args.push("--listen=0".to_string());
        }

        let mut envs: Vec<(String, String)> = self
            .config
            .extra_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        envs.push((PORT_ENV.to_string(), server.port().to_string()));

        let mut process = match FinderProcess::spawn(&program, &args, &envs, self.config.delimiter)
        {
            Ok(process) => process,
            Err(e) => {
                server.shutdown().await;
                return Err(e);
            }
        };

        // Feed entries. A failed write usually means the process already
        // exited; that is the exit-code path's problem, not ours.
        for line in lines {
            if let Err(e) = process.send_entry(line).await {
                warn!(error = %e, "entry feed ended early");
                break;
            }
        }
        match stream {
            None => process.close_input(),
            Some(rx) => {
                let sender = process.entry_sender().expect("stdin still open");
                process.close_input();
                tokio::spawn(stream_entries(rx, sender, Arc::clone(&session)));
            }
        }

        // The automator is deliberately detached: once the finder exits it
        // stops mattering, and shutdown never waits on it.
        let automator_task = automator.map(|automator| tokio::spawn(automator.run(Arc::clone(&session))));

        let code = process.wait().await;
        if let Some(task) = automator_task {
            task.abort();
        }
        server.shutdown().await;

        match code {
            Some(0) => {}
            Some(EXIT_NO_MATCH) => info!("finder exited with no match accepted"),
            Some(EXIT_ABORTED) => info!("finder exited via user abort"),
            other => {
                return Err(Error::UnexpectedExit {
                    code: other,
                    stderr: process.stderr_output().await,
                })
            }
        }

        let mut session = session.lock().await;
        match session.take_result() {
            Ok(result) => {
                info!(status = %result.end_status, "session result recorded");
                Ok(result)
            }
            // The process is gone but no finishing action ever fired; an
            // empty default result would silently hide that.
            Err(Error::ResultNotReady { .. }) => Err(Error::MissingResult { code }),
            Err(e) => Err(e),
        }
    }
}

/// Forward streamed entries into both the session and the finder's stdin.
async fn stream_entries(
    mut rx: mpsc::Receiver<EntryRef>,
    sender: mpsc::Sender<String>,
    session: Arc<Mutex<SessionState>>,
) {
    while let Some(entry) = rx.recv().await {
        let line = entry.display().into_owned();
        session.lock().await.push_entry(entry);
        if sender.send(line).await.is_err() {
            debug!("finder stdin closed; dropping remaining streamed entries");
            break;
        }
    }
    debug!("entry stream finished");
}
