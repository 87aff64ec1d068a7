//! Scripted playback: drive a session exactly as a human would
//!
//! The automator posts each step's action expression to the finder's
//! remote-control port and then blocks until the step's paired advance
//! callback arrives through the RPC server. That lock-step is what makes
//! scripted sessions deterministic even though the finder's own event loop is
//! asynchronous and opaque: a step only starts after the previous one has
//! demonstrably run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use fzpilot_core::prelude::*;
use fzpilot_core::{
    compile_binding, Action, Binding, CallKind, Endpoint, EndpointRegistry, ResolvedOptions,
    ServerCall, SessionState, Trigger,
};

use crate::controller::Controller;

/// Poll interval while waiting for the finder's remote-control port.
const PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls per warning while the port stays unknown. A liveness safeguard, not
/// a timeout: the automator keeps waiting.
const PORT_POLLS_PER_WARNING: u32 = 50;

/// One scripted step: a trigger whose registered binding should fire, or an
/// ad-hoc binding to run as-is.
pub enum ScriptStep {
    Trigger(Trigger),
    Binding(Binding),
}

#[derive(Debug)]
struct PreparedStep {
    label: String,
    expr: String,
    ends_session: bool,
}

/// A prepared automation script, ready to drive one session.
#[derive(Debug)]
pub struct Automator {
    steps: Vec<PreparedStep>,
    advance: Arc<Notify>,
}

impl Automator {
    /// Compile the script against the session's resolved options, registering
    /// the advance endpoint and any ad-hoc binding endpoints.
    pub fn prepare(
        steps: Vec<ScriptStep>,
        resolved: &ResolvedOptions,
        registry: &EndpointRegistry,
    ) -> Result<Self> {
        let advance = Arc::new(Notify::new());
        let advance_call = {
            let advance = Arc::clone(&advance);
            ServerCall::new("automator-advance", CallKind::ExecuteSilent, move |_s, _r| {
                advance.notify_one();
                Ok(String::new())
            })
        };
        registry.register(Endpoint::from_call(&advance_call, None))?;
        let advance_expr = Action::call(advance_call).action_string();

        let mut prepared = Vec::with_capacity(steps.len());
        for step in steps {
            let (label, expr, ends_session) = match step {
                ScriptStep::Trigger(trigger) => {
                    let bind = resolved.bind_for(trigger).ok_or(Error::UnboundTrigger {
                        trigger: trigger.to_string(),
                    })?;
                    (trigger.to_string(), bind.expr.clone(), bind.ends_session)
                }
                ScriptStep::Binding(binding) => {
                    let compiled = compile_binding(None, &binding, registry)?;
                    (binding.name(), compiled.expr, compiled.ends_session)
                }
            };
            // A finishing step ends the finder; nothing would fire the
            // advance callback after it.
            let expr = if ends_session {
                expr
            } else {
                format!("{expr}+{advance_expr}")
            };
            prepared.push(PreparedStep {
                label,
                expr,
                ends_session,
            });
        }

        Ok(Self {
            steps: prepared,
            advance,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drive the session: wait for the remote-control port, then post each
    /// step and block on its advance callback.
    ///
    /// Runs on its own task and never propagates errors — a wedged script
    /// surfaces as the orchestrator's missing-result error, with the cause in
    /// the log.
    pub async fn run(self, session: Arc<Mutex<SessionState>>) {
        let port = self.wait_for_port(&session).await;
        let controller = Controller::new(port);

        for step in &self.steps {
            debug!(step = %step.label, "posting scripted step");
            // Create the future before posting so an advance callback firing
            // immediately cannot be missed.
            let advanced = self.advance.notified();
            if let Err(e) = controller.post(&step.expr).await {
                error!(step = %step.label, error = %e, "scripted step failed; stopping script");
                return;
            }
            if step.ends_session {
                debug!(step = %step.label, "finishing step posted; script complete");
                return;
            }
            // No timeout: a hang here is a protocol bug, not a recoverable
            // condition.
            advanced.await;
        }
        debug!("script complete");
    }

    async fn wait_for_port(&self, session: &Arc<Mutex<SessionState>>) -> u16 {
        let mut polls: u32 = 0;
        loop {
            if let Some(port) = session.lock().await.remote_port() {
                debug!(port, "remote control port known");
                return port;
            }
            polls += 1;
            if polls % PORT_POLLS_PER_WARNING == 0 {
                warn!(
                    waited_ms = polls as u64 * PORT_POLL_INTERVAL.as_millis() as u64,
                    "finder has not reported its remote control port yet"
                );
            }
            tokio::time::sleep(PORT_POLL_INTERVAL).await;
        }
    }
}
