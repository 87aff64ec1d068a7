//! Actions: the units of behavior the finder can execute
//!
//! An [`Action`] renders to the finder's textual action-expression grammar via
//! [`Action::action_string`]. Most variants are plain text for the finder;
//! [`ServerCall`] is the exception — it renders to a shell command that calls
//! back into the host process over the session's RPC socket.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Request, SessionState};

/// Environment variable carrying the RPC server port into the finder's shell.
pub const PORT_ENV: &str = "FZPILOT_PORT";

/// Environment variable overriding the helper program used in generated
/// commands. Defaults to `fzpilot-client` on PATH.
pub const CLIENT_ENV: &str = "FZPILOT_CLIENT";

/// Default helper program name.
pub const DEFAULT_CLIENT: &str = "fzpilot-client";

/// Global server-call counter; ids must be unique per call instance.
static CALL_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_call_id(name: &str) -> String {
    let n = CALL_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{name}-{n}")
}

/// How a session ends, fixed by the finishing action that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStatus {
    /// The user (or script) accepted the current selection.
    Accept,
    /// The session was abandoned.
    Abort,
    /// The session was ended programmatically without a selection.
    Quit,
}

impl EndStatus {
    /// The native finder action that performs this ending.
    pub fn native_action(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Abort | Self::Quit => "abort",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Abort => "abort",
            Self::Quit => "quit",
        }
    }
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The finder action type a server call is embedded in.
///
/// The kind decides what the finder does with the command's stdout: `execute`
/// shows it, `execute-silent` discards it, `transform` interprets it as an
/// action expression, `reload` replaces the entry list with it, `preview`
/// renders it in the preview window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    ExecuteSilent,
    Transform,
    Reload,
    Preview,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::ExecuteSilent => "execute-silent",
            Self::Transform => "transform",
            Self::Reload => "reload",
            Self::Preview => "preview",
        }
    }
}

/// Where a declared server-call parameter takes its value from when the
/// finder's shell runs the generated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// A fixed value baked into the command line.
    Literal(String),
    /// An environment variable read in the finder's shell.
    Env(String),
    /// A shell command whose captured stdout becomes the value.
    CommandOutput(String),
}

/// A declared parameter of a server-call host function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub source: ParamSource,
}

/// Host callback invoked when the finder executes the generated command.
///
/// Runs inside the server's serialized dispatch with exclusive access to the
/// session; the returned string travels back as the response body and becomes
/// the command's stdout inside the finder.
pub type CallbackFn =
    Arc<dyn Fn(&mut SessionState, &Request) -> Result<String> + Send + Sync>;

/// A host function reachable from inside the finder.
///
/// Each instance owns a unique endpoint id; cloning shares the id and the
/// callback, so a call distributed into several groups of one binding remains
/// a single endpoint.
#[derive(Clone)]
pub struct ServerCall {
    id: String,
    name: String,
    kind: CallKind,
    function: CallbackFn,
    params: Vec<Param>,
}

impl ServerCall {
    pub fn new(
        name: impl Into<String>,
        kind: CallKind,
        function: impl Fn(&mut SessionState, &Request) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            id: next_call_id(&name),
            name,
            kind,
            function: Arc::new(function),
            params: Vec::new(),
        }
    }

    /// Declare a parameter; its rendered source appears as one `--kwarg` in
    /// the generated command and arrives server-side under `name`.
    pub fn with_param(mut self, name: impl Into<String>, source: ParamSource) -> Self {
        self.params.push(Param {
            name: name.into(),
            source,
        });
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn function(&self) -> CallbackFn {
        Arc::clone(&self.function)
    }

    /// The shell command the finder runs for this call.
    ///
    /// The fixed placeholders (`{q}`, `{n}`, `{+n}`) and environment reads are
    /// substituted by the finder at execution time; the helper program and
    /// port resolve from `FZPILOT_CLIENT` / `FZPILOT_PORT` so embedders and
    /// tests can redirect both without changing the rendered contract.
    pub fn command_line(&self) -> String {
        let mut cmd = format!(
            "\"${{{client}:-{default}}}\" --port \"${port}\" --endpoint {id} \
             --query {{q}} --index {{n}} --select-count \"${{FZF_SELECT_COUNT:-0}}\" --indices {{+n}}",
            client = CLIENT_ENV,
            default = DEFAULT_CLIENT,
            port = PORT_ENV,
            id = sh_quote(&self.id),
        );
        for param in &self.params {
            cmd.push_str(" --kwarg ");
            match &param.source {
                ParamSource::Literal(value) => {
                    cmd.push_str(&sh_quote(&format!("{}={}", param.name, value)));
                }
                ParamSource::Env(var) => {
                    cmd.push_str(&format!("\"{}=${}\"", param.name, var));
                }
                ParamSource::CommandOutput(shell) => {
                    cmd.push_str(&format!("\"{}=$({})\"", param.name, shell));
                }
            }
        }
        cmd
    }
}

impl fmt::Debug for ServerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCall")
            .field("id", &self.id)
            .field("kind", &self.kind.as_str())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// One unit of behavior the finder can execute.
#[derive(Debug, Clone)]
pub enum Action {
    /// An opaque action name the finder understands natively (`toggle-all`).
    Base(String),
    /// A named action type plus one argument, rendered `kind(argument)`.
    Parametrized { kind: String, argument: String },
    /// An ordered list of actions joined by `+`.
    Composite(Vec<Action>),
    /// A host callback reachable over the RPC socket.
    Call(ServerCall),
    /// A finishing action; must be the last action of its group.
    End(EndStatus),
}

impl Action {
    pub fn base(name: impl Into<String>) -> Self {
        Self::Base(name.into())
    }

    pub fn with_arg(kind: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::Parametrized {
            kind: kind.into(),
            argument: argument.into(),
        }
    }

    pub fn composite(actions: impl IntoIterator<Item = Action>) -> Self {
        Self::Composite(actions.into_iter().collect())
    }

    pub fn call(call: ServerCall) -> Self {
        Self::Call(call)
    }

    pub fn accept() -> Self {
        Self::End(EndStatus::Accept)
    }

    pub fn abort() -> Self {
        Self::End(EndStatus::Abort)
    }

    pub fn quit() -> Self {
        Self::End(EndStatus::Quit)
    }

    /// A silent fire-and-forget host callback, for side effects computed
    /// inside transforms ("select matching", "stash a variable", ...).
    pub fn effect(
        name: impl Into<String>,
        f: impl Fn(&mut SessionState, &Request) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::Call(ServerCall::new(name, CallKind::ExecuteSilent, move |s, r| {
            f(s, r)?;
            Ok(String::new())
        }))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End(_))
    }

    /// Render into the finder's action-expression grammar.
    pub fn action_string(&self) -> String {
        match self {
            Self::Base(name) => name.clone(),
            Self::Parametrized { kind, argument } => wrap_argument(kind, argument),
            Self::Composite(actions) => actions
                .iter()
                .map(Action::action_string)
                .collect::<Vec<_>>()
                .join("+"),
            Self::Call(call) => wrap_argument(call.kind().as_str(), &call.command_line()),
            Self::End(status) => status.native_action().to_string(),
        }
    }

    /// Short human label used when deriving group names.
    pub fn summary(&self) -> String {
        match self {
            Self::Base(name) => name.clone(),
            Self::Parametrized { kind, .. } => kind.clone(),
            Self::Composite(actions) => actions
                .iter()
                .map(Action::summary)
                .collect::<Vec<_>>()
                .join("+"),
            Self::Call(call) => call.name().to_string(),
            Self::End(status) => status.as_str().to_string(),
        }
    }

    /// Collect every server call reachable from this action.
    pub fn collect_calls<'a>(&'a self, out: &mut Vec<&'a ServerCall>) {
        match self {
            Self::Call(call) => out.push(call),
            Self::Composite(actions) => {
                for action in actions {
                    action.collect_calls(out);
                }
            }
            _ => {}
        }
    }
}

/// Render `kind(argument)`, picking a delimiter pair the argument does not
/// close prematurely.
fn wrap_argument(kind: &str, argument: &str) -> String {
    const PAIRS: [(char, char); 4] = [('(', ')'), ('{', '}'), ('[', ']'), ('<', '>')];
    for (open, close) in PAIRS {
        if !argument.contains(close) {
            return format!("{kind}{open}{argument}{close}");
        }
    }
    // Every closing delimiter appears in the argument; parentheses are the
    // least surprising fallback.
    tracing::warn!(kind, "action argument contains every closing delimiter");
    format!("{kind}({argument})")
}

/// Quote a string for POSIX `sh` if it needs it.
pub(crate) fn sh_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%_+=:,./-".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Key-value arguments decoded from `--kwarg name=value` pairs.
pub type Kwargs = HashMap<String, String>;
