//! Session state: the one mutable object shared across a run
//!
//! A [`SessionState`] is created once per interactive run, mutated by host
//! callbacks inside the server's serialized dispatch and by the orchestrator,
//! and destroyed after its [`SessionResult`] is taken. The stage machine is
//! the sole coordination point between those writers: setup is irreversible,
//! and the result is only readable after a finishing action moved the session
//! to [`Stage::Finished`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::{Action, CallKind, EndStatus, Kwargs, ParamSource, ServerCall};
use crate::binding::Binding;
use crate::endpoint::EndpointRegistry;
use crate::entry::EntryRef;
use crate::error::{Error, Result};
use crate::menu::{ActionMenu, OnConflict, ResolvedOptions};
use crate::trigger::{Key, SituationalEvent, Trigger};

/// Lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Entries and metadata set; bindings still being registered.
    Created,
    /// Options finalized; setup can no longer change.
    ReadyToRun,
    /// The finder reported startup success.
    Running,
    /// A finishing action fired; the result is fixed.
    Finished,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ReadyToRun => "ready to run",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The finder-side state captured at the moment a server call fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current query string.
    pub query: String,
    /// Index of the entry under the cursor, if any.
    pub cursor_index: Option<usize>,
    /// Number of selected entries.
    pub select_count: usize,
    /// Indices of the target entries (selection, or the cursor entry).
    pub indices: Vec<usize>,
}

/// One framed request from the helper program to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub endpoint_id: String,
    pub snapshot: Snapshot,
    #[serde(default)]
    pub kwargs: Kwargs,
}

/// Immutable snapshot taken when the session ended.
#[derive(Clone)]
pub struct SessionResult {
    pub end_status: EndStatus,
    /// The trigger whose binding ended the session, when determinable.
    pub trigger: Option<Trigger>,
    pub query: String,
    pub cursor_index: Option<usize>,
    pub cursor_entry: Option<EntryRef>,
    pub selected_indices: Vec<usize>,
    pub selections: Vec<EntryRef>,
    /// The selection, or the cursor entry when nothing was selected.
    pub targets: Vec<EntryRef>,
    pub metadata: serde_json::Value,
    pub finished_at: DateTime<Local>,
}

impl fmt::Debug for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionResult")
            .field("end_status", &self.end_status)
            .field("trigger", &self.trigger)
            .field("query", &self.query)
            .field("cursor_index", &self.cursor_index)
            .field("selected_indices", &self.selected_indices)
            .field(
                "targets",
                &self
                    .targets
                    .iter()
                    .map(|e| e.display().into_owned())
                    .collect::<Vec<_>>(),
            )
            .field("finished_at", &self.finished_at)
            .finish_non_exhaustive()
    }
}

/// The mutable, single-run state shared between the orchestrator and every
/// host callback.
pub struct SessionState {
    entries: Vec<EntryRef>,
    metadata: serde_json::Value,
    menu: ActionMenu,
    registry: EndpointRegistry,
    vars: HashMap<String, String>,
    stage: Stage,
    remote_port: Option<u16>,
    resolved: Option<ResolvedOptions>,
    result: Option<SessionResult>,
}

impl SessionState {
    pub fn new(entries: Vec<EntryRef>) -> Self {
        Self {
            entries,
            metadata: serde_json::Value::Null,
            menu: ActionMenu::new(),
            registry: EndpointRegistry::new(),
            vars: HashMap::new(),
            stage: Stage::Created,
            remote_port: None,
            resolved: None,
            result: None,
        }
    }

    /// Convenience constructor for plain string entries.
    pub fn from_strings(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(crate::entry::entries_from(
            lines.into_iter().map(Into::into).collect::<Vec<String>>(),
        ))
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    // ─────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────

    pub fn entries(&self) -> &[EntryRef] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&EntryRef> {
        self.entries.get(index)
    }

    /// Replace the entry list (a reload endpoint ran).
    pub fn set_entries(&mut self, entries: Vec<EntryRef>) {
        debug!(count = entries.len(), "entry list replaced");
        self.entries = entries;
    }

    /// Append one entry (incremental streaming).
    pub fn push_entry(&mut self, entry: EntryRef) {
        self.entries.push(entry);
    }

    /// Display lines in list order, one per entry.
    pub fn entry_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.display().into_owned())
            .collect()
    }

    // ─────────────────────────────────────────────────────────
    // Metadata and run-scoped variables
    // ─────────────────────────────────────────────────────────

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: serde_json::Value) {
        self.metadata = metadata;
    }

    /// Read a run-scoped variable set by an earlier callback.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Stash a value for later steps of a multi-trigger interaction.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    // ─────────────────────────────────────────────────────────
    // Menu, registry, options
    // ─────────────────────────────────────────────────────────

    /// Mutable menu access; only valid before finalization.
    pub fn menu_mut(&mut self) -> Result<&mut ActionMenu> {
        if self.stage != Stage::Created {
            return Err(Error::stage("register bindings", self.stage));
        }
        Ok(&mut self.menu)
    }

    pub fn menu(&self) -> &ActionMenu {
        &self.menu
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Rendered options; available once finalized.
    pub fn resolved(&self) -> Option<&ResolvedOptions> {
        self.resolved.as_ref()
    }

    pub fn remote_port(&self) -> Option<u16> {
        self.remote_port
    }

    /// Record the finder's remote-control port (reported by the start event).
    pub fn set_remote_port(&mut self, port: u16) {
        debug!(port, "remote control port reported");
        self.remote_port = Some(port);
    }

    // ─────────────────────────────────────────────────────────
    // Stage machine
    // ─────────────────────────────────────────────────────────

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Close setup: install the default finishing bindings and the
    /// start-event port binding, render the menu into finder options, and
    /// move to `ReadyToRun`. Irreversible; calling twice is an error.
    pub fn finalize(&mut self) -> Result<()> {
        if self.stage != Stage::Created {
            return Err(Error::stage("finalize", self.stage));
        }

        if self.menu.get(Trigger::Key(Key::Enter)).is_none() {
            self.menu.add(
                Key::Enter.into(),
                Binding::named("accept", [Action::accept()])?,
                OnConflict::Raise,
            )?;
        }
        if self.menu.get(Trigger::Key(Key::Esc)).is_none() {
            self.menu.add(
                Key::Esc.into(),
                Binding::named("abort", [Action::abort()])?,
                OnConflict::Raise,
            )?;
        }

        // The finder reports startup (and its remote-control port, when one
        // exists) through this endpoint; it is what moves the session to
        // Running.
        let start_call = ServerCall::new("session-start", CallKind::ExecuteSilent, |session, req| {
            if let Some(port) = req
                .kwargs
                .get("port")
                .and_then(|p| p.trim().parse::<u16>().ok())
            {
                session.set_remote_port(port);
            }
            session.mark_running()?;
            Ok(String::new())
        })
        .with_param("port", ParamSource::Env("FZF_PORT".into()));
        self.menu.add(
            SituationalEvent::Start.into(),
            Binding::named("session-start", [Action::call(start_call)])?,
            OnConflict::Prepend,
        )?;

        self.resolved = Some(self.menu.resolve(&self.registry)?);
        self.stage = Stage::ReadyToRun;
        Ok(())
    }

    /// The finder signalled startup success.
    pub fn mark_running(&mut self) -> Result<()> {
        match self.stage {
            Stage::ReadyToRun => {
                self.stage = Stage::Running;
                debug!("session running");
                Ok(())
            }
            Stage::Running => {
                debug!("start signal repeated; already running");
                Ok(())
            }
            other => Err(Error::stage("mark running", other)),
        }
    }

    /// Record the result and end the session. Exactly one finishing callback
    /// ever performs this transition.
    pub fn finish(
        &mut self,
        end_status: EndStatus,
        trigger: Option<Trigger>,
        snapshot: &Snapshot,
    ) -> Result<()> {
        match self.stage {
            Stage::Running => {}
            Stage::Finished => return Err(Error::AlreadyFinished),
            other => return Err(Error::stage("finish", other)),
        }

        let mut selections = Vec::with_capacity(snapshot.indices.len());
        let mut selected_indices = Vec::with_capacity(snapshot.indices.len());
        for &index in &snapshot.indices {
            match self.entries.get(index) {
                Some(entry) => {
                    selections.push(entry.clone());
                    selected_indices.push(index);
                }
                None => warn!(index, "selection index out of range; dropped"),
            }
        }

        let cursor_entry = snapshot
            .cursor_index
            .and_then(|i| self.entries.get(i))
            .cloned();

        let targets = if selections.is_empty() {
            cursor_entry.iter().cloned().collect()
        } else {
            selections.clone()
        };

        self.result = Some(SessionResult {
            end_status,
            trigger,
            query: snapshot.query.clone(),
            cursor_index: snapshot.cursor_index,
            cursor_entry,
            selected_indices,
            selections,
            targets,
            metadata: self.metadata.clone(),
            finished_at: Local::now(),
        });
        self.stage = Stage::Finished;
        debug!(status = %end_status, "session finished");
        Ok(())
    }

    /// Borrow the result; an error until the session finished.
    pub fn result(&self) -> Result<&SessionResult> {
        if self.stage != Stage::Finished {
            return Err(Error::ResultNotReady {
                stage: self.stage.to_string(),
            });
        }
        self.result.as_ref().ok_or(Error::AlreadyFinished)
    }

    /// Take the result out of the session; an error until the session
    /// finished, and at most once after.
    pub fn take_result(&mut self) -> Result<SessionResult> {
        if self.stage != Stage::Finished {
            return Err(Error::ResultNotReady {
                stage: self.stage.to_string(),
            });
        }
        self.result.take().ok_or(Error::AlreadyFinished)
    }
}
