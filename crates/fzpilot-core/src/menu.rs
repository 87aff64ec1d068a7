//! The action menu: trigger → binding registry and its rendering
//!
//! The menu owns conflict resolution between features that want the same
//! trigger, and is the single place where bindings become finder options.
//! Rendering doubles as endpoint discovery: every server call found while
//! walking the registered bindings is registered with the endpoint registry,
//! so nothing is reachable from the finder without also being dispatchable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::action::{Action, CallKind, ServerCall};
use crate::binding::{ActionGroup, Binding};
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::error::{Error, Result};
use crate::trigger::Trigger;

/// What to do when a trigger is bound a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Fail loudly; the default.
    #[default]
    Raise,
    /// The new binding replaces the old one.
    Override,
    /// Old then new (`existing + new`).
    Append,
    /// New then old (`new + existing`).
    Prepend,
    /// Alternate between them (`existing | new`).
    Cycle,
}

/// Named, ordered registry of trigger → binding pairs.
#[derive(Default)]
pub struct ActionMenu {
    bindings: Vec<(Trigger, Binding)>,
}

impl ActionMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding under a trigger, resolving conflicts per policy.
    pub fn add(&mut self, trigger: Trigger, binding: Binding, on_conflict: OnConflict) -> Result<()> {
        let position = self.bindings.iter().position(|(t, _)| *t == trigger);
        match position {
            None => {
                debug!(trigger = %trigger, binding = %binding.name(), "binding added");
                self.bindings.push((trigger, binding));
                Ok(())
            }
            Some(i) => {
                let existing = &self.bindings[i].1;
                let merged = match on_conflict {
                    OnConflict::Raise => {
                        return Err(Error::BindingConflict {
                            trigger: trigger.to_string(),
                            existing: existing.name(),
                            new: binding.name(),
                        })
                    }
                    OnConflict::Override => binding,
                    OnConflict::Append => existing.then(&binding)?,
                    OnConflict::Prepend => binding.then(existing)?,
                    OnConflict::Cycle => existing.cycle_with(&binding)?,
                };
                debug!(trigger = %trigger, binding = %merged.name(), "binding replaced");
                self.bindings[i].1 = merged;
                Ok(())
            }
        }
    }

    pub fn get(&self, trigger: Trigger) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, b)| b)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Render every registered pair into finder options, registering each
    /// discovered server call along the way. Walks each pair exactly once.
    pub fn resolve(&self, registry: &EndpointRegistry) -> Result<ResolvedOptions> {
        let mut binds = Vec::with_capacity(self.bindings.len());
        for (trigger, binding) in &self.bindings {
            let compiled = compile_binding(Some(*trigger), binding, registry)?;
            binds.push(ResolvedBind {
                trigger: *trigger,
                name: binding.name(),
                expr: compiled.expr,
                ends_session: compiled.ends_session,
            });
        }

        // Legend covers key bindings; situational events are not something
        // the user presses.
        let header = binds
            .iter()
            .filter(|b| matches!(b.trigger, Trigger::Key(_)))
            .map(|b| format!("{}: {}", b.trigger, b.name))
            .collect::<Vec<_>>()
            .join(" │ ");

        let mut flags = Vec::with_capacity(binds.len() + 2);
        for bind in &binds {
            flags.push(format!("--bind={}:{}", bind.trigger, bind.expr));
        }
        if !header.is_empty() {
            flags.push(format!("--header={header}"));
        }

        Ok(ResolvedOptions {
            flags,
            header,
            binds,
        })
    }
}

/// A binding rendered to the finder's bind-flag syntax.
#[derive(Debug, Clone)]
pub struct ResolvedBind {
    pub trigger: Trigger,
    pub name: String,
    pub expr: String,
    pub ends_session: bool,
}

/// The finder options a menu renders to.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOptions {
    /// `--bind=...` flags plus the legend header flag.
    pub flags: Vec<String>,
    /// Human-readable trigger legend.
    pub header: String,
    /// Per-trigger rendered bindings.
    pub binds: Vec<ResolvedBind>,
}

impl ResolvedOptions {
    pub fn bind_for(&self, trigger: Trigger) -> Option<&ResolvedBind> {
        self.binds.iter().find(|b| b.trigger == trigger)
    }
}

/// A binding compiled to one finder action expression.
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    pub expr: String,
    pub ends_session: bool,
    /// Endpoint ids registered while compiling, in registration order.
    pub registered: Vec<String>,
}

/// Compile a binding to its action expression, registering its server calls.
///
/// A plain binding renders directly. A cycle compiles to a single transform
/// endpoint holding the cycle pointer; each firing answers with the next
/// group's pre-rendered expression.
pub fn compile_binding(
    trigger: Option<Trigger>,
    binding: &Binding,
    registry: &EndpointRegistry,
) -> Result<CompiledBinding> {
    if !binding.is_cycle() {
        return compile_group(trigger, &binding.groups()[0], registry);
    }

    let mut registered = Vec::new();
    let mut exprs = Vec::with_capacity(binding.groups().len());
    for group in binding.groups() {
        let compiled = compile_group(trigger, group, registry)?;
        registered.extend(compiled.registered);
        exprs.push(compiled.expr);
    }

    let pointer = Arc::new(AtomicUsize::new(0));
    let count = exprs.len();
    let call = ServerCall::new(
        format!("cycle-{}", binding.name()),
        CallKind::Transform,
        move |_session, _request| {
            let i = pointer.fetch_add(1, Ordering::SeqCst) % count;
            Ok(exprs[i].clone())
        },
    );
    registry.register(Endpoint::from_call(&call, trigger))?;
    registered.push(call.id().to_string());

    Ok(CompiledBinding {
        expr: Action::call(call).action_string(),
        ends_session: false,
        registered,
    })
}

/// Compile one action group, registering its server calls and expanding a
/// finishing action into its recording endpoint plus the native ending.
pub fn compile_group(
    trigger: Option<Trigger>,
    group: &ActionGroup,
    registry: &EndpointRegistry,
) -> Result<CompiledBinding> {
    let mut registered = Vec::new();
    let mut parts = Vec::with_capacity(group.actions().len() + 2);

    for action in group.actions() {
        let mut calls = Vec::new();
        action.collect_calls(&mut calls);
        for call in calls {
            registry.register(Endpoint::from_call(call, trigger))?;
            registered.push(call.id().to_string());
        }
        parts.push(action.action_string());
    }

    let mut ends_session = false;
    if let Some(status) = group.final_action() {
        ends_session = true;
        let record = ServerCall::new(
            format!("finish-{}", status.as_str()),
            CallKind::ExecuteSilent,
            move |session, request| {
                session.finish(status, trigger, &request.snapshot)?;
                Ok(String::new())
            },
        );
        registry.register(Endpoint::from_call(&record, trigger))?;
        registered.push(record.id().to_string());
        parts.push(Action::call(record).action_string());
        parts.push(status.native_action().to_string());
    }

    Ok(CompiledBinding {
        expr: parts.join("+"),
        ends_session,
        registered,
    })
}
