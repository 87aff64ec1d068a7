//! Transforms: host functions that compute bindings at call time
//!
//! A transform is a server call whose callback builds a [`Binding`] from live
//! session state and answers with its rendered action expression, which the
//! finder executes immediately. All branching ("reload the list", "select
//! matching entries", "end the session if...") happens host-side, once per
//! firing; the finder never learns about predicates or conditionals.
//!
//! Endpoints created for a firing's throwaway binding are torn down on the
//! next firing, so repeated firings do not grow the endpoint table.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::action::{Action, CallKind, ServerCall};
use crate::binding::Binding;
use crate::entry::EntryRef;
use crate::error::Result;
use crate::menu::compile_binding;
use crate::session::{Request, SessionState};

/// Wrap a binding-computing host function as a transform server call.
///
/// On each firing the callback tears down the previous firing's dynamic
/// endpoints, invokes `f`, registers the server calls found inside the
/// returned binding, and answers with the rendered expression.
pub fn transform(
    name: impl Into<String>,
    f: impl Fn(&mut SessionState, &Request) -> Result<Binding> + Send + Sync + 'static,
) -> ServerCall {
    let dynamic: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    ServerCall::new(name, CallKind::Transform, move |session, request| {
        let registry = session.registry().clone();
        for id in dynamic
            .lock()
            .expect("transform ledger lock poisoned")
            .drain(..)
        {
            registry.deregister(&id);
        }

        let binding = f(session, request)?;
        let trigger = registry.trigger_of(&request.endpoint_id);
        let compiled = compile_binding(trigger, &binding, &registry)?;
        *dynamic.lock().expect("transform ledger lock poisoned") = compiled.registered;
        Ok(compiled.expr)
    })
}

/// A reload endpoint: replaces the session's entries and streams the new
/// display lines back as the finder's new list.
pub fn reload(
    name: impl Into<String>,
    producer: impl Fn(&mut SessionState, &Request) -> Result<Vec<EntryRef>> + Send + Sync + 'static,
) -> ServerCall {
    ServerCall::new(name, CallKind::Reload, move |session, request| {
        let entries = producer(session, request)?;
        session.set_entries(entries);
        Ok(session.entry_lines().join("\n"))
    })
}

/// A reload that re-selects surviving entries.
///
/// Entries of the new list whose [`key`](crate::entry::Entry::key) matches a
/// pre-reload selection are re-selected (`pos(i)+select` chains); entries that
/// disappeared simply stay unselected.
pub fn reload_preserving_selection(
    name: impl Into<String>,
    producer: impl Fn(&mut SessionState, &Request) -> Result<Vec<EntryRef>> + Send + Sync + 'static,
) -> ServerCall {
    let name = name.into();
    let apply_name = format!("{name}-apply");
    transform(name, move |session, request| {
        let selected_keys: HashSet<String> = request
            .snapshot
            .indices
            .iter()
            .filter_map(|&i| session.entry(i))
            .map(|e| e.key().into_owned())
            .collect();

        let entries = producer(session, request)?;
        session.set_entries(entries);

        let mut actions = vec![Action::call(ServerCall::new(
            "reload-entries",
            CallKind::Reload,
            |session, _request| Ok(session.entry_lines().join("\n")),
        ))];
        for (i, entry) in session.entries().iter().enumerate() {
            if selected_keys.contains(entry.key().as_ref()) {
                // Finder positions are 1-based.
                actions.push(Action::with_arg("pos", (i + 1).to_string()));
                actions.push(Action::base("select"));
            }
        }
        Binding::named(apply_name.clone(), actions)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, EndpointRegistry};
    use crate::entry::entries_from;
    use crate::session::Snapshot;

    fn fire(
        registry: &EndpointRegistry,
        session: &mut SessionState,
        id: &str,
        indices: &[usize],
    ) -> Result<String> {
        let endpoint = registry.get(id).expect("endpoint must be registered");
        let request = Request {
            endpoint_id: id.to_string(),
            snapshot: Snapshot {
                query: String::new(),
                cursor_index: None,
                select_count: indices.len(),
                indices: indices.to_vec(),
            },
            kwargs: Default::default(),
        };
        (endpoint.function)(session, &request)
    }

    #[test]
    fn test_transform_renders_computed_binding() {
        let call = transform("pick-direction", |session, _| {
            if session.entries().len() > 1 {
                Binding::named("down", [Action::base("down")])
            } else {
                Binding::named("up", [Action::base("up")])
            }
        });
        let id = call.id().to_string();
        let registry = EndpointRegistry::new();
        registry
            .register(Endpoint::from_call(&call, None))
            .unwrap();

        let mut session = SessionState::from_strings(["a", "b"]);
        let expr = fire(&registry, &mut session, &id, &[]).unwrap();
        assert_eq!(expr, "down");
    }

    #[test]
    fn test_transform_bounds_dynamic_endpoint_growth() {
        let call = transform("noisy", |_, _| {
            Binding::named(
                "effects",
                [
                    Action::effect("side-effect", |_, _| Ok(())),
                    Action::base("up"),
                ],
            )
        });
        let id = call.id().to_string();
        let registry = EndpointRegistry::new();
        registry
            .register(Endpoint::from_call(&call, None))
            .unwrap();

        let mut session = SessionState::from_strings(["a"]);
        fire(&registry, &mut session, &id, &[]).unwrap();
        let after_first = registry.len();
        fire(&registry, &mut session, &id, &[]).unwrap();
        fire(&registry, &mut session, &id, &[]).unwrap();
        assert_eq!(
            registry.len(),
            after_first,
            "repeated firings must not accumulate endpoints"
        );
    }

    #[test]
    fn test_reload_replaces_entries_and_streams_lines() {
        let call = reload("refresh", |_, _| Ok(entries_from(["x", "y"])));
        let id = call.id().to_string();
        let registry = EndpointRegistry::new();
        registry
            .register(Endpoint::from_call(&call, None))
            .unwrap();

        let mut session = SessionState::from_strings(["a", "b", "c"]);
        let body = fire(&registry, &mut session, &id, &[]).unwrap();
        assert_eq!(body, "x\ny");
        assert_eq!(session.entries().len(), 2);
    }

    #[test]
    fn test_reload_preserving_selection_reselects_surviving_keys() {
        let call = reload_preserving_selection("refresh", |_, _| {
            Ok(entries_from(["beta", "gamma", "delta"]))
        });
        let id = call.id().to_string();
        let registry = EndpointRegistry::new();
        registry
            .register(Endpoint::from_call(&call, None))
            .unwrap();

        // "alpha" and "gamma" are selected before the reload; only "gamma"
        // survives into the new list, at 1-based position 2.
        let mut session = SessionState::from_strings(["alpha", "beta", "gamma"]);
        let expr = fire(&registry, &mut session, &id, &[0, 2]).unwrap();

        assert!(expr.starts_with("reload("));
        assert!(expr.contains("pos(2)+select"));
        assert!(!expr.contains("pos(1)"), "beta was never selected: {expr}");
        assert!(!expr.contains("pos(3)"), "delta was never selected: {expr}");
        assert_eq!(session.entry_lines(), vec!["beta", "gamma", "delta"]);
    }

    #[test]
    fn test_reload_preserving_selection_drops_vanished_keys() {
        let call = reload_preserving_selection("refresh", |_, _| Ok(entries_from(["fresh"])));
        let id = call.id().to_string();
        let registry = EndpointRegistry::new();
        registry
            .register(Endpoint::from_call(&call, None))
            .unwrap();

        let mut session = SessionState::from_strings(["old-one", "old-two"]);
        let expr = fire(&registry, &mut session, &id, &[0, 1]).unwrap();
        assert!(!expr.contains("+select"), "nothing survives: {expr}");
        assert!(!expr.contains("pos("), "nothing survives: {expr}");
    }
}
