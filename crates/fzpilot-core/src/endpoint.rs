//! Endpoint registry: the table of host functions the finder can reach
//!
//! The registry is the single handle shared between the action menu (which
//! registers calls while rendering bindings), the RPC server (which dispatches
//! requests), and transforms (which register and tear down endpoints while the
//! finder is running).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::action::{CallbackFn, ServerCall};
use crate::error::{Error, Result};
use crate::trigger::Trigger;

/// A registered host function plus the trigger it is scoped under.
///
/// The trigger is diagnostic only — it names where the endpoint came from when
/// a dispatch fails or a call instance is reused across triggers.
#[derive(Clone)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub trigger: Option<Trigger>,
    pub function: CallbackFn,
}

impl Endpoint {
    pub fn from_call(call: &ServerCall, trigger: Option<Trigger>) -> Self {
        Self {
            id: call.id().to_string(),
            name: call.name().to_string(),
            trigger,
            function: call.function(),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Shared, session-wide endpoint table keyed by endpoint id.
#[derive(Clone, Default)]
pub struct EndpointRegistry {
    inner: Arc<Mutex<HashMap<String, Endpoint>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint.
    ///
    /// Call ids are unique per instance, so re-registering the same id is the
    /// same call seen again (a cycle distributed into several groups) and is
    /// idempotent — unless the trigger scope differs, which means one call
    /// instance was attached to two triggers and must be rejected.
    pub fn register(&self, endpoint: Endpoint) -> Result<()> {
        let mut table = self.inner.lock().expect("endpoint table lock poisoned");
        if let Some(existing) = table.get(&endpoint.id) {
            if existing.trigger == endpoint.trigger {
                return Ok(());
            }
            return Err(Error::ServerCallReuse {
                id: endpoint.id.clone(),
                existing: scope_label(existing.trigger),
                attempted: scope_label(endpoint.trigger),
            });
        }
        debug!(id = %endpoint.id, trigger = %scope_label(endpoint.trigger), "endpoint registered");
        table.insert(endpoint.id.clone(), endpoint);
        Ok(())
    }

    /// Remove an endpoint; missing ids are fine (a transform tearing down the
    /// previous firing's endpoints after an override).
    pub fn deregister(&self, id: &str) {
        let mut table = self.inner.lock().expect("endpoint table lock poisoned");
        if table.remove(id).is_some() {
            debug!(id, "endpoint deregistered");
        }
    }

    pub fn get(&self, id: &str) -> Option<Endpoint> {
        self.inner
            .lock()
            .expect("endpoint table lock poisoned")
            .get(id)
            .cloned()
    }

    /// Trigger scope of an endpoint, for dynamic bindings that need to know
    /// where their own invocation came from.
    pub fn trigger_of(&self, id: &str) -> Option<Trigger> {
        self.inner
            .lock()
            .expect("endpoint table lock poisoned")
            .get(id)
            .and_then(|e| e.trigger)
    }

    /// Sorted list of known ids, for unknown-endpoint diagnostics.
    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .lock()
            .expect("endpoint table lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("endpoint table lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn scope_label(trigger: Option<Trigger>) -> String {
    match trigger {
        Some(t) => t.to_string(),
        None => "<dynamic>".to_string(),
    }
}
