//! # fzpilot-core - Bindings, Sessions, Endpoints
//!
//! Foundation crate for fzpilot. Turns the external fuzzy finder's flat
//! key-binding vocabulary into composable host-side values: actions, bindings,
//! a conflict-aware action menu, an endpoint registry, and the per-run session
//! state shared between the orchestrator and every host callback.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Actions (`action`)
//! - [`Action`] - One unit of finder behavior (native, parametrized, composite,
//!   server call, or finishing)
//! - [`ServerCall`] - A host function reachable from inside the finder
//! - [`CallKind`], [`ParamSource`], [`EndStatus`]
//!
//! ### Bindings (`binding`)
//! - [`ActionGroup`] - Named action sequence with at most one trailing
//!   finishing action
//! - [`Binding`] - A group or a cycle of groups, with `then` / `cycle_with`
//!   combinators
//!
//! ### Menu (`menu`)
//! - [`ActionMenu`] - Trigger → binding registry with conflict policies
//! - [`OnConflict`], [`ResolvedOptions`], [`compile_binding`]
//!
//! ### Session (`session`)
//! - [`SessionState`] - The one mutable object shared across a run
//! - [`Stage`] - `created → ready to run → running → finished`
//! - [`Request`], [`Snapshot`], [`SessionResult`]
//!
//! ### Endpoints (`endpoint`)
//! - [`EndpointRegistry`] - Session-wide endpoint table shared by menu,
//!   server, and transforms
//!
//! ### Transforms (`transform`)
//! - [`transform()`] - Compute a binding at call time from live session state
//! - [`reload()`], [`reload_preserving_selection()`]
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use fzpilot_core::prelude::*;
//! ```

pub mod action;
pub mod binding;
pub mod endpoint;
pub mod entry;
pub mod error;
pub mod logging;
pub mod menu;
pub mod session;
pub mod transform;
pub mod trigger;

/// Prelude for common imports used throughout all fzpilot crates
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use action::{
    Action, CallKind, CallbackFn, EndStatus, Kwargs, Param, ParamSource, ServerCall, CLIENT_ENV,
    DEFAULT_CLIENT, PORT_ENV,
};
pub use binding::{ActionGroup, Binding};
pub use endpoint::{Endpoint, EndpointRegistry};
pub use entry::{entries_from, Entry, EntryRef};
pub use error::{Error, Result, ResultExt};
pub use menu::{
    compile_binding, compile_group, ActionMenu, CompiledBinding, OnConflict, ResolvedBind,
    ResolvedOptions,
};
pub use session::{Request, SessionResult, SessionState, Snapshot, Stage};
pub use transform::{reload, reload_preserving_selection, transform};
pub use trigger::{Key, SituationalEvent, Trigger};
