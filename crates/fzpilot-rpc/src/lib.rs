//! # fzpilot-rpc - Socket RPC Layer
//!
//! The out-of-process callback channel: shell commands generated into the
//! finder's key bindings call back into host functions over a length-framed
//! localhost TCP protocol, and the [`Server`] dispatches them against the
//! shared session, one at a time.
//!
//! Depends on [`fzpilot_core`] for the endpoint registry, session state, and
//! error handling.
//!
//! ## Public API
//!
//! ### Server
//! - [`Server`] - Per-session background listener with serialized dispatch
//! - [`ServerHandle`] - Port, status, and shutdown switch of a running server
//! - [`ServerStatus`] - `Created → Listening → Closing → Closed`
//!
//! ### Protocol
//! - [`protocol::read_frame`] / [`protocol::write_frame`] - 4-byte big-endian
//!   length framing
//! - [`protocol::encode_request`] / [`protocol::decode_request`]
//!
//! ### Client
//! - [`client::call`] - One request/response exchange, as the helper program
//!   performs it

pub mod client;
pub mod protocol;
pub mod server;

pub use server::{Server, ServerHandle, ServerStatus};
