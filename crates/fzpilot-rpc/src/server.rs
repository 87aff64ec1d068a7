//! The background RPC listener
//!
//! One server runs per session, for the session's whole lifetime. It binds an
//! ephemeral localhost port, then accepts connections in a loop that also
//! watches a shutdown signal. Every connection is one request/response and is
//! handled fully — including the host callback, run with the session locked —
//! before the next accept, so callbacks never race each other.
//!
//! Dispatch failures are never allowed to escape: they come back as the
//! response body (where the finder shows them to the user) and are logged.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use fzpilot_core::prelude::*;
use fzpilot_core::{EndpointRegistry, Request, SessionState};

use crate::protocol::{decode_request, read_frame, write_frame};

/// Listener lifecycle, observable through [`ServerHandle::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Created,
    Listening,
    Closing,
    Closed,
}

/// A session's RPC server, ready to start.
pub struct Server {
    registry: EndpointRegistry,
    session: Arc<Mutex<SessionState>>,
}

impl Server {
    pub fn new(registry: EndpointRegistry, session: Arc<Mutex<SessionState>>) -> Self {
        Self { registry, session }
    }

    /// Bind an ephemeral local port and start the accept loop.
    ///
    /// Resolves once the listener is bound — callers may hand the port to the
    /// finder as soon as this returns.
    pub async fn start(self) -> Result<ServerHandle> {
        let (status_tx, status_rx) = watch::channel(ServerStatus::Created);

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        info!(port, "rpc server listening");
        let _ = status_tx.send(ServerStatus::Listening);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(accept_loop(
            listener,
            self.registry,
            self.session,
            shutdown_rx,
            status_tx,
        ));

        Ok(ServerHandle {
            port,
            shutdown: Some(shutdown_tx),
            status: status_rx,
            task,
        })
    }
}

/// Handle to a running server: its port, status, and shutdown switch.
pub struct ServerHandle {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    status: watch::Receiver<ServerStatus>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    /// Signal the accept loop to close and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            // The loop may already have exited; a dead receiver is fine.
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                error!("rpc server task panicked: {e}");
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: EndpointRegistry,
    session: Arc<Mutex<SessionState>>,
    mut shutdown_rx: oneshot::Receiver<()>,
    status_tx: watch::Sender<ServerStatus>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                let _ = status_tx.send(ServerStatus::Closing);
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    trace!(%peer, "connection accepted");
                    if let Err(e) = handle_connection(&mut stream, &registry, &session).await {
                        warn!(error = %e, "connection handling failed");
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
    let _ = status_tx.send(ServerStatus::Closed);
    info!("rpc server closed");
}

/// One request, one response, then the server side closes the stream.
async fn handle_connection(
    stream: &mut TcpStream,
    registry: &EndpointRegistry,
    session: &Arc<Mutex<SessionState>>,
) -> Result<()> {
    let bytes = read_frame(stream).await?;
    let body = dispatch(&bytes, registry, session).await;
    write_frame(stream, body.as_bytes()).await
}

/// Decode and dispatch one request. Infallible by design: every failure mode
/// becomes a response body so it surfaces in the finder instead of hanging it.
async fn dispatch(
    bytes: &[u8],
    registry: &EndpointRegistry,
    session: &Arc<Mutex<SessionState>>,
) -> String {
    let request: Request = match decode_request(bytes) {
        Ok(request) => request,
        Err(e) => {
            let payload = String::from_utf8_lossy(bytes);
            error!(error = %e, %payload, "malformed request");
            return format!("{}\npayload: {payload}", error_chain(&e));
        }
    };

    let Some(endpoint) = registry.get(&request.endpoint_id) else {
        // A stale id usually means a transform re-registered its dynamic
        // endpoints and the finder fired an old command; the known-id list
        // makes that visible.
        let known = registry.known_ids();
        error!(endpoint = %request.endpoint_id, ?known, "unknown endpoint id");
        return format!(
            "unknown endpoint id '{}'\nknown endpoints: [{}]\nrequest: {request:?}",
            request.endpoint_id,
            known.join(", "),
        );
    };

    let mut session = session.lock().await;
    match (endpoint.function)(&mut session, &request) {
        Ok(body) => body,
        Err(e) => {
            error!(endpoint = %request.endpoint_id, error = %e, "endpoint failed");
            format!(
                "endpoint '{}' failed: {}\nrequest: {request:?}",
                request.endpoint_id,
                error_chain(&e),
            )
        }
    }
}

/// Render an error with its full source chain.
fn error_chain(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(&format!("\ncaused by: {cause}"));
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io.into();
        let chain = error_chain(&err);
        assert!(chain.contains("IO error"));
    }

    #[test]
    fn test_request_debug_is_reportable() {
        let request = Request {
            endpoint_id: "x-1".into(),
            snapshot: Default::default(),
            kwargs: Default::default(),
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("x-1"));
    }
}
