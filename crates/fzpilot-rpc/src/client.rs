//! Client side of the wire protocol
//!
//! Used by the `fzpilot-client` helper program the generated shell commands
//! invoke, and by tests standing in for the finder.

use tokio::net::TcpStream;

use fzpilot_core::prelude::*;
use fzpilot_core::Request;

use crate::protocol::{encode_request, read_frame, write_frame};

/// Send one request to a session server and return the response body.
///
/// Opens a fresh connection, writes the framed request, and blocks until the
/// framed response arrives; the server closes the stream afterwards.
pub async fn call(port: u16, request: &Request) -> Result<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    write_frame(&mut stream, &encode_request(request)?).await?;
    let bytes = read_frame(&mut stream).await?;
    String::from_utf8(bytes)
        .map_err(|e| Error::malformed_request(format!("response was not UTF-8: {e}")))
}
