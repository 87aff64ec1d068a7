//! Remote control of a running finder
//!
//! The finder exposes an HTTP listener when started with `--listen`; posting
//! an action expression to it executes the actions exactly as if the user had
//! triggered them. The controller is the thin POST wrapper the automator (or
//! an embedder) drives it with.

use fzpilot_core::prelude::*;

/// HTTP-POST wrapper around the finder's remote-control port.
pub struct Controller {
    client: reqwest::Client,
    port: u16,
}

impl Controller {
    pub fn new(port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Post one action expression for the finder to execute.
    pub async fn post(&self, action: &str) -> Result<()> {
        let url = format!("http://127.0.0.1:{}/", self.port);
        debug!(%url, action, "posting remote control action");
        let response = self
            .client
            .post(&url)
            .body(action.to_string())
            .send()
            .await
            .map_err(|e| Error::remote_control(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::remote_control(format!(
                "finder rejected action ({status}): {body}"
            )));
        }
        Ok(())
    }
}
