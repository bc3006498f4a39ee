use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::errors::ControlPointError;

/// Minimal HTTP GET used by chapter fetchers.
pub trait HttpFetcher: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, ControlPointError>;
}

/// [`HttpFetcher`] backed by a `ureq` agent.
pub struct UreqFetcher {
    agent: Agent,
}

impl UreqFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl HttpFetcher for UreqFetcher {
    fn get_text(&self, url: &str) -> Result<String, ControlPointError> {
        let mut response = self.agent.get(url).call()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ControlPointError::Http(format!("GET {} returned {}", url, status)));
        }
        let body = response.body_mut().read_to_string()?;
        debug!(url, bytes = body.len(), "Chapter index fetched");
        Ok(body)
    }
}
