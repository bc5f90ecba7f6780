//! # Upstream Sources
//!
//! Picks a fetcher for a command-line source: `http(s)://` URLs go through
//! `ureq` (feature `client`), anything else is read from disk.

use docgen_core::config::UpstreamConfig;
use docgen_core::coverage::FileFetcher;
use docgen_core::{AppError, AppResult, UpstreamFetcher};

/// Fetches over HTTP with a global per-request timeout.
#[cfg(feature = "client")]
pub struct HttpFetcher {
    url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "client")]
impl HttpFetcher {
    /// Creates a fetcher for `url`.
    pub fn new(url: &str, policy: &UpstreamConfig) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(policy.timeout()))
            .build();
        Self {
            url: url.to_string(),
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

#[cfg(feature = "client")]
impl UpstreamFetcher for HttpFetcher {
    fn source_name(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> AppResult<String> {
        let mut response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| AppError::General(format!("GET {} failed: {}", self.url, e)))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| AppError::General(format!("Failed to read body of {}: {}", self.url, e)))
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetcher for a file path or URL.
pub fn fetcher_for(source: &str, policy: &UpstreamConfig) -> AppResult<Box<dyn UpstreamFetcher>> {
    if !is_url(source) {
        return Ok(Box::new(FileFetcher::new(source)));
    }
    #[cfg(feature = "client")]
    let fetcher: AppResult<Box<dyn UpstreamFetcher>> = Ok(Box::new(HttpFetcher::new(source, policy)));
    #[cfg(not(feature = "client"))]
    let fetcher: AppResult<Box<dyn UpstreamFetcher>> = {
        let _ = policy;
        Err(AppError::Config(format!(
            "cannot fetch {}: built without the `client` feature",
            source
        )))
    };
    fetcher
}
