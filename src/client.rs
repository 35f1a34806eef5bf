//! Shared HTTP client and configuration.

use reqwest::Client;

use crate::{cache::DiskCache, config::Config, Result};

/// Holds the HTTP client and configuration shared by every fetcher.
#[derive(Debug, Clone)]
pub struct NoaaClient {
    http: Client,
    config: Config,
}

impl NoaaClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// Client configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Disk cache rooted at the service's cache subdirectory.
    pub fn cache(&self, service: &str, overwrite: bool) -> DiskCache {
        DiskCache::new(self.config.service_cache_dir(service), overwrite)
    }
}
