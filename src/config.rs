//! Runtime configuration: cache location, credentials and HTTP settings.

use std::{env, path::PathBuf, time::Duration};

use crate::{Error, Result};

pub const DEFAULT_ERDDAP_URL: &str = "https://upwell.pfeg.noaa.gov/erddap/";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Base URLs of the file trees and web services, without trailing slashes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub ghcnd: String,
    pub isd: String,
    pub ibtracs: String,
    pub ndbc: String,
    pub homr: String,
    pub legacy: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ghcnd: "https://www.ncei.noaa.gov/pub/data/ghcn/daily".to_string(),
            isd: "https://www.ncei.noaa.gov/pub/data/noaa".to_string(),
            ibtracs: "https://www.ncei.noaa.gov/data/international-best-track-archive-for-climate-stewardship-ibtracs/v04r01/access/csv".to_string(),
            ndbc: "https://www.ndbc.noaa.gov".to_string(),
            homr: "https://www.ncei.noaa.gov/access/homr/services".to_string(),
            legacy: "https://www7.ncdc.noaa.gov/rest/services".to_string(),
        }
    }
}

impl Endpoints {
    /// Points every service at `base`, e.g. a local mirror.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            ghcnd: format!("{}/ghcnd", base),
            isd: format!("{}/isd", base),
            ibtracs: format!("{}/ibtracs", base),
            ndbc: format!("{}/ndbc", base),
            homr: format!("{}/homr", base),
            legacy: format!("{}/legacy", base),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the on-disk response cache. Each service gets a subdirectory.
    pub cache_dir: PathBuf,
    /// Token for the NCDC legacy web services.
    pub legacy_token: Option<String>,
    /// ERDDAP server base URL, always ending in `/`.
    pub erddap_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            legacy_token: None,
            erddap_url: DEFAULT_ERDDAP_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("noaadata/{}", env!("CARGO_PKG_VERSION")),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Builds a config from `NOAA_CACHE_DIR`, `NOAA_LEGACY_TOKEN`, `ERDDAP_URL` and
    /// `NOAA_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(dir) = env_var("NOAA_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        config.legacy_token = env_var("NOAA_LEGACY_TOKEN");
        if let Some(url) = env_var("ERDDAP_URL") {
            config = config.with_erddap_url(&url);
        }
        if let Some(secs) = env_var("NOAA_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|_| Error::query(format!("NOAA_TIMEOUT_SECS is not a number: {}", secs)))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_erddap_url(mut self, url: &str) -> Self {
        self.erddap_url = normalise_base_url(url);
        self
    }

    pub fn with_legacy_token(mut self, token: impl Into<String>) -> Self {
        self.legacy_token = Some(token.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Cache subdirectory for one service, e.g. `ghcnd` or `erddap`.
    pub fn service_cache_dir(&self, service: &str) -> PathBuf {
        self.cache_dir.join(service)
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(env::temp_dir)
        .join("noaadata")
}

pub(crate) fn normalise_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_add_trailing_slash_to_erddap_url() {
        let config = Config::default().with_erddap_url("https://coastwatch.pfeg.noaa.gov/erddap");
        assert_eq!(config.erddap_url, "https://coastwatch.pfeg.noaa.gov/erddap/");

        let config = Config::default().with_erddap_url("https://coastwatch.pfeg.noaa.gov/erddap/");
        assert_eq!(config.erddap_url, "https://coastwatch.pfeg.noaa.gov/erddap/");
    }

    #[test]
    fn should_nest_service_cache_dirs() {
        let config = Config::default().with_cache_dir("/tmp/noaa");
        assert_eq!(config.service_cache_dir("ghcnd"), PathBuf::from("/tmp/noaa/ghcnd"));
    }

    #[test]
    fn should_default_to_upwell() {
        let config = Config::default();
        assert_eq!(config.erddap_url, DEFAULT_ERDDAP_URL);
        assert!(config.legacy_token.is_none());
        assert!(config.cache_dir.ends_with("noaadata"));
    }
}
