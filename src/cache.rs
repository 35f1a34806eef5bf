//! Disk cache for fetched response files.
//!
//! A cache entry is a file at a deterministic path. Either the path is derived
//! from a fingerprint of the request (md5 of URL and serialised arguments), or
//! from the remote file name when that already identifies the content. An entry
//! that exists is a hit; nothing ever expires or gets evicted.

use std::{
    fs,
    path::{Path, PathBuf},
};

use reqwest::Client;
use tracing::{debug, info};

use crate::{download::download_file, Result};

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    overwrite: bool,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// md5 hex digest of the URL followed by the serialised arguments.
    pub fn fingerprint(url: &str, args: &str) -> String {
        format!("{:x}", md5::compute(format!("{}{}", url, args)))
    }

    pub fn fingerprint_path(&self, url: &str, args: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", Self::fingerprint(url, args), ext))
    }

    pub fn named_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// The cached path if it can be served without a request.
    pub fn lookup(&self, path: &Path) -> Option<PathBuf> {
        (!self.overwrite && path.is_file()).then(|| path.to_path_buf())
    }

    /// Returns `path` if cached, otherwise downloads `url` into it.
    pub async fn fetch(&self, client: &Client, url: &str, path: PathBuf) -> Result<PathBuf> {
        if let Some(hit) = self.lookup(&path) {
            debug!(path = %hit.display(), "cache hit");
            return Ok(hit);
        }

        info!(%url, path = %path.display(), "cache miss, fetching");
        fs::create_dir_all(&self.dir)?;
        download_file(client, url, &path).await?;

        Ok(path)
    }

    /// Fetches `url` into the entry named after the last segment of its path.
    pub async fn fetch_named(&self, client: &Client, url: &str) -> Result<PathBuf> {
        let file_name = url
            .split('?')
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .unwrap_or("index");
        let path = self.named_path(file_name);
        self.fetch(client, url, path).await
    }

    /// Fetches `url?query` into an entry named by the fingerprint of
    /// `(url, args)`, where `args` is the unencoded query.
    pub async fn fetch_fingerprinted(
        &self,
        client: &Client,
        url: &str,
        args: &str,
        encoded_query: &str,
        ext: &str,
    ) -> Result<PathBuf> {
        let path = self.fingerprint_path(url, args, ext);
        let full_url = if encoded_query.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, encoded_query)
        };
        self.fetch(client, &full_url, path).await
    }
}

// -- Tests -------------------------------------------------------------------
