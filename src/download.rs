//! HTTP fetch helpers and archive extraction.

use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tar::Archive;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Downloads `url` into `file_path`.
///
/// The body is streamed to `<file_path>.part` and renamed into place once
/// complete. On a non-success status or a broken body stream both files are
/// removed.
pub async fn download_file(client: &Client, url: &str, file_path: &Path) -> Result<()> {
    download(client, url, file_path, None).await
}

/// Downloads with a progress bar sized from the content length.
pub async fn download_file_with_progress(
    client: &Client,
    url: &str,
    file_path: &Path,
    progress_bar: &ProgressBar,
) -> Result<()> {
    download(client, url, file_path, Some(progress_bar)).await
}

async fn download(
    client: &Client,
    url: &str,
    file_path: &Path,
    progress_bar: Option<&ProgressBar>,
) -> Result<()> {
    debug!(%url, path = %file_path.display(), "downloading");
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        remove_partial(file_path);
        return Err(Error::Status {
            status: response.status(),
            url: url.to_string(),
        });
    }

    if let Some(pb) = progress_bar {
        let total_size = response.content_length().unwrap_or(0);
        if total_size > 0 {
            pb.set_length(total_size);
            pb.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
        }
    }

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let part_path = part_path(file_path);
    let mut file = File::create(&part_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let written = match chunk {
            Ok(chunk) => file.write_all(&chunk).map(|_| chunk.len() as u64).map_err(Error::from),
            Err(e) => Err(e.into()),
        };
        match written {
            Ok(n) => downloaded += n,
            Err(e) => {
                drop(file);
                remove_partial(&part_path);
                remove_partial(file_path);
                return Err(e);
            }
        }
        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    file.flush()?;
    drop(file);
    fs::rename(&part_path, file_path)?;

    Ok(())
}

/// `<file_path>.part`, where the body lands until the stream completes.
fn part_path(file_path: &Path) -> PathBuf {
    let mut name = file_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn remove_partial(file_path: &Path) {
    if file_path.exists() {
        if let Err(e) = fs::remove_file(file_path) {
            warn!(path = %file_path.display(), error = %e, "could not remove partial download");
        }
    }
}

/// GETs `url` with `query` parameters and returns the body as text.
pub async fn get_text(client: &Client, url: &str, query: &[(&str, String)]) -> Result<String> {
    debug!(%url, "fetching");
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    let final_url = response.url().to_string();
    let body = response.text().await?;

    if !status.is_success() {
        check_server_error(&body)?;
        return Err(Error::Status {
            status,
            url: final_url,
        });
    }
    check_server_error(&body)?;

    Ok(body)
}

/// GETs `url` and deserialises the JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let body = get_text(client, url, query).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Treats a body that starts with the literal `Error` as a server-side failure.
pub fn check_server_error(body: &str) -> Result<()> {
    let trimmed = body.trim_start();
    if trimmed.starts_with("Error") {
        let message = trimmed.lines().take(3).collect::<Vec<_>>().join(" ");
        return Err(Error::Server(message));
    }
    Ok(())
}

/// Same check for a file already on disk. Only the first kilobyte is read.
pub fn check_server_error_file(file_path: &Path) -> Result<()> {
    let mut head = Vec::with_capacity(1024);
    File::open(file_path)?.take(1024).read_to_end(&mut head)?;
    check_server_error(&String::from_utf8_lossy(&head))
}

/// Reads a gzip compressed text file into memory.
pub fn gunzip_to_string(gz_path: &Path) -> Result<String> {
    let mut decoder = GzDecoder::new(File::open(gz_path)?);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;

    Ok(text)
}

/// Extracts the tarball at `tar_gz_path` into `working_dir`, advancing the
/// progress bar once per entry.
pub fn extract_tar(tar_gz_path: &Path, working_dir: &Path, progress_bar: Option<&ProgressBar>) -> Result<()> {
    let tar = GzDecoder::new(File::open(tar_gz_path)?);
    let mut archive = Archive::new(tar);

    let mut count = 0u64;
    for entry in archive.entries()? {
        let mut entry = entry?;
        entry.unpack_in(working_dir)?;
        count += 1;
        if let Some(pb) = progress_bar {
            pb.set_position(count);
        }
    }
    debug!(entries = count, dir = %working_dir.display(), "unpacked archive");

    Ok(())
}

/// Returns the single directory inside `working_dir`.
pub fn get_extraction_folder(working_dir: &Path) -> Result<PathBuf> {
    let mut directories = Vec::new();
    for entry in fs::read_dir(working_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            directories.push(path);
        }
    }

    match directories.len() {
        1 => Ok(directories.remove(0)),
        n => Err(Error::decode(format!(
            "expected one directory in {}, found {}",
            working_dir.display(),
            n
        ))),
    }
}

// -- Tests -------------------------------------------------------------------
