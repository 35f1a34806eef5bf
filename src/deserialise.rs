//! Generic line decoding for fixed-width record files, one record per line.

use std::{
    fs::File,
    io::{self, BufRead},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use futures::future::join_all;
use indicatif::ProgressBar;
use tracing::warn;

use crate::{Error, Result};

/// A record decoded from a single line of text.
pub trait Record: Sized {
    fn from_line(line: &str) -> Result<Self>;

    /// Records failing this check are dropped after decoding.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Decodes every non-blank line of `text`. The first bad line aborts decoding.
pub fn parse_lines<R: Record>(text: &str) -> Result<Vec<R>> {
    let mut records = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record = R::from_line(line)?;
        if record.is_valid() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Decodes every file in `dir` on the blocking pool. Files that fail are
/// logged and skipped.
pub async fn deserialise<R: Record + Send + 'static>(
    dir: &Path,
    progress_bar: Option<ProgressBar>,
) -> Result<Vec<R>> {
    let files: Vec<PathBuf> = dir
        .read_dir()?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, io::Error>>()?;

    let progress_bar = progress_bar.map(|pb| {
        pb.set_length(files.len() as u64);
        Arc::new(Mutex::new(pb))
    });

    let tasks: Vec<_> = files
        .into_iter()
        .filter(|file| file.is_file())
        .map(|file| {
            let pb = progress_bar.clone();
            tokio::task::spawn_blocking(move || {
                let result = process_file::<R>(&file);
                if let Some(pb) = pb {
                    if let Ok(pb) = pb.lock() {
                        pb.inc(1);
                    }
                }
                (file, result)
            })
        })
        .collect();

    let mut records = Vec::new();
    for result in join_all(tasks).await {
        match result {
            Ok((_, Ok(file_records))) => records.extend(file_records),
            Ok((file, Err(e))) => warn!(file = %file.display(), error = %e, "skipping file"),
            Err(e) => return Err(Error::decode(format!("decode task failed: {}", e))),
        }
    }

    Ok(records)
}

fn process_file<R: Record>(file_path: &Path) -> Result<Vec<R>> {
    let reader = io::BufReader::new(File::open(file_path)?);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = R::from_line(&line)?;
        if record.is_valid() {
            records.push(record);
        }
    }

    Ok(records)
}

// -- Tests -------------------------------------------------------------------
