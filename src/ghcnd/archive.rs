//! Bulk GHCND subsets distributed as tarballs of `.dly` files.

use std::{fmt, fs, path::PathBuf, str::FromStr};

use indicatif::ProgressBar;
use tracing::{debug, info};

use super::DailyReading;
use crate::{
    deserialise::deserialise,
    download::{download_file_with_progress, extract_tar, get_extraction_folder},
    Error, NoaaClient, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    /// US Historical Climatology Network stations.
    Hcn,
    /// GCOS Surface Network stations.
    Gsn,
    /// Every station. Very large.
    All,
}

impl Subset {
    pub fn archive_name(&self) -> &'static str {
        match self {
            Subset::Hcn => "ghcnd_hcn.tar.gz",
            Subset::Gsn => "ghcnd_gsn.tar.gz",
            Subset::All => "ghcnd_all.tar.gz",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subset::Hcn => "hcn",
            Subset::Gsn => "gsn",
            Subset::All => "all",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Subset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hcn" => Ok(Subset::Hcn),
            "gsn" => Ok(Subset::Gsn),
            "all" => Ok(Subset::All),
            other => Err(Error::query(format!("unknown GHCND subset {:?}, expected hcn, gsn or all", other))),
        }
    }
}

/// Downloads and unpacks `subset` into the GHCND cache, returning the
/// directory of `.dly` files. An already unpacked subset is reused unless
/// `refresh` is set.
pub async fn fetch_subset(
    client: &NoaaClient,
    subset: Subset,
    refresh: bool,
    progress_bar: Option<&ProgressBar>,
) -> Result<PathBuf> {
    let subset_dir = client.config().service_cache_dir("ghcnd").join(subset.to_string());

    if !refresh {
        if let Ok(dir) = get_extraction_folder(&subset_dir) {
            debug!(dir = %dir.display(), "subset already unpacked");
            return Ok(dir);
        }
    }

    if subset_dir.exists() {
        fs::remove_dir_all(&subset_dir)?;
    }
    fs::create_dir_all(&subset_dir)?;

    let url = format!("{}/{}", client.config().endpoints.ghcnd, subset.archive_name());
    let archive_path = subset_dir.join(subset.archive_name());
    info!(%url, "downloading GHCND subset");

    let hidden = ProgressBar::hidden();
    let pb = progress_bar.unwrap_or(&hidden);
    download_file_with_progress(client.http(), &url, &archive_path, pb).await?;

    pb.set_position(0);
    extract_tar(&archive_path, &subset_dir, Some(pb))?;
    fs::remove_file(&archive_path)?;

    get_extraction_folder(&subset_dir)
}

/// Decodes every `.dly` file in an unpacked subset.
pub async fn read_subset(dir: &std::path::Path, progress_bar: Option<ProgressBar>) -> Result<Vec<DailyReading>> {
    deserialise::<DailyReading>(dir, progress_bar).await
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        ghcnd::daily::test::line,
        test_support::{serve, test_client, Route},
    };

    fn tarball() -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for id in ["USC00011084", "USC00012813"] {
            let body = format!("{}\n{}\n", line(id, 1999, 1, "TMAX"), line(id, 1999, 1, "TMIN"));
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("ghcnd_hcn/{}.dly", id), body.as_bytes())
                .unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn should_name_archives() {
        assert_eq!(Subset::Hcn.archive_name(), "ghcnd_hcn.tar.gz");
        assert_eq!(Subset::Gsn.to_string(), "gsn");
        assert_eq!("HCN".parse::<Subset>().unwrap(), Subset::Hcn);
        assert!("crn".parse::<Subset>().is_err());
    }

    #[tokio::test]
    async fn should_fetch_and_read_subset() {
        let server = serve(vec![Route::ok("/ghcnd/ghcnd_hcn.tar.gz", tarball())]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let folder = fetch_subset(&client, Subset::Hcn, false, None).await.unwrap();
        assert!(folder.ends_with("ghcnd_hcn"));
        assert!(!folder.parent().unwrap().join("ghcnd_hcn.tar.gz").exists());

        let again = fetch_subset(&client, Subset::Hcn, false, None).await.unwrap();
        assert_eq!(folder, again);
        assert_eq!(server.hits(), 1);

        let readings = read_subset(&folder, None).await.unwrap();
        assert_eq!(readings.len(), 4);
    }
}
