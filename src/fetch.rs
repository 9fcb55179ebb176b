// src/fetch.rs
//! Data acquisition: download the source workbook, keeping a dated local copy.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

use crate::config::SourceConfig;

/// True while a file modified at `modified` is younger than `refresh`.
pub fn is_fresh(modified: DateTime<Utc>, now: DateTime<Utc>, refresh: Duration) -> bool {
    match chrono::Duration::from_std(refresh) {
        Ok(max_age) => now.signed_duration_since(modified) < max_age,
        Err(_) => true,
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// Download `url` and atomically replace `dest` with the body.
pub async fn download(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    let dir = dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
        let tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temporary file in {:?}", dir))?;
        fs::write(tmp.path(), &bytes).with_context(|| format!("writing {:?}", tmp.path()))?;
        tmp.persist(&dest)
            .with_context(|| format!("renaming download over {:?}", dest))?;
        Ok(())
    })
    .await??;
    Ok(())
}

/// Path of an up-to-date copy of the source, downloading when the cache is
/// missing or older than `config.refresh`. A stale copy is used when the
/// download fails.
pub async fn fetch_source(client: &Client, config: &SourceConfig) -> Result<PathBuf> {
    let path = config
        .cache_path()
        .ok_or_else(|| anyhow!("cannot derive a cache file name from {}", config.url))?;

    let cached = modified_at(&path);
    if let Some(modified) = cached {
        if is_fresh(modified, Utc::now(), config.refresh) {
            info!(path = %path.display(), "using cached source");
            return Ok(path);
        }
    }

    info!(url = %config.url, "downloading source");
    match download(client, &config.url, &path).await {
        Ok(()) => Ok(path),
        Err(e) if cached.is_some() => {
            warn!(error = %e, path = %path.display(), "download failed; using stale cache");
            Ok(path)
        }
        Err(e) => Err(e.context(format!("fetching {}", config.url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_is_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let day = Duration::from_secs(86_400);
        let hour_ago = Utc.with_ymd_and_hms(2024, 3, 2, 11, 0, 0).unwrap();
        let two_days_ago = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();

        assert!(is_fresh(hour_ago, now, day));
        assert!(!is_fresh(two_days_ago, now, day));
        assert!(!is_fresh(hour_ago, now, Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_download() -> Result<()> {
        let dir = tempdir()?;
        let cfg = SourceConfig {
            // unroutable; reaching the network would fail the test
            url: "http://127.0.0.1:9/sales_revenue.csv".into(),
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let cached = dir.path().join("sales_revenue.csv");
        fs::write(&cached, "State,Year,Month,Sector,Metric,Unit,Value\n")?;

        let got = fetch_source(&Client::new(), &cfg).await?;
        assert_eq!(got, cached);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_cache_and_failed_download_is_error() -> Result<()> {
        let dir = tempdir()?;
        let cfg = SourceConfig {
            url: "http://127.0.0.1:9/sales_revenue.csv".into(),
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(fetch_source(&Client::new(), &cfg).await.is_err());
        assert!(!dir.path().join("sales_revenue.csv").exists());
        Ok(())
    }
}
