use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::core::tle::Catalog;

pub const CELESTRAK_ACTIVE_TLE_URL: &str = "https://celestrak.org/NORAD/elements/gp.php?GROUP=active&FORMAT=tle";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a refresh reads its element sets from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(PathBuf),
    Http(String),
}

impl CatalogSource {
    /// Reads the feed and builds a fresh catalog snapshot.
    pub async fn load(&self) -> Result<Catalog, FetchError> {
        let text = match self {
            CatalogSource::File(path) => load_tle_file(path)?,
            CatalogSource::Http(url) => fetch_tle_feed(url).await?,
        };
        let catalog = Catalog::from_tle_text(&text);
        info!(count = catalog.len(), "Loaded catalog");
        Ok(catalog)
    }
}

pub fn load_tle_file(path: &Path) -> Result<String, FetchError> {
    fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Downloads a TLE feed such as the Celestrak active group.
pub async fn fetch_tle_feed(url: &str) -> Result<String, FetchError> {
    info!("Fetching TLE from {}", url);

    let client = reqwest::Client::builder()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?;

    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status()));
    }

    let body = resp.text().await?;
    info!(bytes = body.len(), "Fetched TLE feed");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tle::fixtures::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn file_source_builds_catalog() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{ISS_NAME}").unwrap();
        writeln!(file, "{ISS_L1}").unwrap();
        writeln!(file, "{ISS_L2}").unwrap();
        writeln!(file, "{LEO_NAME}").unwrap();
        writeln!(file, "{LEO_L1}").unwrap();
        writeln!(file, "{LEO_L2}").unwrap();

        let catalog = CatalogSource::File(file.path().to_path_buf()).load().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].name, ISS_NAME);
        assert_eq!(catalog.records()[1].index, 1);
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.tle");
        let err = CatalogSource::File(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, FetchError::Io { path: p, .. } if p == path));
    }

    #[tokio::test]
    async fn empty_file_is_an_empty_catalog() {
        let file = NamedTempFile::new().unwrap();
        let catalog = CatalogSource::File(file.path().to_path_buf()).load().await.unwrap();
        assert!(catalog.is_empty());
    }
}
