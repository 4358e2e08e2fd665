use async_trait::async_trait;
use std::path::PathBuf;

use super::listing::Listing;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("io error reading listings: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed listings for '{keyword}': {source}")]
    Parse {
        keyword: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("listing source unavailable: {0}")]
    Unavailable(String),
}

/// Produces the current search results for a keyword. Results may repeat
/// within and across calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Listing>, SourceError>;
}

/// Reads `<dir>/<keyword-slug>.json` snapshots written by the page scraper.
pub struct SnapshotDirSource {
    dir: PathBuf,
}

impl SnapshotDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, keyword: &str) -> PathBuf {
        self.dir.join(format!("{}.json", keyword_slug(keyword)))
    }
}

#[async_trait]
impl ListingSource for SnapshotDirSource {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Listing>, SourceError> {
        let path = self.snapshot_path(keyword);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No snapshot at {} yet", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|source| SourceError::Parse {
            keyword: keyword.to_string(),
            source,
        })
    }
}

/// `"iPhone 12 Pro"` becomes `"iphone-12-pro"`.
pub fn keyword_slug(keyword: &str) -> String {
    let mut slug = String::with_capacity(keyword.len());
    for c in keyword.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
