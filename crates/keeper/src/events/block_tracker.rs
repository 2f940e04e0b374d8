use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct BlockMarker {
    last_processed_block: Option<u64>,
}

/// Persists the last block whose events were handled, as
/// `{"last_processed_block": n}`.
#[derive(Debug, Clone)]
pub struct BlockTracker {
    path: PathBuf,
}

impl BlockTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<u64>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };

        let marker: BlockMarker = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(marker.last_processed_block)
    }

    /// Writes through a temporary file so a crash never leaves a torn marker.
    pub async fn store(&self, block: u64) -> Result<()> {
        let marker = BlockMarker {
            last_processed_block: Some(block),
        };
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&marker)?)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_has_no_marker() {
        let dir = tempdir().unwrap();
        let tracker = BlockTracker::new(dir.path().join("last_processed_block.json"));
        assert_eq!(tracker.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempdir().unwrap();
        let tracker = BlockTracker::new(dir.path().join("last_processed_block.json"));

        tracker.store(1234).await.unwrap();
        assert_eq!(tracker.load().await.unwrap(), Some(1234));

        tracker.store(1240).await.unwrap();
        assert_eq!(tracker.load().await.unwrap(), Some(1240));

        let raw = std::fs::read_to_string(tracker.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["last_processed_block"], 1240);
    }

    #[tokio::test]
    async fn test_null_marker_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_processed_block.json");
        std::fs::write(&path, r#"{"last_processed_block": null}"#).unwrap();

        assert_eq!(BlockTracker::new(path).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_marker_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_processed_block.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(BlockTracker::new(path).load().await.is_err());
    }
}
