//! Local filesystem storage implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{Report, ReportStorage, WriteMetadata};

const LATEST_KEY: &str = "latest.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Key of the timestamped report file.
    fn report_key(report: &Report) -> String {
        format!("report-{}.json", report.generated_at.format("%Y%m%d-%H%M%S"))
    }
}

#[async_trait]
impl ReportStorage for LocalStorage {
    async fn write_report(&self, report: &Report) -> Result<WriteMetadata> {
        let report_path = self.write_json(&Self::report_key(report), report).await?;
        let latest_path = self.write_json(LATEST_KEY, report).await?;

        log::info!(
            "Report with {} run(s) written to {}",
            report.results.len(),
            report_path.display()
        );

        Ok(WriteMetadata {
            report_location: report_path.display().to_string(),
            latest_location: latest_path.display().to_string(),
            timestamp: report.generated_at,
        })
    }

    async fn load_latest(&self) -> Result<Option<Report>> {
        self.read_json(LATEST_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Summary;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn report() -> Report {
        Report {
            generated_at: Utc.with_ymd_and_hms(2025, 10, 19, 12, 30, 5).unwrap(),
            target_count: 100,
            summary: Summary::from_results(&[]),
            results: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("nested/test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("nested/test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("nested/test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.load_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_report_and_load_latest() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("reports"));

        let meta = storage.write_report(&report()).await.unwrap();
        assert!(meta.report_location.ends_with("report-20251019-123005.json"));
        assert!(meta.latest_location.ends_with("latest.json"));
        assert!(tmp.path().join("reports/report-20251019-123005.json").exists());

        let loaded = storage.load_latest().await.unwrap().unwrap();
        assert_eq!(loaded, report());
    }

    #[tokio::test]
    async fn test_corrupt_latest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_bytes(LATEST_KEY, b"{not json").await.unwrap();

        assert!(matches!(storage.load_latest().await, Err(AppError::Json(_))));
    }
}
