//! JSON directory artifact source.
//!
//! Reads the four artifacts from one directory, as written by the offline
//! export (`DataFrame.to_json` with `orient="records"` for the metadata table
//! and `orient="split"` for the pivot).

use super::{ArtifactSource, PivotMatrix, StorageError, StorageResult};
use crate::models::BookRecord;
use crate::neighbors::NeighborModelSpec;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the neighbor model parameters.
pub const MODEL_FILE: &str = "model.json";

/// File name of the ordered title list.
pub const TITLES_FILE: &str = "book_names.json";

/// File name of the metadata table.
pub const METADATA_FILE: &str = "final_rating.json";

/// File name of the pivot matrix.
pub const PIVOT_FILE: &str = "book_pivot.json";

/// Artifact source backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct JsonArtifactSource {
    dir: PathBuf,
}

impl JsonArtifactSource {
    /// Create a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the artifacts are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of every expected artifact file that does not exist.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        [MODEL_FILE, TITLES_FILE, METADATA_FILE, PIVOT_FILE]
            .iter()
            .map(|name| self.dir.join(name))
            .filter(|path| !path.exists())
            .collect()
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> StorageResult<T> {
        let path = self.dir.join(name);
        debug!("Reading artifact {}", path.display());

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::ReadError(format!("{}: {}", path.display(), e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ArtifactSource for JsonArtifactSource {
    async fn load_model(&self) -> StorageResult<NeighborModelSpec> {
        self.read_json(MODEL_FILE).await
    }

    async fn load_titles(&self) -> StorageResult<Vec<String>> {
        self.read_json(TITLES_FILE).await
    }

    async fn load_metadata(&self) -> StorageResult<Vec<BookRecord>> {
        self.read_json(METADATA_FILE).await
    }

    async fn load_pivot(&self) -> StorageResult<PivotMatrix> {
        self.read_json(PIVOT_FILE).await
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn write_valid_artifacts(dir: &Path) {
        write(dir, MODEL_FILE, r#"{"algorithm": "brute", "metric": "euclidean"}"#);
        write(dir, TITLES_FILE, r#"["A", "B"]"#);
        write(
            dir,
            METADATA_FILE,
            r#"[{"title": "A", "author": "x", "year": 1990, "img_url": "http://a"}]"#,
        );
        write(
            dir,
            PIVOT_FILE,
            r#"{"index": ["A", "B"], "columns": [1, 2], "data": [[1.0, 0.0], [0.0, 1.0]]}"#,
        );
    }

    #[tokio::test]
    async fn test_load_valid_directory() {
        let tmp = TempDir::new().unwrap();
        write_valid_artifacts(tmp.path());

        let source = JsonArtifactSource::new(tmp.path());
        assert!(source.missing_files().is_empty());

        let store = source.load().await.unwrap();
        assert_eq!(store.titles.len(), 2);
        assert_eq!(store.pivot.n_columns(), 2);
        assert_eq!(store.metadata.lookup("A").unwrap().year, "1990");
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        write_valid_artifacts(tmp.path());
        std::fs::remove_file(tmp.path().join(PIVOT_FILE)).unwrap();

        let source = JsonArtifactSource::new(tmp.path());
        assert_eq!(source.missing_files(), vec![tmp.path().join(PIVOT_FILE)]);

        match source.load().await {
            Err(StorageError::ReadError(msg)) => assert!(msg.contains(PIVOT_FILE)),
            other => panic!("Expected ReadError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let tmp = TempDir::new().unwrap();
        write_valid_artifacts(tmp.path());
        write(tmp.path(), TITLES_FILE, "not json");

        let result = JsonArtifactSource::new(tmp.path()).load().await;
        assert!(matches!(result, Err(StorageError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_row_order_mismatch_is_schema_error() {
        let tmp = TempDir::new().unwrap();
        write_valid_artifacts(tmp.path());
        write(tmp.path(), TITLES_FILE, r#"["B", "A"]"#);

        let result = JsonArtifactSource::new(tmp.path()).load().await;
        assert!(matches!(result, Err(StorageError::SchemaError(_))));
    }
}
