//! Artifact store abstraction and its in-memory shapes.
//!
//! The recommender runs over four objects produced by an offline training
//! job: the neighbor model, the ordered title list, the metadata table and
//! the title-by-user pivot matrix. This module defines those shapes, the
//! invariants tying them together, and the `ArtifactSource` trait that loads
//! them. Everything is read once at startup and never written back.

pub mod json;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{BookDetails, BookRecord};
use crate::neighbors::NeighborModelSpec;

/// Errors that can occur while loading artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Artifact file could not be read
    #[error("Failed to read artifact: {0}")]
    ReadError(String),

    /// Artifact contents could not be decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Artifacts are individually valid but disagree with each other
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Model parameters are unusable
    #[error("Invalid model: {0}")]
    ModelError(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Ordered list of distinct book titles.
///
/// Position `i` is row `i` of the pivot matrix and the row id returned by the
/// neighbor index.
#[derive(Debug, Clone)]
pub struct TitleIndex {
    titles: Vec<String>,
    positions: HashMap<String, usize>,
}

impl TitleIndex {
    /// Build the index, rejecting duplicate titles.
    pub fn new(titles: Vec<String>) -> StorageResult<Self> {
        let mut positions = HashMap::with_capacity(titles.len());
        for (i, title) in titles.iter().enumerate() {
            if let Some(first) = positions.insert(title.clone(), i) {
                return Err(StorageError::SchemaError(format!(
                    "duplicate title {:?} at positions {} and {}",
                    title, first, i
                )));
            }
        }
        Ok(Self { titles, positions })
    }

    /// Row position of an exact title match.
    pub fn position(&self, title: &str) -> Option<usize> {
        self.positions.get(title).copied()
    }

    /// Title at a row position.
    pub fn get(&self, position: usize) -> Option<&str> {
        self.titles.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.titles
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.titles.iter().map(String::as_str)
    }
}

/// Title-by-user ratings table.
///
/// Decoded from a pandas `orient="split"` export: `index` holds the titles,
/// `columns` the user ids and `data` one rating row per title. Missing
/// ratings (`null`) read as zero.
#[derive(Debug, Clone)]
pub struct PivotMatrix {
    index: Vec<String>,
    columns: Vec<String>,
    data: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct SplitFrame {
    index: Vec<String>,
    columns: Vec<serde_json::Value>,
    data: Vec<Vec<Option<f32>>>,
}

impl<'de> Deserialize<'de> for PivotMatrix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let frame = SplitFrame::deserialize(deserializer)?;
        let columns = frame
            .columns
            .into_iter()
            .map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        let data = frame
            .data
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(0.0)).collect())
            .collect();
        PivotMatrix::new(frame.index, columns, data).map_err(serde::de::Error::custom)
    }
}

impl PivotMatrix {
    /// Build a matrix, checking that every row has one value per column.
    pub fn new(index: Vec<String>, columns: Vec<String>, data: Vec<Vec<f32>>) -> StorageResult<Self> {
        if index.len() != data.len() {
            return Err(StorageError::SchemaError(format!(
                "pivot has {} index labels but {} rows",
                index.len(),
                data.len()
            )));
        }
        if let Some((i, row)) = data.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(StorageError::SchemaError(format!(
                "pivot row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { index, columns, data })
    }

    /// Feature vector of a row.
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        self.data.get(position).map(Vec::as_slice)
    }

    /// Row labels (titles) in order.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Column labels (user ids) in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.data
    }

    pub fn n_rows(&self) -> usize {
        self.data.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Check that row `i` belongs to `titles[i]` for every `i`.
    pub fn check_row_order(&self, titles: &TitleIndex) -> StorageResult<()> {
        if self.index.len() != titles.len() {
            return Err(StorageError::SchemaError(format!(
                "pivot has {} rows but the title list has {} titles",
                self.index.len(),
                titles.len()
            )));
        }
        for (i, (label, title)) in self.index.iter().zip(titles.iter()).enumerate() {
            if label != title {
                return Err(StorageError::SchemaError(format!(
                    "pivot row {} is {:?} but the title list has {:?}",
                    i, label, title
                )));
            }
        }
        Ok(())
    }
}

/// Per-book metadata, possibly with several rows per title.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    records: Vec<BookRecord>,
    first_by_title: HashMap<String, usize>,
}

impl MetadataTable {
    /// Index the records by the first occurrence of each title.
    pub fn new(records: Vec<BookRecord>) -> Self {
        let mut first_by_title = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            first_by_title.entry(record.title.clone()).or_insert(i);
        }
        Self {
            records,
            first_by_title,
        }
    }

    /// First record whose title equals `title`.
    pub fn record(&self, title: &str) -> Option<&BookRecord> {
        self.first_by_title.get(title).map(|&i| &self.records[i])
    }

    /// Author, year and cover of the first matching record.
    pub fn lookup(&self, title: &str) -> Option<BookDetails> {
        self.record(title).map(BookRecord::details)
    }

    /// Number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct titles.
    pub fn distinct_titles(&self) -> usize {
        self.first_by_title.len()
    }
}

/// The four artifacts, loaded and cross-checked.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pub model: NeighborModelSpec,
    pub titles: TitleIndex,
    pub metadata: MetadataTable,
    pub pivot: PivotMatrix,
}

impl ArtifactStore {
    /// Assemble a store and enforce the cross-artifact invariants.
    ///
    /// # Errors
    /// Returns `StorageError::SchemaError` if the pivot row order does not
    /// match the title list, or `StorageError::ModelError` if the model
    /// parameters are unusable
    pub fn new(
        model: NeighborModelSpec,
        titles: TitleIndex,
        metadata: MetadataTable,
        pivot: PivotMatrix,
    ) -> StorageResult<Self> {
        model
            .validate()
            .map_err(|e| StorageError::ModelError(e.to_string()))?;
        pivot.check_row_order(&titles)?;

        let missing = titles.iter().filter(|t| metadata.record(t).is_none()).count();
        if missing > 0 {
            debug!("{} titles have no metadata row", missing);
        }

        Ok(Self {
            model,
            titles,
            metadata,
            pivot,
        })
    }
}

/// Trait for artifact backends.
///
/// Implementations read each artifact from wherever the offline job left it.
/// `load` assembles them into a validated `ArtifactStore`.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Load the neighbor model parameters.
    async fn load_model(&self) -> StorageResult<NeighborModelSpec>;

    /// Load the ordered title list.
    async fn load_titles(&self) -> StorageResult<Vec<String>>;

    /// Load the metadata rows.
    async fn load_metadata(&self) -> StorageResult<Vec<BookRecord>>;

    /// Load the pivot matrix.
    async fn load_pivot(&self) -> StorageResult<PivotMatrix>;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String;

    /// Load all artifacts and check that they agree.
    async fn load(&self) -> StorageResult<ArtifactStore> {
        info!("Loading artifacts from {}", self.describe());

        let model = self.load_model().await?;
        let titles = TitleIndex::new(self.load_titles().await?)?;
        let metadata = MetadataTable::new(self.load_metadata().await?);
        let pivot = self.load_pivot().await?;

        info!(
            "Loaded {} titles, {} metadata rows, pivot {}x{}",
            titles.len(),
            metadata.len(),
            pivot.n_rows(),
            pivot.n_columns()
        );

        ArtifactStore::new(model, titles, metadata, pivot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, author: &str) -> BookRecord {
        BookRecord {
            title: title.to_string(),
            author: author.to_string(),
            year: "2001".to_string(),
            img_url: format!("http://covers/{}.jpg", title),
        }
    }

    fn titles(names: &[&str]) -> TitleIndex {
        TitleIndex::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_title_index_positions() {
        let index = titles(&["A", "B", "C"]);
        assert_eq!(index.position("B"), Some(1));
        assert_eq!(index.position("b"), None);
        assert_eq!(index.get(2), Some("C"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_title_index_rejects_duplicates() {
        let result = TitleIndex::new(vec!["A".into(), "B".into(), "A".into()]);
        assert!(matches!(result, Err(StorageError::SchemaError(_))));
    }

    #[test]
    fn test_metadata_first_match_wins() {
        let table = MetadataTable::new(vec![
            record("A", "first"),
            record("B", "other"),
            record("A", "second"),
        ]);
        assert_eq!(table.lookup("A").unwrap().author, "first");
        assert_eq!(table.len(), 3);
        assert_eq!(table.distinct_titles(), 2);
        assert!(table.lookup("missing").is_none());
    }

    #[test]
    fn test_metadata_lookup_is_idempotent() {
        let table = MetadataTable::new(vec![record("A", "x"), record("A", "y")]);
        assert_eq!(table.lookup("A"), table.lookup("A"));
    }

    #[test]
    fn test_pivot_split_decoding() {
        let json = r#"{
            "index": ["A", "B"],
            "columns": [254, "u2", 3.5],
            "data": [[0.0, 8.0, null], [5.0, 0.0, 10.0]]
        }"#;
        let pivot: PivotMatrix = serde_json::from_str(json).unwrap();
        assert_eq!(pivot.columns(), &["254", "u2", "3.5"]);
        assert_eq!(pivot.row(0), Some(&[0.0, 8.0, 0.0][..]));
        assert_eq!(pivot.n_rows(), 2);
    }

    #[test]
    fn test_pivot_rejects_ragged_rows() {
        let json = r#"{"index": ["A"], "columns": [1, 2], "data": [[1.0]]}"#;
        assert!(serde_json::from_str::<PivotMatrix>(json).is_err());

        let result = PivotMatrix::new(vec!["A".into(), "B".into()], vec!["1".into()], vec![vec![1.0]]);
        assert!(matches!(result, Err(StorageError::SchemaError(_))));
    }

    #[test]
    fn test_row_order_must_match_titles() {
        let pivot = PivotMatrix::new(
            vec!["A".into(), "B".into()],
            vec!["u1".into()],
            vec![vec![1.0], vec![2.0]],
        )
        .unwrap();
        assert!(pivot.check_row_order(&titles(&["A", "B"])).is_ok());
        assert!(pivot.check_row_order(&titles(&["B", "A"])).is_err());
        assert!(pivot.check_row_order(&titles(&["A"])).is_err());
    }

    #[test]
    fn test_store_rejects_invalid_model() {
        let pivot = PivotMatrix::new(vec!["A".into()], vec!["u1".into()], vec![vec![1.0]]).unwrap();
        let model = NeighborModelSpec {
            n_neighbors: 0,
            ..NeighborModelSpec::default()
        };
        let result = ArtifactStore::new(model, titles(&["A"]), MetadataTable::default(), pivot);
        assert!(matches!(result, Err(StorageError::ModelError(_))));
    }
}
