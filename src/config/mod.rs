//! Runtime configuration shared by the binaries.
//!
//! Values come from `BOOKREC_*` environment variables with built-in defaults;
//! command-line flags in the binaries override them.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::neighbors::BruteForceIndex;
use crate::recommend::{KnnRecommender, RecommendError};
use crate::retailer::{RetailerSearch, DEFAULT_RETAILER_NAME, DEFAULT_RETAILER_URL};
use crate::storage::{json::JsonArtifactSource, ArtifactSource, StorageError};

/// Default artifact directory, relative to the working directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Errors that can occur while bringing the recommender up.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Artifacts missing, corrupt or inconsistent
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Model could not be fitted over the artifacts
    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

/// Settings for loading and querying the recommender.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommenderConfig {
    /// Directory holding the four artifact files
    pub artifacts_dir: PathBuf,

    /// Neighbor count override; the model's own count when `None`
    pub n_neighbors: Option<usize>,

    /// Retailer base URL for search links
    pub retailer_url: String,

    /// Retailer name shown on search buttons
    pub retailer_name: String,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            n_neighbors: None,
            retailer_url: DEFAULT_RETAILER_URL.to_string(),
            retailer_name: DEFAULT_RETAILER_NAME.to_string(),
        }
    }
}

impl RecommenderConfig {
    /// Read `BOOKREC_ARTIFACTS_DIR`, `BOOKREC_NEIGHBORS`,
    /// `BOOKREC_RETAILER_URL` and `BOOKREC_RETAILER_NAME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("BOOKREC_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(val) = lookup("BOOKREC_NEIGHBORS") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.n_neighbors = Some(n),
                _ => warn!("Ignoring BOOKREC_NEIGHBORS={:?}: not a positive integer", val),
            }
        }
        if let Some(url) = lookup("BOOKREC_RETAILER_URL") {
            config.retailer_url = url;
        }
        if let Some(name) = lookup("BOOKREC_RETAILER_NAME") {
            config.retailer_name = name;
        }

        config
    }

    /// Search link builder for the configured retailer.
    pub fn retailer(&self) -> RetailerSearch {
        RetailerSearch::new(&self.retailer_url, &self.retailer_name)
    }

    /// Load the artifacts and fit the neighbor index.
    ///
    /// # Errors
    /// Returns `StartupError` if any artifact is missing, corrupt or
    /// inconsistent with the others
    pub async fn load_recommender(&self) -> Result<KnnRecommender<BruteForceIndex>, StartupError> {
        let source = JsonArtifactSource::new(&self.artifacts_dir);

        let missing = source.missing_files();
        if !missing.is_empty() {
            let names: Vec<String> = missing
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            return Err(StorageError::ReadError(format!(
                "{} is missing {}",
                source.dir().display(),
                names.join(", ")
            ))
            .into());
        }

        let store = source.load().await?;
        let recommender = KnnRecommender::from_store(store, self.n_neighbors, self.retailer())?;

        info!(
            "Recommender ready: {} titles, k={}",
            recommender.store().titles.len(),
            recommender.n_neighbors()
        );
        Ok(recommender)
    }
}
