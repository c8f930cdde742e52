//! Recommendation engine.
//!
//! Maps a title to its pivot row, asks the neighbor index for the nearest
//! rows, and maps those back to titles. The query book is its own nearest
//! neighbor and is returned first; it is not filtered out.
//!
//! # Usage
//!
//! ```rust,no_run
//! use book_recommender::recommend::{KnnRecommender, Recommender};
//! use book_recommender::retailer::RetailerSearch;
//! use book_recommender::storage::{json::JsonArtifactSource, ArtifactSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonArtifactSource::new("artifacts").load().await?;
//! let recommender = KnnRecommender::from_store(store, None, RetailerSearch::default())?;
//!
//! for book in recommender.recommend_books("The Da Vinci Code")? {
//!     println!("{} ({})", book.title, book.author_or_unknown());
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{BookDetails, RecommendedBook};
use crate::neighbors::{
    BruteForceIndex, NearestNeighbors, Neighbor, NeighborError, DEFAULT_N_NEIGHBORS,
};
use crate::retailer::RetailerSearch;
use crate::storage::ArtifactStore;

/// Message shown to users when a title is not in the title index.
pub const NOT_FOUND_MESSAGE: &str = "Book not found in the dataset.";

/// Errors that can occur while recommending.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// The title has no exact match in the title index
    #[error("Title not found: {0}")]
    TitleNotFound(String),

    /// The neighbor index rejected the query
    #[error("Neighbor query failed: {0}")]
    NeighborError(#[from] NeighborError),

    /// The neighbor index and the artifacts disagree
    #[error("Inconsistent artifacts: {0}")]
    Inconsistent(String),
}

/// Result type for recommendation operations.
pub type RecommendResult<T> = Result<T, RecommendError>;

/// Trait for title-to-titles recommenders.
pub trait Recommender: Send + Sync {
    /// Titles similar to `title`, nearest first, the query title included.
    ///
    /// # Errors
    /// Returns `RecommendError::TitleNotFound` if `title` is not an exact
    /// entry of the title index
    fn recommend(&self, title: &str) -> RecommendResult<Vec<String>>;

    /// Like `recommend`, joined with metadata, distance and search link.
    ///
    /// Titles without metadata are kept with `details: None`.
    fn recommend_books(&self, title: &str) -> RecommendResult<Vec<RecommendedBook>>;

    /// Author, year and cover of the first metadata row for `title`.
    fn lookup(&self, title: &str) -> Option<BookDetails>;

    /// Every valid input title, in index order.
    fn titles(&self) -> &[String];

    /// Retailer used for search links.
    fn retailer(&self) -> &RetailerSearch;
}

/// Recommender backed by a nearest-neighbor index over pivot rows.
pub struct KnnRecommender<N>
where
    N: NearestNeighbors,
{
    /// Loaded artifacts
    store: ArtifactStore,

    /// Index fitted over the pivot rows, row `i` being title `i`
    index: N,

    /// Neighbors requested per query, the query book included
    n_neighbors: usize,

    /// Search link builder
    retailer: RetailerSearch,
}

impl KnnRecommender<BruteForceIndex> {
    /// Fit the exported model over the pivot rows.
    ///
    /// Queries ask for `n_neighbors` rows, or `DEFAULT_N_NEIGHBORS` when
    /// unset. The model's own `n_neighbors` is a fit parameter and does not
    /// change the query size.
    ///
    /// # Errors
    /// Returns `RecommendError::NeighborError` if the model cannot be fitted
    pub fn from_store(
        store: ArtifactStore,
        n_neighbors: Option<usize>,
        retailer: RetailerSearch,
    ) -> RecommendResult<Self> {
        let index = store.model.fit(store.pivot.rows().to_vec())?;
        let n_neighbors = n_neighbors.unwrap_or(DEFAULT_N_NEIGHBORS);
        debug!(
            "Fitted {:?} index over {} rows with k={}",
            index.metric(),
            index.len(),
            n_neighbors
        );
        Self::new(store, index, n_neighbors, retailer)
    }
}

impl<N> KnnRecommender<N>
where
    N: NearestNeighbors,
{
    /// Create a recommender from loaded artifacts and a fitted index.
    ///
    /// # Errors
    /// Returns `RecommendError::Inconsistent` if the index does not cover
    /// exactly the pivot rows, or `NeighborError::InvalidK` for `n_neighbors == 0`
    pub fn new(
        store: ArtifactStore,
        index: N,
        n_neighbors: usize,
        retailer: RetailerSearch,
    ) -> RecommendResult<Self> {
        if n_neighbors == 0 {
            return Err(NeighborError::InvalidK(0).into());
        }
        if index.len() != store.titles.len() {
            return Err(RecommendError::Inconsistent(format!(
                "index has {} rows but there are {} titles",
                index.len(),
                store.titles.len()
            )));
        }
        if index.dimension() != store.pivot.n_columns() {
            return Err(RecommendError::Inconsistent(format!(
                "index rows have {} features but the pivot has {} columns",
                index.dimension(),
                store.pivot.n_columns()
            )));
        }

        Ok(Self {
            store,
            index,
            n_neighbors,
            retailer,
        })
    }

    /// Loaded artifacts.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Neighbors requested per query.
    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Neighbor rows for `title`, nearest first, the title's own row leading.
    fn neighbors_of(&self, title: &str) -> RecommendResult<Vec<Neighbor>> {
        let position = self
            .store
            .titles
            .position(title)
            .ok_or_else(|| RecommendError::TitleNotFound(title.to_string()))?;

        let vector = self.store.pivot.row(position).ok_or_else(|| {
            RecommendError::Inconsistent(format!("no pivot row {} for {:?}", position, title))
        })?;

        let mut neighbors = self.index.query(vector, self.n_neighbors)?;
        put_query_first(&mut neighbors, position, self.n_neighbors);

        debug!("{:?} -> {} neighbors", title, neighbors.len());
        Ok(neighbors)
    }

    fn title_at(&self, position: usize) -> RecommendResult<&str> {
        self.store.titles.get(position).ok_or_else(|| {
            RecommendError::Inconsistent(format!("neighbor row {} is out of range", position))
        })
    }
}

/// Make the query row the first neighbor, at distance zero.
///
/// Rows tied with the query (exact duplicates, or parallel rows under the
/// cosine metric where the self-distance rounds above zero) can otherwise
/// lead. If the query row fell outside the `k` returned rows it is inserted
/// and the farthest row dropped.
fn put_query_first(neighbors: &mut Vec<Neighbor>, position: usize, k: usize) {
    let own = match neighbors.iter().position(|n| n.index == position) {
        Some(at) => neighbors.remove(at),
        None => Neighbor {
            index: position,
            distance: 0.0,
        },
    };
    neighbors.insert(
        0,
        Neighbor {
            distance: 0.0,
            ..own
        },
    );
    neighbors.truncate(k);
}

impl<N> Recommender for KnnRecommender<N>
where
    N: NearestNeighbors,
{
    fn recommend(&self, title: &str) -> RecommendResult<Vec<String>> {
        self.neighbors_of(title)?
            .iter()
            .map(|n| self.title_at(n.index).map(str::to_string))
            .collect()
    }

    fn recommend_books(&self, title: &str) -> RecommendResult<Vec<RecommendedBook>> {
        self.neighbors_of(title)?
            .iter()
            .map(|n| {
                let title = self.title_at(n.index)?;
                let details = self.store.metadata.lookup(title);
                if details.is_none() {
                    warn!("No metadata for recommended title {:?}", title);
                }
                Ok(RecommendedBook {
                    title: title.to_string(),
                    details,
                    distance: n.distance,
                    search_url: self.retailer.search_url(title),
                })
            })
            .collect()
    }

    fn lookup(&self, title: &str) -> Option<BookDetails> {
        self.store.metadata.lookup(title)
    }

    fn titles(&self) -> &[String] {
        self.store.titles.as_slice()
    }

    fn retailer(&self) -> &RetailerSearch {
        &self.retailer
    }
}
