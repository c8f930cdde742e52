//! Book Recommender - item-based nearest-neighbor book recommendations.
//!
//! Given a book title, the recommender finds the titles whose user-rating
//! profiles are closest to it and returns them with author, year, cover
//! image and a retailer search link.
//!
//! # Architecture
//!
//! - **models**: Book metadata and recommendation result types
//! - **storage**: Loading and validating the prepared artifacts
//! - **neighbors**: Distance metrics and the nearest-neighbor index
//! - **recommend**: Title to recommendations, with metadata enrichment
//! - **retailer**: Outbound search links
//! - **config**: Environment-driven settings and startup
//! - **server**: HTTP page and JSON API
//!
//! # Workflow
//!
//! 1. Load the neighbor model parameters, title list, metadata table and
//!    pivot matrix from the artifact directory
//! 2. Check that the pivot rows line up with the title list
//! 3. Fit the neighbor index over the pivot rows
//! 4. For each request, look up the title's row, query its neighbors and
//!    attach metadata and a search link to each
//!
//! # Example
//!
//! ```ignore
//! use book_recommender::{config::RecommenderConfig, Recommender};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recommender = RecommenderConfig::from_env().load_recommender().await?;
//!
//!     for book in recommender.recommend_books("The Da Vinci Code")? {
//!         println!("{} ({}) {}", book.title, book.author_or_unknown(), book.search_url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod models;
pub mod neighbors;
pub mod recommend;
pub mod retailer;
pub mod server;
pub mod storage;

pub use models::{BookDetails, BookRecord, RecommendedBook};
pub use neighbors::{BruteForceIndex, DistanceMetric, NearestNeighbors};
pub use recommend::{KnnRecommender, RecommendError, Recommender};
pub use retailer::RetailerSearch;
pub use storage::{ArtifactSource, ArtifactStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
