//! Nearest-neighbor index abstraction and the brute-force implementation.
//!
//! The recommender treats the neighbor model as a black box answering one
//! question: given a feature vector, which rows are closest and how far are
//! they. `NearestNeighbors` is that boundary; `BruteForceIndex` satisfies it
//! with an exact scan over every fitted row.
//!
//! # Usage
//!
//! ```
//! use book_recommender::neighbors::{BruteForceIndex, DistanceMetric, NearestNeighbors};
//!
//! let rows = vec![
//!     vec![0.0, 0.0],
//!     vec![1.0, 0.0],
//!     vec![5.0, 5.0],
//! ];
//! let index = BruteForceIndex::fit(rows, DistanceMetric::Euclidean).unwrap();
//!
//! let neighbors = index.query(&[0.0, 0.0], 2).unwrap();
//! assert_eq!(neighbors[0].index, 0);
//! assert_eq!(neighbors[1].index, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Neighbor count used when the model export names none.
pub const DEFAULT_N_NEIGHBORS: usize = 6;

/// Errors that can occur while fitting or querying a neighbor index.
#[derive(Debug, Error)]
pub enum NeighborError {
    /// Query or row vector has the wrong number of features
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// k must be at least 1
    #[error("Invalid neighbor count: {0}")]
    InvalidK(usize),

    /// Nothing was fitted
    #[error("Neighbor index is empty")]
    EmptyIndex,

    /// Model parameters that cannot produce distances
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

/// Result type for neighbor operations.
pub type NeighborResult<T> = Result<T, NeighborError>;

/// Distance metric between two feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `sqrt(sum((a_i - b_i)^2))`, the export default (Minkowski with p = 2)
    #[default]
    Euclidean,
    /// `sum(|a_i - b_i|)`
    Manhattan,
    /// `sum(|a_i - b_i|^p)^(1/p)`
    Minkowski(f32),
    /// `1 - cos(a, b)`; a zero vector is at distance 1 from everything
    Cosine,
}

impl DistanceMetric {
    /// Reject parameters that would yield NaN or meaningless distances.
    pub fn validate(&self) -> NeighborResult<()> {
        match self {
            DistanceMetric::Minkowski(p) if !p.is_finite() || *p <= 0.0 => Err(
                NeighborError::InvalidModel(format!("minkowski p must be positive, got {}", p)),
            ),
            _ => Ok(()),
        }
    }

    /// Distance between `a` and `b`. Both slices must have the same length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Minkowski(p) => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs().powf(*p))
                .sum::<f32>()
                .powf(1.0 / p),
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
        }
    }
}

/// Search strategy named in the model export.
///
/// All of these are exact searches and return the same neighbors, so the
/// index always answers with a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Auto,
    Brute,
    BallTree,
    KdTree,
}

/// Parameters of the exported neighbor model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborModelSpec {
    /// Search strategy used at training time
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Distance metric
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Neighbor count the model was fitted with. Validated, but queries pick
    /// their own `k`.
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
}

fn default_n_neighbors() -> usize {
    DEFAULT_N_NEIGHBORS
}

impl Default for NeighborModelSpec {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            metric: DistanceMetric::default(),
            n_neighbors: DEFAULT_N_NEIGHBORS,
        }
    }
}

impl NeighborModelSpec {
    /// Check the exported parameters before fitting.
    pub fn validate(&self) -> NeighborResult<()> {
        if self.n_neighbors == 0 {
            return Err(NeighborError::InvalidK(0));
        }
        self.metric.validate()
    }

    /// Fit an index over `rows` with this model's metric.
    pub fn fit(&self, rows: Vec<Vec<f32>>) -> NeighborResult<BruteForceIndex> {
        self.validate()?;
        BruteForceIndex::fit(rows, self.metric)
    }
}

/// A single neighbor returned by a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row position in the fitted data
    pub index: usize,

    /// Distance from the query vector
    pub distance: f32,
}

/// Trait for nearest-neighbor indexes over fixed-width feature rows.
pub trait NearestNeighbors: Send + Sync {
    /// Return up to `k` rows closest to `vector`, nearest first.
    ///
    /// Fewer than `k` neighbors are returned when the index holds fewer rows.
    ///
    /// # Errors
    /// Returns `NeighborError` if `k` is zero or `vector` has the wrong width
    fn query(&self, vector: &[f32], k: usize) -> NeighborResult<Vec<Neighbor>>;

    /// Number of fitted rows.
    fn len(&self) -> usize;

    /// Whether no rows were fitted.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of every fitted row.
    fn dimension(&self) -> usize;
}

/// Exact nearest-neighbor search by scanning every row.
///
/// Rows are stored contiguously. Ties on distance are broken by row index so
/// that results are stable for a fixed artifact set.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    data: Vec<f32>,
    n_rows: usize,
    dimension: usize,
    metric: DistanceMetric,
}

impl BruteForceIndex {
    /// Store `rows` for later queries.
    ///
    /// # Errors
    /// Returns `NeighborError` if there are no rows, rows differ in width, or
    /// the metric is invalid
    pub fn fit(rows: Vec<Vec<f32>>, metric: DistanceMetric) -> NeighborResult<Self> {
        metric.validate()?;

        let dimension = rows.first().map(Vec::len).ok_or(NeighborError::EmptyIndex)?;
        if dimension == 0 {
            return Err(NeighborError::InvalidModel("rows have no features".to_string()));
        }
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * dimension);

        for row in rows {
            if row.len() != dimension {
                return Err(NeighborError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }

        Ok(Self {
            data,
            n_rows,
            dimension,
            metric,
        })
    }

    /// Metric used for queries.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Feature vector of a fitted row.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.n_rows {
            return None;
        }
        let start = index * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }
}

impl NearestNeighbors for BruteForceIndex {
    fn query(&self, vector: &[f32], k: usize) -> NeighborResult<Vec<Neighbor>> {
        if k == 0 {
            return Err(NeighborError::InvalidK(k));
        }
        if vector.len() != self.dimension {
            return Err(NeighborError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(index, row)| {
                let distance = self.metric.distance(vector, row);
                Neighbor {
                    index,
                    // NaN sorts last instead of poisoning the order
                    distance: if distance.is_nan() { f32::INFINITY } else { distance },
                }
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    fn len(&self) -> usize {
        self.n_rows
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
