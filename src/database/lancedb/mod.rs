// LanceDB vector index module
// Stores chunk text, vectors and source metadata; answers nearest-neighbour queries

#[cfg(test)]
mod tests;

pub mod vector_store;

pub use vector_store::VectorStore;

use serde::{Deserialize, Serialize};

/// Similarity metric used for nearest-neighbour search
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance, the metric nomic-embed-text vectors are trained for
    #[default]
    Cosine,
    /// Squared Euclidean distance
    L2,
}

impl DistanceMetric {
    #[inline]
    pub fn distance_type(self) -> lancedb::DistanceType {
        match self {
            DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
            DistanceMetric::L2 => lancedb::DistanceType::L2,
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
        }
    }
}

/// A single nearest-neighbour match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Record identifier, `<source_id>_chunk_<sequence_index>`
    pub record_id: String,
    pub source_id: String,
    pub sequence_index: u32,
    pub text: String,
    /// Distance under the store's metric (lower is closer)
    pub distance: f32,
    /// Commit timestamp in microseconds, strictly increasing per store
    pub inserted_at: i64,
    /// Position of the record within its commit
    pub insert_position: u32,
}

impl SearchHit {
    /// Closest first; ties go to the earliest inserted record
    #[inline]
    pub fn rank(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.inserted_at.cmp(&other.inserted_at))
            .then(self.insert_position.cmp(&other.insert_position))
    }
}

/// Sort hits by rank and keep the best `k`
#[inline]
pub fn top_k(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(SearchHit::rank);
    hits.truncate(k);
    hits
}

/// Ordered chunk texts judged nearest to a query
///
/// Always a flat sequence. Nested shapes (one list per record batch or per
/// index) are flattened on construction, preserving order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    chunks: Vec<String>,
}

impl QueryResult {
    #[inline]
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    /// Flatten a sequence of sequences into one ordered result
    #[inline]
    pub fn from_nested<I, J>(groups: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = String>,
    {
        Self {
            chunks: groups.into_iter().flatten().collect(),
        }
    }

    #[inline]
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.chunks.iter()
    }

    #[inline]
    pub fn into_inner(self) -> Vec<String> {
        self.chunks
    }
}

impl From<Vec<String>> for QueryResult {
    #[inline]
    fn from(chunks: Vec<String>) -> Self {
        Self::new(chunks)
    }
}

impl From<Vec<SearchHit>> for QueryResult {
    #[inline]
    fn from(hits: Vec<SearchHit>) -> Self {
        Self {
            chunks: hits.into_iter().map(|hit| hit.text).collect(),
        }
    }
}

impl FromIterator<String> for QueryResult {
    #[inline]
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for QueryResult {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
