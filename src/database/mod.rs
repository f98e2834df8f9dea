// Database module
// LanceDB holds the vector index, SQLite the catalog of indexed documents

pub mod lancedb;
pub mod sqlite;

pub use lancedb::{DistanceMetric, QueryResult, SearchHit, VectorStore};
pub use sqlite::Database;
