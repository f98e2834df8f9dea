// Embeddings module
// Chunking of documents and conversion of text into vectors

pub mod chunking;
pub mod gateway;
pub mod hashing;

pub use chunking::{Chunk, ChunkingConfig, chunk_document, record_id, split};
pub use gateway::{Embedder, EmbeddingGateway};
pub use hashing::HashingEmbedder;
