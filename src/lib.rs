use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogQaError>;

#[derive(Error, Debug)]
pub enum LogQaError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Invalid selection: {0}")]
    Selection(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod ollama;
pub mod pipeline;
pub mod rag;
