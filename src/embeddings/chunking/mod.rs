#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Document;
use crate::{LogQaError, Result};

/// A bounded window of a document's text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Source id of the document this chunk was cut from
    pub source_id: String,
    /// Position of this chunk within its document
    pub sequence_index: u32,
    /// The chunk text
    pub text: String,
}

impl Chunk {
    /// Identifier of the record this chunk is stored under
    #[inline]
    pub fn record_id(&self) -> String {
        record_id(&self.source_id, self.sequence_index)
    }
}

/// Build the stored record id for a chunk of a source
#[inline]
pub fn record_id(source_id: &str, sequence_index: u32) -> String {
    format!("{}_chunk_{}", source_id, sequence_index)
}

/// Sliding window settings, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub window: usize,
    /// Characters shared between neighbouring chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window: 500,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        validate_window(self.window, self.overlap)
    }

    /// Distance between the start offsets of consecutive chunks
    #[inline]
    pub fn stride(&self) -> usize {
        self.window.saturating_sub(self.overlap)
    }
}

fn validate_window(window: usize, overlap: usize) -> Result<()> {
    if window == 0 {
        return Err(LogQaError::InvalidConfiguration(
            "chunk window must be greater than zero".to_string(),
        ));
    }
    if overlap >= window {
        return Err(LogQaError::InvalidConfiguration(format!(
            "chunk overlap ({}) must be smaller than the window ({})",
            overlap, window
        )));
    }
    Ok(())
}

/// Split `text` into windows of `window` characters advancing by
/// `window - overlap`.
///
/// The last chunk may be shorter than `window`. Splitting stops after the
/// first chunk that reaches the end of the text, so for non-empty text the
/// result holds `max(1, ceil((len - overlap) / (window - overlap)))` chunks.
#[inline]
pub fn split(text: &str, window: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(window, overlap)?;

    // Byte offset of every character plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;
    let stride = window - overlap;

    let mut chunks = Vec::with_capacity(char_count.div_ceil(stride));
    let mut start = 0;
    while start < char_count {
        let end = (start + window).min(char_count);
        let piece = text
            .get(boundaries[start]..boundaries[end])
            .ok_or_else(|| anyhow::anyhow!("invalid chunk boundary {}..{}", start, end))?;
        chunks.push(piece.to_string());

        if end == char_count {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Chunk a loaded document into sequenced chunks carrying its source id
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let pieces = split(&document.text, config.window, config.overlap).map_err(|e| match e {
        LogQaError::InvalidConfiguration(msg) => LogQaError::InvalidConfiguration(format!(
            "cannot chunk '{}': {}",
            document.source_id, msg
        )),
        other => other,
    })?;

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            source_id: document.source_id.clone(),
            sequence_index: index as u32,
            text,
        })
        .collect();

    debug!(
        "Chunked '{}' ({} chars) into {} chunks (window {}, overlap {})",
        document.source_id,
        document.text.chars().count(),
        chunks.len(),
        config.window,
        config.overlap
    );

    Ok(chunks)
}
