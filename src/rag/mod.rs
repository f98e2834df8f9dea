// Retrieval-augmented generation
// Embeds a question, retrieves the nearest chunks and asks the generator


pub mod prompt;

pub use prompt::{assemble_context, build_prompt};

use std::sync::Arc;

use tracing::{debug, info};

use crate::database::lancedb::{QueryResult, VectorStore};
use crate::embeddings::EmbeddingGateway;
use crate::{LogQaError, Result};

/// Text generation collaborator
///
/// Takes a complete prompt and returns the model's answer. Calls are
/// blocking and may take a long time.
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// # Errors
    /// `GenerationUnavailable` when the model cannot be reached or answers
    /// with something unusable.
    fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct RagEngine {
    gateway: Arc<EmbeddingGateway>,
    generator: Arc<dyn Generator>,
}

impl RagEngine {
    #[inline]
    pub fn new(gateway: Arc<EmbeddingGateway>, generator: Arc<dyn Generator>) -> Self {
        Self { gateway, generator }
    }

    #[inline]
    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    #[inline]
    pub fn generator_model(&self) -> &str {
        self.generator.model_name()
    }

    /// Embed a question off the async runtime
    #[inline]
    pub async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let gateway = Arc::clone(&self.gateway);
        let text = question.to_string();

        tokio::task::spawn_blocking(move || gateway.embed_one(&text))
            .await
            .map_err(|e| LogQaError::EmbeddingUnavailable(format!("embedding task failed: {e}")))?
            .map_err(|e| with_question(e, question))
    }

    /// Top `k` chunks for `question`, optionally restricted to one source
    #[inline]
    pub async fn retrieve(
        &self,
        store: &VectorStore,
        question: &str,
        source_filter: Option<&str>,
        k: usize,
    ) -> Result<QueryResult> {
        let vector = self.embed_question(question).await?;
        store.query(&vector, k, source_filter).await
    }

    /// Answer `question` from the chunks stored in `store`
    ///
    /// An empty retrieval still produces a prompt; the generator is left to
    /// say that nothing relevant was found.
    #[inline]
    pub async fn answer(
        &self,
        store: &VectorStore,
        question: &str,
        source_filter: Option<&str>,
        k: usize,
    ) -> Result<String> {
        let context = self.retrieve(store, question, source_filter, k).await?;
        self.answer_with_context(question, &context).await
    }

    /// Generate an answer from already retrieved chunks
    #[inline]
    pub async fn answer_with_context(&self, question: &str, context: &QueryResult) -> Result<String> {
        if context.is_empty() {
            debug!("No context retrieved for question: {}", question);
        }

        let prompt = build_prompt(&assemble_context(context), question);
        let generator = Arc::clone(&self.generator);

        info!(
            "Generating answer with {} ({} context chunks)",
            generator.model_name(),
            context.len()
        );

        tokio::task::spawn_blocking(move || generator.generate(&prompt))
            .await
            .map_err(|e| LogQaError::GenerationUnavailable(format!("generation task failed: {e}")))?
            .map_err(|e| with_question(e, question))
    }
}

/// Attach the question to collaborator failures so the user can retry it
fn with_question(error: LogQaError, question: &str) -> LogQaError {
    match error {
        LogQaError::EmbeddingUnavailable(msg) => {
            LogQaError::EmbeddingUnavailable(format!("{msg} (question: {question:?})"))
        }
        LogQaError::GenerationUnavailable(msg) => {
            LogQaError::GenerationUnavailable(format!("{msg} (question: {question:?})"))
        }
        other => other,
    }
}
