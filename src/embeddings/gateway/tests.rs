use std::sync::Mutex;

use super::*;

/// Returns the configured vectors verbatim and records every call
struct ScriptedEmbedder {
    responses: Mutex<Vec<Vec<Vec<f32>>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedEmbedder {
    fn new(responses: Vec<Vec<Vec<f32>>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Embedder for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().expect("lock").push(texts.to_vec());
        let mut responses = self.responses.lock().expect("lock");
        if responses.is_empty() {
            return Err(LogQaError::EmbeddingUnavailable("no response".to_string()));
        }
        Ok(responses.remove(0))
    }
}

#[test]
fn embed_preserves_order_and_count() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![0.5, 0.5],
    ]]));
    let gateway = EmbeddingGateway::new(embedder.clone());

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = gateway.embed(&texts).expect("embed should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
    assert_eq!(gateway.dimension(), Some(2));
    assert_eq!(embedder.calls.lock().expect("lock")[0], texts);
}

#[test]
fn empty_input_skips_the_embedder() {
    let embedder = Arc::new(ScriptedEmbedder::new(Vec::new()));
    let gateway = EmbeddingGateway::new(embedder.clone());

    let vectors = gateway.embed(&[]).expect("embed should succeed");

    assert!(vectors.is_empty());
    assert!(embedder.calls.lock().expect("lock").is_empty());
}

#[test]
fn count_mismatch_is_unavailable() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![vec![1.0, 0.0]]]));
    let gateway = EmbeddingGateway::new(embedder);

    let result = gateway.embed(&["a".to_string(), "b".to_string()]);
    assert!(matches!(result, Err(LogQaError::EmbeddingUnavailable(_))));
}

#[test]
fn empty_vectors_are_unavailable() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![Vec::new()]]));
    let gateway = EmbeddingGateway::new(embedder);

    let result = gateway.embed_one("a");
    assert!(matches!(result, Err(LogQaError::EmbeddingUnavailable(_))));
}

#[test]
fn dimension_is_stable_across_calls() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![
        vec![vec![1.0, 0.0, 0.0]],
        vec![vec![1.0, 0.0]],
    ]));
    let gateway = EmbeddingGateway::new(embedder);

    gateway.embed_one("first").expect("first call locks dimension");
    let result = gateway.embed_one("second");

    assert!(matches!(result, Err(LogQaError::EmbeddingUnavailable(_))));
    assert_eq!(gateway.dimension(), Some(3));
}

#[test]
fn fixed_dimension_rejects_other_sizes() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![vec![1.0, 0.0]]]));
    let gateway = EmbeddingGateway::with_dimension(embedder, 4);

    let result = gateway.embed_one("text");
    assert!(matches!(result, Err(LogQaError::EmbeddingUnavailable(_))));
}

#[test]
fn mixed_dimensions_in_one_batch_are_rejected() {
    let embedder = Arc::new(ScriptedEmbedder::new(vec![vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0, 0.0],
    ]]));
    let gateway = EmbeddingGateway::new(embedder);

    let err = gateway
        .embed(&["a".to_string(), "b".to_string()])
        .expect_err("mixed dimensions must fail");
    assert!(err.to_string().contains("input 1"));
    assert_eq!(gateway.dimension(), None);
}

#[test]
fn embed_one_matches_batch_embedding() {
    let embedder = Arc::new(LengthEmbedder);
    let gateway = EmbeddingGateway::new(embedder);

    let single = gateway.embed_one("disk full").expect("embed_one");
    let batch = gateway.embed(&["disk full".to_string()]).expect("embed");
    assert_eq!(single, batch[0]);
}

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length"
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 1.0])
            .collect())
    }
}
