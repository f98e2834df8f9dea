#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests with the offline hashing embedder and a stub generator

use log_qa::LogQaError;
use log_qa::config::{Config, EmbeddingProvider};
use log_qa::embeddings::{ChunkingConfig, HashingEmbedder};
use log_qa::pipeline::{IndexLayout, Pipeline};
use log_qa::rag::Generator;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records prompts and answers with a canned reply
#[derive(Default)]
struct StubGenerator {
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .expect("generator should have been called")
    }
}

impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn generate(&self, prompt: &str) -> log_qa::Result<String> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        Ok("stub answer".to_string())
    }
}

fn config(home: &Path, layout: IndexLayout) -> Config {
    let mut config = Config {
        base_dir: home.to_path_buf(),
        chunking: ChunkingConfig {
            window: 20,
            overlap: 5,
        },
        ..Config::default()
    };
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.embedding.dimension = 256;
    config.index.layout = layout;
    config.index.top_k = 2;
    config
}

async fn pipeline(home: &Path, layout: IndexLayout, generator: Arc<StubGenerator>) -> Pipeline {
    Pipeline::new(
        config(home, layout),
        Arc::new(HashingEmbedder::new(256)),
        generator,
    )
    .await
    .expect("should build pipeline")
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("should write file");
    path
}

#[tokio::test]
async fn error_question_retrieves_error_chunk() {
    let home = TempDir::new().expect("should create temp dir");
    let logs = TempDir::new().expect("should create temp dir");
    let path = write(
        logs.path(),
        "service.log",
        "ERROR db timeout at 10:02\nOK request served at 10:03",
    );
    let generator = Arc::new(StubGenerator::default());
    let mut pipeline = pipeline(home.path(), IndexLayout::Shared, Arc::clone(&generator)).await;

    pipeline.index_path(&path).await.expect("should index");
    let answer = pipeline
        .answer("was there an error?", None)
        .await
        .expect("should answer");

    assert_eq!(answer, "stub answer");
    let prompt = generator.last_prompt();
    let context = prompt
        .split("Context:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\n---").next())
        .expect("prompt should have a context section");
    assert!(context.starts_with("ERROR db timeout"));
}

#[tokio::test]
async fn index_survives_restart() {
    let home = TempDir::new().expect("should create temp dir");
    let logs = TempDir::new().expect("should create temp dir");
    let path = write(logs.path(), "service.log", "ERROR disk full on /var\nINFO cleanup done");

    {
        let mut pipeline = pipeline(
            home.path(),
            IndexLayout::PerDocument,
            Arc::new(StubGenerator::default()),
        )
        .await;
        pipeline.index_path(&path).await.expect("should index");
    }

    let generator = Arc::new(StubGenerator::default());
    let mut pipeline = pipeline(home.path(), IndexLayout::PerDocument, Arc::clone(&generator)).await;
    let documents = pipeline.indexed_documents().await.expect("should list");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source_id, "service_log");

    pipeline
        .answer("disk full?", Some("service_log"))
        .await
        .expect("should answer after restart");
    assert!(generator.last_prompt().contains("ERROR disk full"));
}

#[tokio::test]
async fn selecting_unindexed_document_fails() {
    let home = TempDir::new().expect("should create temp dir");
    let mut pipeline = pipeline(
        home.path(),
        IndexLayout::Shared,
        Arc::new(StubGenerator::default()),
    )
    .await;

    let err = pipeline
        .answer("anything?", Some("nope_log"))
        .await
        .expect_err("unknown document should fail");
    assert!(matches!(err, LogQaError::Selection(_)));
}

#[tokio::test]
async fn missing_file_aborts_only_that_document() {
    let home = TempDir::new().expect("should create temp dir");
    let logs = TempDir::new().expect("should create temp dir");
    let good = write(logs.path(), "good.log", "INFO all fine");
    let missing = logs.path().join("missing.log");
    let mut pipeline = pipeline(
        home.path(),
        IndexLayout::Shared,
        Arc::new(StubGenerator::default()),
    )
    .await;

    let mut committed = Vec::new();
    let result = pipeline
        .index_paths(&[good, missing], |d| committed.push(d.source_id.clone()))
        .await;

    assert!(result.is_err());
    assert_eq!(committed, ["good_log"]);
    let documents = pipeline.indexed_documents().await.expect("should list");
    assert_eq!(documents.len(), 1);
}
