use anyhow::Context;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::documents::{is_exit_command, list_documents, parse_selection, source_id_from_path};
use crate::ollama::OllamaClient;
use crate::pipeline::Pipeline;
use crate::{LogQaError, Result};

fn progress_bar(len: usize) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(len as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Expand directories into the indexable files they contain
fn collect_paths(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(list_documents(path, extensions)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Index files (or every indexable file of a directory)
#[inline]
pub async fn index_files(config: Config, paths: &[PathBuf]) -> Result<()> {
    let files = collect_paths(paths, &config.documents.extensions)?;
    if files.is_empty() {
        println!("No indexable files found.");
        return Ok(());
    }

    let mut pipeline = Pipeline::from_config(config).await?;
    index_with_progress(&mut pipeline, &files).await?;

    println!(
        "{}",
        style(format!("✓ Indexed {} file(s)", files.len())).green()
    );
    Ok(())
}

async fn index_with_progress(pipeline: &mut Pipeline, files: &[PathBuf]) -> Result<Vec<String>> {
    let bar = progress_bar(files.len());
    let documents = pipeline
        .index_paths(files, |document| {
            bar.inc(1);
            bar.set_message(document.source_id.clone());
            info!(
                "Indexed {} ({} chunks)",
                document.path, document.chunk_count
            );
        })
        .await;
    bar.finish_and_clear();

    let documents = documents?;
    for document in &documents {
        println!(
            "  📄 {} → {} chunks",
            style(&document.source_id).cyan(),
            document.chunk_count
        );
    }

    Ok(documents.into_iter().map(|d| d.source_id).collect())
}

/// Answer a single question from the indexed documents
#[inline]
pub async fn ask(
    mut config: Config,
    question: &str,
    source: Option<&str>,
    top_k: Option<usize>,
) -> Result<()> {
    if let Some(k) = top_k {
        config.index.top_k = k;
    }

    let mut pipeline = Pipeline::from_config(config).await?;
    let answer = pipeline.answer(question, source).await?;

    println!("{}", answer.trim_end());
    Ok(())
}

/// Interactive session: pick files from `dir`, index them, then ask questions
#[inline]
pub async fn chat(config: Config, dir: &Path) -> Result<()> {
    let files = list_documents(dir, &config.documents.extensions)?;
    if files.is_empty() {
        println!("No readable log files found in {}", dir.display());
        return Ok(());
    }

    println!("{}", style("📄 Available log files:").bold().cyan());
    for (number, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
        println!("  {}. {}", number + 1, name);
    }
    println!();

    let input: String = Input::new()
        .with_prompt("Select files by number (comma-separated), or 'exit'")
        .interact_text()
        .context("Failed to read selection")?;

    if is_exit_command(&input) {
        println!("👋 Exiting.");
        return Ok(());
    }

    let selected: Vec<PathBuf> = parse_selection(&input, files.len())?
        .into_iter()
        .filter_map(|i| files.get(i).cloned())
        .collect();

    let mut pipeline = Pipeline::from_config(config).await?;
    let sources = index_with_progress(&mut pipeline, &selected).await?;

    println!();
    println!(
        "{}",
        style("✅ Ready. Ask questions about the selected logs ('exit' to quit).").green()
    );

    loop {
        let question: String = Input::new()
            .with_prompt("❓ Question")
            .interact_text()
            .context("Failed to read question")?;

        if is_exit_command(&question) {
            println!("👋 Exiting.");
            break;
        }

        match pipeline.answer_each(&question, &sources).await {
            Ok(answers) => {
                for answer in answers {
                    println!();
                    println!("{}", style(format!("📘 {}", answer.source_id)).bold().yellow());
                    println!("{}", answer.answer.trim_end());
                }
                println!();
            }
            Err(e) => {
                // The question failed, the indexed documents are still usable
                error!("Failed to answer question: {}", e);
                eprintln!("{} {}", style("❌").red(), e);
            }
        }
    }

    Ok(())
}

/// List indexed documents
#[inline]
pub async fn list_indexed(config: &Config) -> Result<()> {
    let catalog = Database::open(&config.catalog_path()).await?;
    let documents = catalog.list_documents().await?;

    if documents.is_empty() {
        println!("No documents have been indexed yet.");
        println!("Use 'log-qa index <path>' or 'log-qa chat <dir>' to add some.");
        return Ok(());
    }

    println!("Indexed Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {}", style(&document.source_id).cyan());
        println!("   Path: {}", document.path);
        println!(
            "   Chunks: {} (window {}, overlap {})",
            document.chunk_count, document.window, document.overlap
        );
        println!("   Index: {}", document.index_path);
        println!("   Indexed: {}", document.indexed_at.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }

    Ok(())
}

/// Remove a document from its index and the catalog
///
/// Accepts a source id or the path of the indexed file.
#[inline]
pub async fn delete_indexed(config: Config, source: &str) -> Result<()> {
    let source_id = source_id_from_path(Path::new(source))?;

    let mut pipeline = Pipeline::from_config(config).await?;
    if !pipeline.remove_source(&source_id).await? {
        return Err(LogQaError::Selection(format!(
            "'{}' has not been indexed",
            source_id
        )));
    }

    println!("{}", style(format!("✓ Deleted {}", source_id)).green());
    Ok(())
}

/// Show the health of Ollama and the local indexes
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Log Q&A Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding Model: {}", config.ollama.embedding_model);
                println!("   💬 Generation Model: {}", config.ollama.generation_model);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {:#}", e);
        }
    }
    println!("   🧮 Embedding Provider: {}", config.embedding.provider);

    println!();
    println!("🗄️  Catalog Status:");
    let documents = match Database::open(&config.catalog_path()).await {
        Ok(catalog) => match catalog.list_documents().await {
            Ok(documents) => {
                println!("   ✅ SQLite: {} document(s) indexed", documents.len());
                documents
            }
            Err(e) => {
                println!("   ❌ SQLite: Failed to read catalog - {:#}", e);
                Vec::new()
            }
        },
        Err(e) => {
            println!("   ❌ SQLite: Failed to connect - {:#}", e);
            Vec::new()
        }
    };

    println!();
    println!("🔍 Vector Index Status:");
    let mut dirs: Vec<PathBuf> = documents
        .iter()
        .map(|d| d.index_dir().to_path_buf())
        .collect();
    dirs.sort();
    dirs.dedup();
    if dirs.is_empty() {
        dirs.push(config.vector_root());
    }

    for dir in &dirs {
        match VectorStore::open(dir, &config.index.collection, config.index.metric).await {
            Ok(store) => {
                let healthy = store.validate_integrity().await.unwrap_or(false);
                let count = store.count(None).await.unwrap_or(0);
                if healthy {
                    println!("   ✅ {}: {} chunk(s)", dir.display(), count);
                } else {
                    warn!("Vector index at {} failed integrity check", dir.display());
                    println!("   ⚠️  {}: integrity check failed", dir.display());
                }
            }
            Err(e) => {
                println!("   ❌ {}: {}", dir.display(), e);
            }
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'log-qa index <path>' to index log files");
    println!("   • Use 'log-qa ask \"<question>\"' to ask about them");
    println!("   • Use 'log-qa chat <dir>' for an interactive session");

    Ok(())
}
