// Document loading and selection
// Turns files on disk into documents and user input into a file selection


use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, warn};

use crate::{LogQaError, Result};

/// Number of leading bytes inspected when guessing whether a file is text
const SNIFF_BYTES: usize = 1024;

/// Raw text of one file, loaded once and dropped after chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub path: PathBuf,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(source_id: impl Into<String>, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            path: path.into(),
            text: text.into(),
        }
    }

    /// Read a file, replacing malformed UTF-8 instead of failing
    #[inline]
    pub async fn load(path: &Path) -> Result<Self> {
        let source_id = source_id_from_path(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            LogQaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "{} is not valid UTF-8, replacing malformed bytes",
                    path.display()
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        debug!("Loaded {} ({} bytes) as '{}'", path.display(), text.len(), source_id);
        Ok(Self::new(source_id, path, text))
    }
}

/// Derive a source id from a file name
///
/// `app.log` becomes `app_log`. Anything outside `[A-Za-z0-9_-]` maps to `_`
/// so the id is safe inside record ids, filters and directory names.
#[inline]
pub fn source_id_from_path(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            LogQaError::Selection(format!("{} does not name a file", path.display()))
        })?;

    Ok(name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect())
}

/// List files in `dir` that can be indexed, sorted by file name
///
/// With a non-empty `extensions` list only matching files are returned
/// (case-insensitive). With an empty list, any file whose first KiB decodes
/// as UTF-8 qualifies.
#[inline]
pub fn list_documents(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        LogQaError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to list {}: {}", dir.display(), e),
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let accepted = if extensions.is_empty() {
            looks_like_text(&path)
        } else {
            has_extension(&path, extensions)
        };

        if accepted {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} indexable files in {}", files.len(), dir.display());
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
}

fn looks_like_text(path: &Path) -> bool {
    let mut buffer = [0_u8; SNIFF_BYTES];
    let read = fs::File::open(path).and_then(|mut file| file.read(&mut buffer));

    match read {
        Ok(n) => buffer.get(..n).is_some_and(|head| match std::str::from_utf8(head) {
            Ok(_) => true,
            // A multi-byte character cut off by the sniff window is still text
            Err(e) => e.error_len().is_none(),
        }),
        Err(e) => {
            debug!("Skipping unreadable file {}: {}", path.display(), e);
            false
        }
    }
}

/// Parse a comma-separated list of 1-based file numbers
///
/// Out-of-range numbers are ignored and duplicates collapse to their first
/// occurrence. Returns zero-based indices.
///
/// # Errors
/// `Selection` when an entry is not a number or nothing valid was selected.
#[inline]
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>> {
    let mut selected = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let number: usize = part
            .parse()
            .map_err(|_| LogQaError::Selection(format!("'{}' is not a file number", part)))?;

        if (1..=count).contains(&number) {
            selected.push(number - 1);
        } else {
            debug!("Ignoring out-of-range selection {}", number);
        }
    }

    let selected: Vec<usize> = selected.into_iter().unique().collect();
    if selected.is_empty() {
        return Err(LogQaError::Selection(format!(
            "no valid files selected from '{}' (choose 1 to {})",
            input.trim(),
            count
        )));
    }

    Ok(selected)
}

/// Whether a line of user input ends the session
#[inline]
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
