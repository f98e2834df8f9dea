use std::path::PathBuf;

use super::*;

fn document(source_id: &str, text: &str) -> Document {
    Document {
        source_id: source_id.to_string(),
        path: PathBuf::from(format!("/tmp/{}", source_id)),
        text: text.to_string(),
    }
}

fn expected_count(len: usize, window: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else {
        len.saturating_sub(overlap).div_ceil(window - overlap).max(1)
    }
}

#[test]
fn empty_text_produces_no_chunks() {
    let chunks = split("", 10, 2).expect("split should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn overlap_not_smaller_than_window_is_rejected() {
    assert!(matches!(
        split("some text", 5, 5),
        Err(LogQaError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        split("some text", 5, 9),
        Err(LogQaError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        split("some text", 0, 0),
        Err(LogQaError::InvalidConfiguration(_))
    ));
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = split("abc", 10, 3).expect("split should succeed");
    assert_eq!(chunks, vec!["abc".to_string()]);

    // Shorter than the overlap still yields one chunk
    let chunks = split("ab", 5, 3).expect("split should succeed");
    assert_eq!(chunks, vec!["ab".to_string()]);
}

#[test]
fn windows_advance_by_stride() {
    let chunks = split("abcdefghij", 4, 1).expect("split should succeed");
    assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
}

#[test]
fn final_chunk_may_be_shorter() {
    let chunks = split("abcdefghijk", 4, 1).expect("split should succeed");
    assert_eq!(chunks, vec!["abcd", "defg", "ghij", "jk"]);
}

#[test]
fn zero_overlap_partitions_text() {
    let text = "0123456789abcdef";
    let chunks = split(text, 5, 0).expect("split should succeed");
    assert_eq!(chunks.concat(), text);
    assert_eq!(chunks.len(), 4);
}

#[test]
fn chunk_count_matches_formula() {
    let text = "x".repeat(137);
    for window in 1..30 {
        for overlap in 0..window {
            for len in [1, 2, 7, 29, 30, 31, 100, 137] {
                let slice = text.get(..len).expect("ascii slice");
                let chunks = split(slice, window, overlap).expect("split should succeed");
                assert_eq!(
                    chunks.len(),
                    expected_count(len, window, overlap),
                    "len={} window={} overlap={}",
                    len,
                    window,
                    overlap
                );
            }
        }
    }
}

#[test]
fn chunks_cover_every_character() {
    let text = "ERROR db timeout at 10:02\nOK request served at 10:03";
    for (window, overlap) in [(20, 5), (7, 3), (3, 0), (52, 10), (100, 99)] {
        let chunks = split(text, window, overlap).expect("split should succeed");
        let stride = window - overlap;
        let chars: Vec<char> = text.chars().collect();
        let mut covered = vec![false; chars.len()];

        for (i, chunk) in chunks.iter().enumerate() {
            let start = i * stride;
            let expected: String = chars.iter().skip(start).take(window).collect();
            assert_eq!(chunk, &expected);
            for flag in covered.iter_mut().skip(start).take(chunk.chars().count()) {
                *flag = true;
            }
        }

        assert!(covered.iter().all(|c| *c), "gap for {}/{}", window, overlap);
    }
}

#[test]
fn multibyte_text_splits_on_characters() {
    let text = "héllo wörld ünïcode ✓✓✓";
    let chunks = split(text, 6, 2).expect("split should succeed");
    assert!(chunks.iter().all(|c| c.chars().count() <= 6));
    assert_eq!(chunks.first().map(String::as_str), Some("héllo "));
    assert!(chunks.last().is_some_and(|c| c.ends_with('✓')));
}

#[test]
fn split_is_deterministic() {
    let text = "line one\nline two\nline three\n".repeat(20);
    let first = split(&text, 50, 10).expect("split should succeed");
    let second = split(&text, 50, 10).expect("split should succeed");
    assert_eq!(first, second);
}

#[test]
fn chunk_document_sequences_chunks() {
    let doc = document("app_log", "ERROR db timeout at 10:02\nOK request served at 10:03");
    let config = ChunkingConfig {
        window: 20,
        overlap: 5,
    };

    let chunks = chunk_document(&doc, &config).expect("chunking should succeed");

    assert_eq!(chunks.len(), 4);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.source_id, "app_log");
        assert_eq!(chunk.sequence_index, i as u32);
    }
    assert_eq!(chunks[0].text, "ERROR db timeout at ");
    assert_eq!(chunks[0].record_id(), "app_log_chunk_0");
}

#[test]
fn chunk_document_reports_source_on_bad_config() {
    let doc = document("broken_log", "text");
    let config = ChunkingConfig {
        window: 10,
        overlap: 10,
    };

    let err = chunk_document(&doc, &config).expect_err("overlap == window must fail");
    assert!(err.to_string().contains("broken_log"));
}

#[test]
fn default_config_uses_standard_window() {
    let config = ChunkingConfig::default();
    assert_eq!(config.window, 500);
    assert_eq!(config.overlap, 50);
    assert_eq!(config.stride(), 450);
    assert!(config.validate().is_ok());
}
