//! Pipeline for turning directories of transcripts into train/eval datasets.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::conversation::{Conversation, TranscriptConfig};
use crate::dataset::Dataset;
use crate::error::{CodecError, Result};

/// Configuration for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub transcript: TranscriptConfig,
    /// Conversations whose split key is at or below this value go to the
    /// eval set. `0.0` sends (almost) everything to training.
    pub eval_fraction: f64,
}

/// Train and eval datasets produced by [`build_datasets`].
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Dataset,
    pub eval: Dataset,
}

/// Result of writing a split to disk.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub train_conversations: usize,
    pub eval_conversations: usize,
    pub total_messages: usize,
    pub train_path: PathBuf,
    pub eval_path: Option<PathBuf>,
}

/// Discover all transcripts under a directory, skipping base templates.
pub fn discover_transcripts(root: &Path, base_template_name: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name() != base_template_name)
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Load transcripts in parallel, keeping the order of `paths`.
///
/// Any failing file fails the whole batch; the error reported is the one
/// of the earliest failing path in `paths`.
pub fn load_transcripts(
    paths: &[PathBuf],
    config: &TranscriptConfig,
) -> Result<Vec<(PathBuf, Conversation)>> {
    let loaded: Vec<Result<(PathBuf, Conversation)>> = paths
        .par_iter()
        .map(|path| -> Result<(PathBuf, Conversation)> {
            let conversation = Conversation::load_with(path, config)?;
            Ok((path.clone(), conversation))
        })
        .collect();
    loaded.into_iter().collect()
}

/// Deterministic value in `[0, 1)` derived from the file name of `path`.
///
/// The first four hex digits of the SHA-256 of the file name, divided by
/// 16^4. Only the name counts, so a transcript keeps its split when the
/// directory layout or the set of sources changes.
pub fn split_key(path: &Path) -> f64 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = Sha256::digest(name.as_bytes());
    f64::from(u16::from_be_bytes([digest[0], digest[1]])) / 65536.0
}

/// Collect every transcript under `roots` and split them into train and eval.
pub fn build_datasets(roots: &[PathBuf], config: &PipelineConfig) -> Result<DatasetSplit> {
    let mut paths = Vec::new();
    for root in roots {
        let found = discover_transcripts(root, &config.transcript.base_template_name);
        if found.is_empty() {
            return Err(CodecError::NoTranscripts { root: root.clone() });
        }
        info!(root = %root.display(), count = found.len(), "discovered transcripts");
        paths.extend(found);
    }

    let mut split = DatasetSplit::default();
    for (path, conversation) in load_transcripts(&paths, &config.transcript)? {
        let key = split_key(&path);
        debug!(path = %path.display(), key, "assigning split");
        if key > config.eval_fraction {
            split.train.push(conversation);
        } else {
            split.eval.push(conversation);
        }
    }
    Ok(split)
}

/// Write `<name>.train.jsonl` and, when non-empty, `<name>.eval.jsonl`.
pub fn write_datasets(split: &DatasetSplit, output_dir: &Path, name: &str) -> Result<PipelineResult> {
    let train_path = output_dir.join(format!("{name}.train.jsonl"));
    split.train.save(&train_path)?;

    let eval_path = if split.eval.is_empty() {
        None
    } else {
        let path = output_dir.join(format!("{name}.eval.jsonl"));
        split.eval.save(&path)?;
        Some(path)
    };

    info!(
        train = split.train.len(),
        eval = split.eval.len(),
        "wrote datasets"
    );

    Ok(PipelineResult {
        train_conversations: split.train.len(),
        eval_conversations: split.eval.len(),
        total_messages: split.train.message_count() + split.eval.message_count(),
        train_path,
        eval_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_discover_transcripts_skips_base() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("b.txt"), "\n\nuser: b");
        write(&temp.path().join("sub/a.txt"), "\n\nuser: a");
        write(&temp.path().join("sub/base.txt"), "\n\nsystem: s");

        let files = discover_transcripts(temp.path(), "base.txt");
        assert_eq!(files, vec![temp.path().join("b.txt"), temp.path().join("sub/a.txt")]);
    }

    #[test]
    fn test_split_key_depends_only_on_file_name() {
        let key = split_key(Path::new("conversations/a/hello.txt"));
        assert_eq!(key, split_key(Path::new("elsewhere/hello.txt")));
        assert!((0.0..1.0).contains(&key));
        assert_ne!(key, split_key(Path::new("conversations/a/other.txt")));
    }

    #[test]
    fn test_split_key_matches_sha256_prefix() {
        // sha256("abc") = ba7816bf...
        let expected = f64::from(0xba78u16) / 65536.0;
        assert_eq!(split_key(Path::new("abc")), expected);
    }

    #[test]
    fn test_build_and_write_datasets() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("conversations/greetings");
        write(&root.join("base.txt"), "\n\nsystem: Be friendly.");
        for i in 0..6 {
            write(&root.join(format!("convo{i}.txt")), "\n\nuser: Hi\n\nassistant: Hello!");
        }

        let config = PipelineConfig {
            eval_fraction: 0.5,
            ..Default::default()
        };
        let split = build_datasets(&[root.clone()], &config).unwrap();
        assert_eq!(split.train.len() + split.eval.len(), 6);
        for conversation in split.train.conversations().iter().chain(split.eval.conversations()) {
            assert_eq!(conversation.messages()[0], Message::system("Be friendly."));
        }

        let expected_eval = discover_transcripts(&root, "base.txt")
            .iter()
            .filter(|p| split_key(p) <= 0.5)
            .count();
        assert_eq!(split.eval.len(), expected_eval);

        let out = temp.path().join("datasets");
        let result = write_datasets(&split, &out, "greetings").unwrap();
        assert_eq!(result.total_messages, 18);
        assert_eq!(Dataset::load(&result.train_path).unwrap(), split.train);
        assert_eq!(result.eval_path.is_some(), !split.eval.is_empty());
    }

    #[test]
    fn test_empty_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = build_datasets(&[temp.path().to_path_buf()], &PipelineConfig::default());
        assert!(matches!(result, Err(CodecError::NoTranscripts { .. })));
    }

    #[test]
    fn test_malformed_transcript_fails_batch() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("good.txt"), "\n\nuser: fine");
        write(&temp.path().join("bad.txt"), "no marker here");
        let paths = discover_transcripts(temp.path(), "base.txt");
        let result = load_transcripts(&paths, &TranscriptConfig::default());
        assert!(matches!(result, Err(CodecError::MalformedSpan { .. })));
    }

    #[test]
    fn test_earliest_failing_transcript_is_reported() {
        let temp = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..32 {
            let path = temp.path().join(format!("bad{i:02}.txt"));
            write(&path, &format!("broken {i}"));
            paths.push(path);
        }
        match load_transcripts(&paths, &TranscriptConfig::default()) {
            Err(CodecError::MalformedSpan { span }) => assert_eq!(span, "broken 0"),
            other => panic!("expected malformed span, got {other:?}"),
        }
    }
}
