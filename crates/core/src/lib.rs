//! Core codec for conversational fine-tuning data.
//!
//! This crate converts between human-editable plain-text transcripts and
//! role-tagged messages, and stores collections of conversations as JSONL
//! records of the form `{"messages": [...]}`.
//!
//! A transcript is a sequence of messages, each introduced by a blank line
//! and a label:
//!
//! ```text
//!
//!
//! system: You are a language model.
//!
//! user: Hi, who are you?
//! ```
//!
//! Message bodies that contain something looking like a label are escaped
//! so every transcript decodes back to exactly the messages it was built
//! from.

/// Trait for tokenization operations.
///
/// For exact counts, wrap a real tokenizer.
/// For quick estimates, use [`CharApproxTokenizer`].
pub trait Tokenizer {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;
}

// Blanket implementation for references to Tokenizers
impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn count_tokens(&self, text: &str) -> usize {
        (*self).count_tokens(text)
    }
}

/// Character-based approximation (~4 bytes per token).
#[derive(Debug, Clone, Copy, Default)]
pub struct CharApproxTokenizer;

impl Tokenizer for CharApproxTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}

mod conversation;
mod dataset;
mod error;
mod escape;
mod message;
pub mod pipeline;
mod role;
mod tokens;

pub use conversation::{base_template_path, Conversation, TranscriptConfig};
pub use dataset::Dataset;
pub use error::{CodecError, Result};
pub use message::Message;
pub use pipeline::{
    build_datasets, discover_transcripts, load_transcripts, split_key, write_datasets,
    DatasetSplit, PipelineConfig, PipelineResult,
};
pub use role::{BoundaryScanner, Role, RoleSet, LABEL_SEPARATOR, MESSAGE_MARKER};
pub use tokens::estimate_cost;

/// File name of the base template whose system message sibling
/// transcripts inherit.
pub const BASE_TEMPLATE_NAME: &str = "base.txt";

/// Special tokens every message adds on top of its content.
pub const MESSAGE_TOKEN_OVERHEAD: usize = 2;

/// Default training price in dollars per 1000 tokens.
pub const DEFAULT_PRICE_PER_1K_TOKENS: f64 = 0.008;

/// Default number of training epochs used for cost estimates.
pub const DEFAULT_EPOCHS: u32 = 3;
