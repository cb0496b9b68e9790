//! Token estimates for messages, conversations and datasets.

use crate::conversation::Conversation;
use crate::dataset::Dataset;
use crate::message::Message;
use crate::{Tokenizer, MESSAGE_TOKEN_OVERHEAD};

impl Message {
    /// Content tokens plus the per-message overhead.
    pub fn tokens<T: Tokenizer + ?Sized>(&self, tokenizer: &T) -> usize {
        MESSAGE_TOKEN_OVERHEAD + tokenizer.count_tokens(self.content())
    }
}

impl Conversation {
    pub fn tokens<T: Tokenizer + ?Sized>(&self, tokenizer: &T) -> usize {
        self.messages().iter().map(|m| m.tokens(tokenizer)).sum()
    }
}

impl Dataset {
    pub fn tokens<T: Tokenizer + ?Sized>(&self, tokenizer: &T) -> usize {
        self.conversations().iter().map(|c| c.tokens(tokenizer)).sum()
    }
}

/// Training cost in dollars for `tokens` tokens over `epochs` epochs.
pub fn estimate_cost(tokens: usize, price_per_1k_tokens: f64, epochs: u32) -> f64 {
    tokens as f64 * (price_per_1k_tokens / 1000.0) * f64::from(epochs)
}
