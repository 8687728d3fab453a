//! Token accounting.

use serde::{Deserialize, Serialize};

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Character-class heuristic; no tokenizer tables needed.
///
/// Counts approximate what a `cl100k_base` BPE tokenizer would report and
/// are not exact.
///
/// Short words count as one token, longer ones roughly one per four
/// characters. Digits go in groups of three, every ASCII symbol is its own
/// token and non-ASCII text costs about one token per three bytes.
/// Whitespace is folded into the following token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c.is_whitespace() {
                continue;
            }
            if c.is_ascii_alphabetic() || c == '_' {
                let mut len: usize = 1;
                while chars
                    .next_if(|n| n.is_ascii_alphanumeric() || *n == '_')
                    .is_some()
                {
                    len += 1;
                }
                tokens += if len <= 6 { 1 } else { len.div_ceil(4) };
            } else if c.is_ascii_digit() {
                let mut len: usize = 1;
                while chars.next_if(|n| n.is_ascii_digit()).is_some() {
                    len += 1;
                }
                tokens += len.div_ceil(3);
            } else if c.is_ascii() {
                tokens += 1;
            } else {
                let mut bytes = c.len_utf8();
                while let Some(n) = chars.next_if(|n| !n.is_ascii()) {
                    bytes += n.len_utf8();
                }
                tokens += bytes.div_ceil(3);
            }
        }
        tokens
    }
}

/// Token usage accumulated over one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model, summed over every call of the turn.
    pub prompt: usize,
    /// Tokens in the model's replies.
    pub completion: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.prompt + self.completion
    }
}
