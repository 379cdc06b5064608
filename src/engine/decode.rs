//! Incremental detokenization
//!
//! Decoding token ids one at a time breaks multi-byte characters and loses the
//! leading spaces of sentencepiece pieces. The decoder keeps a window of ids
//! and only releases text once it has grown by a complete piece.

use anyhow::{anyhow, Result};
use tokenizers::Tokenizer;

pub struct IncrementalDecoder {
    tokenizer: Tokenizer,
    tokens: Vec<u32>,
    prev_index: usize,
    current_index: usize,
}

impl IncrementalDecoder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            prev_index: 0,
            current_index: 0,
        }
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("decode failed: {}", e))
    }

    /// Push one id; returns the newly completed text, if any
    pub fn push(&mut self, token: u32) -> Result<Option<String>> {
        let prev_text = if self.tokens.is_empty() {
            String::new()
        } else {
            self.decode(&self.tokens[self.prev_index..self.current_index])?
        };
        self.tokens.push(token);
        let text = self.decode(&self.tokens[self.prev_index..])?;

        // A trailing replacement char means a multi-byte sequence is still open.
        if text.len() > prev_text.len() && !text.ends_with('\u{fffd}') {
            let (_, fresh) = text.split_at(prev_text.len());
            let fresh = fresh.to_string();
            self.prev_index = self.current_index;
            self.current_index = self.tokens.len();
            Ok(Some(fresh))
        } else {
            Ok(None)
        }
    }

    /// Flush whatever text is still held back
    pub fn finish(&self) -> Result<Option<String>> {
        let prev_text = if self.tokens.is_empty() {
            String::new()
        } else {
            self.decode(&self.tokens[self.prev_index..self.current_index])?
        };
        let text = self.decode(&self.tokens[self.prev_index..])?;
        if text.len() > prev_text.len() {
            Ok(Some(text.split_at(prev_text.len()).1.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Number of ids pushed so far
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
