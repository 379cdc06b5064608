//! Stub generator for running without model weights

use std::time::Duration;

use anyhow::Result;

use super::{cancelled, emit, TextGenerator, TokenCallback};

#[derive(Debug, Clone)]
enum Script {
    /// Repeat the prompt back, one word per token
    Echo,
    /// Emit a fixed token sequence regardless of the prompt
    Fixed(Vec<String>),
}

/// Deterministic generator used by `--stub` runs and tests
#[derive(Debug, Clone)]
pub struct StubGenerator {
    script: Script,
    delay: Duration,
}

impl StubGenerator {
    /// Echo the prompt word by word, pausing `delay` between tokens
    pub fn echo(delay: Duration) -> Self {
        tracing::info!("Creating stub generator (echo mode)");
        Self {
            script: Script::Echo,
            delay,
        }
    }

    /// Emit exactly `tokens`, without delay
    pub fn scripted<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::Fixed(tokens.into_iter().map(Into::into).collect()),
            delay: Duration::ZERO,
        }
    }

    /// Pause between tokens
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl TextGenerator for StubGenerator {
    fn generate(&self, prompt: &str, callbacks: &[&dyn TokenCallback]) -> Result<()> {
        let tokens = match &self.script {
            Script::Echo => split_words(prompt),
            Script::Fixed(tokens) => tokens.clone(),
        };

        for token in tokens {
            if cancelled(callbacks) {
                break;
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            emit(callbacks, &token);
        }

        Ok(())
    }
}

/// Split text into word tokens that carry their leading whitespace, the way
/// subword tokenizers usually do, so concatenating them restores the input.
fn split_words(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_whitespace() && !current.trim().is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
