//! Inference engine seam
//!
//! The server only needs one thing from a model: run a prompt and report each
//! token as it is produced. [`TextGenerator`] captures that contract;
//! [`TokenCallback`] is the per-token sink.
//!
//! - [`GgufGenerator`]: quantized GGUF weights executed with candle
//! - [`StubGenerator`]: echo/scripted output for running without weights

mod decode;
mod gguf;
mod hub;
mod stub;

pub use decode::IncrementalDecoder;
pub use gguf::GgufGenerator;
pub use hub::{fetch_model_files, ModelFiles};
pub use stub::StubGenerator;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::{Backend, RelayConfig};

/// Receives tokens from a running generation
pub trait TokenCallback: Send + Sync {
    /// Called once per generated token, in order
    fn on_new_token(&self, token: &str);

    /// Generators poll this between tokens and stop early when it is true
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A synchronous text generator.
///
/// `generate` blocks until generation is complete, calling every callback for
/// each token. Run it on a blocking thread.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, callbacks: &[&dyn TokenCallback]) -> Result<()>;
}

/// Deliver a token to every callback
pub(crate) fn emit(callbacks: &[&dyn TokenCallback], token: &str) {
    for callback in callbacks {
        callback.on_new_token(token);
    }
}

/// True if any callback asked generation to stop
pub(crate) fn cancelled(callbacks: &[&dyn TokenCallback]) -> bool {
    callbacks.iter().any(|callback| callback.is_cancelled())
}

/// Build the generator selected by the configuration.
///
/// For the GGUF backend this resolves (and if needed downloads) the weights and
/// tokenizer, then loads the model. Blocking; call before starting the runtime
/// work that depends on it or from `spawn_blocking`.
pub fn build_generator(config: &RelayConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.model.backend {
        Backend::Stub => {
            tracing::info!("Using stub generator (no model loaded)");
            Ok(Arc::new(StubGenerator::echo(Duration::from_millis(
                config.generation.stub_delay_ms,
            ))))
        }
        Backend::Gguf => {
            let files = fetch_model_files(&config.model)?;
            let generator = GgufGenerator::load(&files, &config.model, config.generation.clone())?;
            Ok(Arc::new(generator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        tokens: Mutex<Vec<String>>,
        stop: AtomicBool,
    }

    impl TokenCallback for Collect {
        fn on_new_token(&self, token: &str) {
            self.tokens.lock().unwrap().push(token.to_string());
        }

        fn is_cancelled(&self) -> bool {
            self.stop.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_emit_reaches_every_callback() {
        let a = Collect::default();
        let b = Collect::default();
        emit(&[&a, &b], "tok");
        assert_eq!(*a.tokens.lock().unwrap(), vec!["tok"]);
        assert_eq!(*b.tokens.lock().unwrap(), vec!["tok"]);
    }

    #[test]
    fn test_cancelled_if_any() {
        let a = Collect::default();
        let b = Collect::default();
        assert!(!cancelled(&[&a, &b]));
        b.stop.store(true, Ordering::SeqCst);
        assert!(cancelled(&[&a, &b]));
    }

    #[test]
    fn test_build_stub_generator() {
        let mut config = RelayConfig::default();
        config.model.backend = Backend::Stub;
        config.generation.stub_delay_ms = 0;

        let generator = build_generator(&config).unwrap();
        let sink = Collect::default();
        generator.generate("one two", &[&sink]).unwrap();
        assert_eq!(sink.tokens.lock().unwrap().concat(), "one two");
    }
}
