//! One-shot generation command

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::load_config;
use crate::engine::{build_generator, TokenCallback};

/// Writes each token as soon as it arrives.
///
/// A failed write (closed pipe) stops generation through `is_cancelled`.
struct WriterCallback<W> {
    out: Mutex<W>,
    failed: AtomicBool,
}

impl<W: Write> WriterCallback<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            failed: AtomicBool::new(false),
        }
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn write_str(&self, text: &str) {
        if self.failed() {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = out.write_all(text.as_bytes()).and_then(|_| out.flush());
        if let Err(e) = result {
            tracing::warn!("Output closed, stopping generation: {}", e);
            self.failed.store(true, Ordering::SeqCst);
        }
    }
}

impl<W: Write + Send> TokenCallback for WriterCallback<W> {
    fn on_new_token(&self, token: &str) {
        self.write_str(token);
    }

    fn is_cancelled(&self) -> bool {
        self.failed()
    }
}

/// Generate code for one description and print it
pub async fn generate(config_path: Option<PathBuf>, description: String, stub: bool) -> Result<()> {
    let config = load_config(config_path.as_deref(), stub)?;
    let prompt = config.model.render_prompt(&description);

    tokio::task::spawn_blocking(move || -> Result<()> {
        let generator = build_generator(&config)?;
        let stdout = WriterCallback::new(std::io::stdout());
        let callbacks: [&dyn TokenCallback; 1] = [&stdout];
        generator.generate(&prompt, &callbacks)?;
        stdout.write_str("\n");
        Ok(())
    })
    .await
    .context("generation task failed")??;

    Ok(())
}
