//! Tokenrelay - streaming task server for LLM code generation
//!
//! Tokenrelay accepts a natural-language description, starts generating code
//! for it in the background, and relays the generated tokens to the client as
//! server-sent events.
//!
//! # Architecture
//!
//! - **engine**: the [`engine::TextGenerator`] seam, a candle GGUF backend and a stub
//! - **tasks**: task registry, per-task token buffers, background workers
//! - **server**: axum routes and the SSE relay
//! - **cli**: `serve`, `generate` and `pull` commands
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! tokenrelay serve --port 5000
//!
//! # Submit a task and stream it
//! curl -s -X POST localhost:5000/generate -H 'content-type: application/json' \
//!      -d '{"description": "reverse a linked list"}'
//! curl -N localhost:5000/stream/<task_id>
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod server;
pub mod tasks;

// Re-export key types
pub use config::{GenerationConfig, ModelConfig, RelayConfig, ServerConfig, TaskConfig};
pub use engine::{build_generator, GgufGenerator, StubGenerator, TextGenerator, TokenCallback};
pub use server::AppState;
pub use tasks::{TaskId, TaskRegistry, TaskStatus, TokenBuffer};
