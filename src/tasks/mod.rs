//! Task/stream decoupling
//!
//! A generation request registers a [`TokenBuffer`] under a fresh [`TaskId`]
//! and runs the generator in the background; the stream endpoint later drains
//! that buffer by identifier.

mod buffer;
mod registry;
mod worker;

pub use buffer::{Drained, StatusKind, TaskStatus, TokenBuffer};
pub use registry::{TaskEntry, TaskId, TaskRegistry, TaskSnapshot};
pub use worker::spawn_generation;
