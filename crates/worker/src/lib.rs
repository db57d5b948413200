//! `conveyor-worker` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod executor;
pub mod pipeline;
pub mod run;
pub mod sweep;
