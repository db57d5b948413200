//! `conveyor-core` -- domain types for the upload-processing job queue.
//!
//! Shared by the store and the worker. Carries no database dependency;
//! everything here is pure types, constants, and validation.

pub mod error;
pub mod ids;
pub mod queue;
pub mod status;
pub mod types;
