//! Rolldown plugin wiring for the worker build.
//!
//! - [`worker_loader`]: the `Plugin` implementation handed to Rolldown
//! - [`define`]: compile-time constant substitution used by its `transform` hook

pub mod define;
pub mod worker_loader;

pub use worker_loader::{WorkerLoader, WorkerLoaderConfig};
