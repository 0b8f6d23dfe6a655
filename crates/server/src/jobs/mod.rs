// crates/server/src/jobs/mod.rs
//! Background job system for long-running async tasks.
//!
//! Provides:
//! - `JobStore` — record store with per-job transition fan-out
//! - `JobRunner` — spawns and tracks the work behind a record
//! - `JobContext` — progress/cancellation handle given to the work

pub mod runner;
pub mod store;

pub use runner::{JobContext, JobRunner};
pub use store::JobStore;
