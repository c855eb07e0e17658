//! Centralized error handling for iptv-ranker
//!
//! Errors are split by the layer that can produce them:
//!
//! - **Configuration / environment errors** abort a run before any probing starts.
//! - **Source errors** cover acquiring the raw playlist (HTTP fetch, cache file).
//! - **Probe errors** never abort anything; they are carried inside a failed
//!   [`ProbeOutcome`](crate::models::ProbeOutcome) for the entry they belong to.
//!
//! # Usage
//!
//! ```rust
//! use iptv_ranker::errors::{AppError, AppResult};
//!
//! fn check_workers(max_workers: usize) -> AppResult<usize> {
//!     if max_workers == 0 {
//!         return Err(AppError::configuration("max_workers must be at least 1"));
//!     }
//!     Ok(max_workers)
//! }
//! # assert!(check_workers(0).is_err());
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
