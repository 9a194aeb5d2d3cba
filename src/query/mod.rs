//! Query execution.
//!
//! Isolates SQL execution from the orchestration in the question service.

pub mod executor;

pub use executor::QueryExecutor;
