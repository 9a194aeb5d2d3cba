//! klustercost-ask - natural-language questions over a Kubernetes cost database.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod query;
pub mod repl;
pub mod safety;
pub mod service;
pub mod tools;
