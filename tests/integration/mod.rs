//! Integration tests for klustercost-ask.
//!
//! Everything runs against mock collaborators except `postgres_test`, which
//! needs a running PostgreSQL server named by DATABASE_URL.

pub mod catalog_test;
pub mod common;
pub mod pipeline_test;
pub mod postgres_test;
pub mod tools_test;
