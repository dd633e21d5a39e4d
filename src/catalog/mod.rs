//! Schema catalog: tables, views, and enum types as loaded from the database

pub mod loader;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod builder;

pub use types::*;
