//! Core types and shared functionality for dispatch.
//!
//! This crate provides:
//! - The tabular store contract with in-memory and SQLite implementations
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use store::{CellValue, MemoryStore, RangeSpec, SqliteStore, Table, TabularStore};
