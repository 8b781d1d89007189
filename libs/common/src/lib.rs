//! Common library for the family album ingestion services
//!
//! This crate provides shared functionality used across the ingestion
//! workers: PostgreSQL connectivity, pool configuration and the shared
//! database error type.

pub mod database;
pub mod error;
