//! Content ingestion pipeline for shared family albums.
//!
//! Uploaded objects pass through two independently triggered stages: the
//! [`verifier::ContentVerifier`] checks the real file type of a raw upload
//! and promotes it to the verified namespace, and the
//! [`processor::ContentProcessor`] extracts metadata and writes a thumbnail.
//! After every terminal item outcome the [`completion::CompletionAggregator`]
//! decides whether the parent upload batch is done.

pub mod completion;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod handler;
pub mod heif;
pub mod metadata_extractor;
pub mod models;
pub mod object_key;
pub mod object_store;
pub mod processor;
pub mod queue;
pub mod sniff;
pub mod sqs_poller;
pub mod thumbnail_generator;
pub mod verifier;
