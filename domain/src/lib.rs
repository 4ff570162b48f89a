//! Core batch transcription-processing pipeline.
//!
//! This crate re-exports the entity modules consumers need so that the `web`
//! layer does not have to depend on `entity_api` directly. The pipeline
//! itself is organized leaf-first: path resolution, remote fetch, audio
//! validation, transcription submit/poll, categorization, persistence,
//! missing-work discovery, and the batch orchestrator that drives them.
pub use entity_api::{call_logs, transcription_records, Id};

pub mod audio;
pub mod categorization;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod path_resolver;
pub mod persistence;
pub mod processing_lock;
pub mod transcription;
pub mod transcription_record;

pub mod gateway;
