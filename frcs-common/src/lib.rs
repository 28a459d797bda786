//! # FRCS Common Library
//!
//! Shared code for the FRC scouting services including:
//! - Field schema registry (the single definition of every scouted field)
//! - Observation records and their identity key
//! - QR payload codec
//! - Record store (SQLite) with the identity invariant enforced in the database
//! - Ingestion pipeline and conflict resolution engine
//! - Configuration loading

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use record::{Alliance, FieldMap, FieldValue, IdentityKey, ObservationRecord};
pub use schema::FieldSchema;
