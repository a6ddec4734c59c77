//! Archival domain model for arx.
//!
//! Maps Archival Information Packages (AIPs), their representations, files
//! and metadata onto a [`StorageService`], keeps each AIP's `aip.json`
//! envelope consistent with what is stored, and publishes a [`ModelEvent`]
//! after every change so indexers can follow along.
//!
//! # Key Types
//!
//! - [`ModelService`] -- every archival operation
//! - [`Aip`], [`Representation`], [`DescriptiveMetadata`] -- envelope contents
//! - [`PreservationMetadata`], [`OtherMetadata`], [`File`] -- stored artifacts
//! - [`NotificationBus`], [`ModelObserver`] -- change subscriptions
//! - [`UserDirectory`] -- identity capability the service forwards to
//! - [`ModelError`] -- the storage taxonomy plus validation and identity
//!   outcomes
//!
//! # Design Rules
//!
//! 1. Paths are derived from scope only; see [`paths`].
//! 2. The envelope's `id` is never trusted; it is the directory name.
//! 3. Envelope read-modify-write cycles are serialized per AIP.
//! 4. Best-effort bookkeeping (jobs, log archival, topology, observers)
//!    logs its failures instead of raising them.
//!
//! [`StorageService`]: arx_store::StorageService

pub mod action_log;
pub mod aip;
pub mod config;
pub mod error;
pub mod file;
pub mod identity;
pub mod job;
pub mod locks;
pub mod log_entry;
pub mod metadata;
pub mod notify;
pub mod parse;
pub mod paths;
pub mod service;
pub mod user;
pub mod validation;

pub use action_log::ActionLog;
pub use aip::{Aip, AipPermissions, DescriptiveMetadata, Permission, Representation};
pub use config::ModelConfig;
pub use error::{ModelError, ModelResult};
pub use file::File;
pub use identity::{DirectoryError, InMemoryUserDirectory, UserDirectory};
pub use job::{Job, JobReport, JobState};
pub use log_entry::{LogEntry, LogEntryParameter};
pub use metadata::{OtherMetadata, PreservationMetadata, PreservationMetadataType};
pub use notify::{EventRecorder, ModelEvent, ModelObserver, NotificationBus, PublishReport};
pub use service::{ModelService, TopologyReport};
pub use user::{Group, User};
pub use validation::{
    DescriptiveMetadataValidator, JsonDocumentSchema, MetadataSchema, SchemaRegistry, ValidationIssue,
    ValidationReport,
};
