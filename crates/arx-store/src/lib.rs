//! Versioned hierarchical storage for arx.
//!
//! An archive is stored as containers holding directories and binaries,
//! all addressed by [`StoragePath`]. Binaries carry digests and an ordered
//! history of [`BinaryVersion`] snapshots that can be listed, fetched,
//! reverted to and deleted.
//!
//! # Backends
//!
//! All backends implement the [`StorageService`] trait:
//!
//! - [`InMemoryStorage`] -- ordered-map store for tests and embedding
//! - [`FileSystemStorage`] -- one directory tree per store, atomic writes
//!
//! Copy and move work across any two services, including different
//! backends; see [`transfer`].
//!
//! # Design Rules
//!
//! 1. Kind-checked access distinguishes absent, wrong kind and present.
//! 2. Creating over an existing resource fails; nothing is overwritten
//!    implicitly.
//! 3. Deletes are recursive and take version history with them.
//! 4. Listings are lazy and release backend handles on close, exhaustion
//!    or drop.
//! 5. Every failure is classified into [`StorageError`].

pub mod digest;
pub mod error;
pub mod fs;
pub mod listing;
pub mod memory;
pub mod payload;
pub mod resource;
pub mod traits;
pub mod transfer;

#[cfg(test)]
mod conformance;

pub use arx_types::StoragePath;
pub use error::{StorageError, StorageErrorKind, StorageResult};
pub use fs::FileSystemStorage;
pub use listing::{ContainerListing, Listing, ResourceListing, VersionListing};
pub use memory::InMemoryStorage;
pub use payload::ContentPayload;
pub use resource::{Binary, BinaryVersion, Container, Directory, Resource};
pub use traits::StorageService;
