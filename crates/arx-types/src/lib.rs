//! Foundation types for arx.
//!
//! Every resource kept by an arx storage backend is addressed by a
//! [`StoragePath`]: a container name, an ordered list of directory segments
//! and a terminal resource name. Paths are immutable values; two paths are
//! equal iff their segments are equal.
//!
//! # Key Types
//!
//! - [`StoragePath`] -- Hierarchical resource address
//! - [`PathError`] -- Why a path or segment was rejected

pub mod error;
pub mod names;
pub mod path;

pub use error::PathError;
pub use names::{validate_container_name, validate_segment};
pub use path::StoragePath;
