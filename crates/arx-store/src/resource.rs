use std::collections::BTreeMap;

use arx_types::StoragePath;
use chrono::{DateTime, Utc};

use crate::digest;
use crate::payload::ContentPayload;

/// Top-level namespace. Never nested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub path: StoragePath,
}

impl Container {
    pub fn new(path: StoragePath) -> Self {
        Self { path }
    }
}

/// Named node holding sub-directories and binaries, no content of its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    pub path: StoragePath,
}

impl Directory {
    pub fn new(path: StoragePath) -> Self {
        Self { path }
    }
}

/// Leaf resource holding content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binary {
    pub path: StoragePath,
    pub content: ContentPayload,
    pub size_in_bytes: u64,
    /// Algorithm name to lowercase hex digest.
    pub content_digest: BTreeMap<String, String>,
    /// Content is owned outside the store and only linked.
    pub is_reference: bool,
}

impl Binary {
    /// Build a binary over in-memory content, computing size and digests.
    pub fn inline(path: StoragePath, data: bytes::Bytes) -> Self {
        let (size_in_bytes, content_digest) = digest::digest_bytes(&data);
        Self {
            path,
            content: ContentPayload::Bytes(data),
            size_in_bytes,
            content_digest,
            is_reference: false,
        }
    }

    /// Always `false`; lets callers holding a [`Resource`] tell kinds apart.
    pub fn is_directory(&self) -> bool {
        false
    }

    /// Recompute digests from the content and compare with the declared ones.
    pub fn verify_digests(&self) -> std::io::Result<bool> {
        let (size, digests) = digest::digest_reader(self.content.open()?)?;
        Ok(size == self.size_in_bytes && digests == self.content_digest)
    }
}

/// Immutable snapshot of a binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryVersion {
    pub id: String,
    pub message: Option<String>,
    pub created: DateTime<Utc>,
    /// The binary as it was when the snapshot was taken.
    pub binary: Binary,
}

/// Any resource reachable through a listing or [`get_resource`].
///
/// [`get_resource`]: crate::StorageService::get_resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Container(Container),
    Directory(Directory),
    Binary(Binary),
}

impl Resource {
    pub fn path(&self) -> &StoragePath {
        match self {
            Self::Container(c) => &c.path,
            Self::Directory(d) => &d.path,
            Self::Binary(b) => &b.path,
        }
    }

    /// `true` for containers and directories.
    pub fn is_directory(&self) -> bool {
        !matches!(self, Self::Binary(_))
    }

    /// Kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Container(_) => "container",
            Self::Directory(_) => "directory",
            Self::Binary(_) => "binary",
        }
    }

    pub fn into_binary(self) -> Option<Binary> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl From<Container> for Resource {
    fn from(value: Container) -> Self {
        Self::Container(value)
    }
}

impl From<Directory> for Resource {
    fn from(value: Directory) -> Self {
        Self::Directory(value)
    }
}

impl From<Binary> for Resource {
    fn from(value: Binary) -> Self {
        Self::Binary(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn inline_binary_carries_digests() {
        let binary = Binary::inline(path("aip/x/aip.json"), bytes::Bytes::from_static(b"{}"));
        assert_eq!(binary.size_in_bytes, 2);
        assert!(binary.content_digest.contains_key(digest::SHA256));
        assert!(!binary.is_directory());
        assert!(binary.verify_digests().unwrap());
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let mut binary = Binary::inline(path("aip/x/f"), bytes::Bytes::from_static(b"abc"));
        binary
            .content_digest
            .insert(digest::BLAKE3.to_string(), "00".into());
        assert!(!binary.verify_digests().unwrap());
    }

    #[test]
    fn resource_kind_accessors() {
        let dir: Resource = Directory::new(path("aip/x")).into();
        let container: Resource = Container::new(path("aip")).into();
        let bin: Resource = Binary::inline(path("aip/x/f"), bytes::Bytes::new()).into();

        assert!(dir.is_directory());
        assert!(container.is_directory());
        assert!(!bin.is_directory());
        assert_eq!(bin.kind_name(), "binary");
        assert_eq!(dir.path(), &path("aip/x"));
        assert!(dir.into_binary().is_none());
        assert!(bin.into_binary().is_some());
    }
}
