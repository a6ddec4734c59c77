use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Content handed to or returned by a storage backend.
///
/// `Bytes` content is owned in memory; `File` content lives at a filesystem
/// path and is read on demand. Reference binaries always carry `File`
/// content pointing outside the managed store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPayload {
    Bytes(Bytes),
    File(PathBuf),
}

impl ContentPayload {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Bytes(data.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Filesystem location of the content, if it has one.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::Bytes(_) => None,
            Self::File(path) => Some(path),
        }
    }

    /// Open a fresh reader over the content.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Bytes(data) => Ok(Box::new(Cursor::new(data.clone()))),
            Self::File(path) => Ok(Box::new(File::open(path)?)),
        }
    }

    /// Read the whole content into memory.
    pub fn read_all(&self) -> io::Result<Bytes> {
        match self {
            Self::Bytes(data) => Ok(data.clone()),
            Self::File(path) => Ok(Bytes::from(std::fs::read(path)?)),
        }
    }

    /// Read the whole content as UTF-8 text.
    pub fn read_to_string(&self) -> io::Result<String> {
        let data = self.read_all()?;
        String::from_utf8(data.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Stream the content into `out`, returning the number of bytes copied.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<u64> {
        let mut reader = self.open()?;
        io::copy(&mut reader, out)
    }
}

impl From<&str> for ContentPayload {
    fn from(value: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for ContentPayload {
    fn from(value: String) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Vec<u8>> for ContentPayload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for ContentPayload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}
