//! Content digests attached to every binary.
//!
//! Binaries carry a map of algorithm name to lowercase hex digest. Both
//! backends compute the same set, so a copy between backends can be checked
//! by comparing the maps.

use std::collections::BTreeMap;
use std::io::{self, Read};

use sha2::{Digest, Sha256};

/// Algorithm name for BLAKE3.
pub const BLAKE3: &str = "blake3";
/// Algorithm name for SHA-256.
pub const SHA256: &str = "sha-256";

/// Streaming digester computing every supported algorithm in one pass.
pub struct ContentDigester {
    blake3: blake3::Hasher,
    sha256: Sha256,
    size: u64,
}

impl ContentDigester {
    pub fn new() -> Self {
        Self {
            blake3: blake3::Hasher::new(),
            sha256: Sha256::new(),
            size: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.blake3.update(data);
        self.sha256.update(data);
        self.size += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Finish and return `(size, digests)`.
    pub fn finish(self) -> (u64, BTreeMap<String, String>) {
        let mut digests = BTreeMap::new();
        digests.insert(BLAKE3.to_string(), self.blake3.finalize().to_hex().to_string());
        digests.insert(SHA256.to_string(), hex::encode(self.sha256.finalize()));
        (self.size, digests)
    }
}

impl Default for ContentDigester {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> (u64, BTreeMap<String, String>) {
    let mut digester = ContentDigester::new();
    digester.update(data);
    digester.finish()
}

/// Digest everything a reader yields.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<(u64, BTreeMap<String, String>)> {
    let mut digester = ContentDigester::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        digester.update(&buf[..n]);
    }
    Ok(digester.finish())
}
