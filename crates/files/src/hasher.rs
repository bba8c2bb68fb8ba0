//! Streaming content digests.
//!
//! Every stored file carries two digests: MD5, which names the file on disk, and
//! SHA-256, which is kept for integrity verification. Both are computed in a single
//! pass over the bytes in bounded chunks.

use crate::constants::DEFAULT_CHUNK_SIZE;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Digest pair of one byte sequence, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentDigests {
    /// MD5 of the content (32 hex characters); names the stored file
    pub md5: String,
    /// SHA-256 of the content (64 hex characters); used for integrity checks
    pub sha256: String,
}

/// Incremental hasher feeding both digests from the same chunks.
#[derive(Clone, Default)]
pub struct ContentHasher {
    md5: Md5,
    sha256: Sha256,
    bytes: u64,
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        self.sha256.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> ContentDigests {
        ContentDigests {
            md5: hex::encode(self.md5.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
        }
    }
}

/// Hashes a reader to completion using the default chunk size.
pub fn hash_reader<R: Read>(reader: R) -> io::Result<(ContentDigests, u64)> {
    hash_reader_with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
}

/// Hashes a reader to completion, never holding more than `chunk_size` bytes.
///
/// Returns the digests and the number of bytes consumed.
pub fn hash_reader_with_chunk_size<R: Read>(
    mut reader: R,
    chunk_size: usize,
) -> io::Result<(ContentDigests, u64)> {
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    let bytes = hasher.bytes();
    Ok((hasher.finalize(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        let (digests, len) = hash_reader(&b"hello"[..]).unwrap();
        assert_eq!(len, 5);
        assert_eq!(digests.md5, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(
            digests.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn empty_input_has_well_defined_digests() {
        let (digests, len) = hash_reader(std::io::empty()).unwrap();
        assert_eq!(len, 0);
        assert_eq!(digests.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn digests_do_not_depend_on_chunk_size() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let (reference, _) = hash_reader(&data[..]).unwrap();

        for chunk_size in [1, 7, 64, 4096, 9_999, 10_000, 1 << 20] {
            let (digests, len) = hash_reader_with_chunk_size(&data[..], chunk_size).unwrap();
            assert_eq!(digests, reference, "chunk size {chunk_size}");
            assert_eq!(len, data.len() as u64);
        }
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hel");
        hasher.update(b"");
        hasher.update(b"lo");
        assert_eq!(hasher.bytes(), 5);
        assert_eq!(hasher.finalize(), hash_reader(&b"hello"[..]).unwrap().0);
    }

    #[test]
    fn digests_serialize_as_hex_strings() {
        let (digests, _) = hash_reader(&b"hello"[..]).unwrap();
        let json = serde_json::to_value(&digests).unwrap();
        assert_eq!(json["md5"], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(json["sha256"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn read_errors_propagate() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
            }
        }
        assert!(hash_reader(Broken).is_err());
    }
}
