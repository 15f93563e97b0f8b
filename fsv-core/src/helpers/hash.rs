//! Content fingerprinting.

use std::fmt;
use std::io::Read;
use std::path::Path;

use fs_err as fs;
use fs_err::File;
use serde::{Deserialize, Serialize};

use crate::FsvError;

/// Hash threshold for memory-mapped I/O (16KB).
pub const MMAP_THRESHOLD: u64 = 16 * 1024;

/// Digest algorithm used for fingerprints.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    /// Blake3, 64 hex characters.
    #[default]
    Blake3,
    /// MD5, 32 hex characters. Matches `md5sum` output.
    Md5,
}

impl HashAlgo {
    /// Length of a hex-encoded digest for this algorithm.
    pub const fn hex_len(self) -> usize {
        match self {
            HashAlgo::Blake3 => 64,
            HashAlgo::Md5 => 32,
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgo::Blake3 => write!(f, "blake3"),
            HashAlgo::Md5 => write!(f, "md5"),
        }
    }
}

/// Incremental hasher over either algorithm.
enum Digest {
    Blake3(Box<blake3::Hasher>),
    Md5(md5::Context),
}

impl Digest {
    fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Blake3 => Digest::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgo::Md5 => Digest::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digest::Blake3(h) => {
                h.update(data);
            }
            Digest::Md5(c) => c.consume(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Digest::Blake3(h) => h.finalize().to_hex().to_string(),
            Digest::Md5(c) => format!("{:x}", c.compute()),
        }
    }
}

/// Computes content fingerprints for files.
///
/// The fingerprint depends on the byte content only: path, mtime and
/// permissions never contribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprinter {
    algo: HashAlgo,
}

impl Fingerprinter {
    /// Create a fingerprinter for the given algorithm.
    pub fn new(algo: HashAlgo) -> Self {
        Self { algo }
    }

    /// The algorithm in use.
    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// Fingerprint a file on disk.
    ///
    /// Uses memory-mapped I/O for files >= 16KB (when the `mmap` feature is
    /// enabled), buffered reads otherwise.
    pub fn fingerprint(&self, path: &Path) -> Result<String, FsvError> {
        let size = fs::metadata(path)?.len();

        if cfg!(feature = "mmap") && size >= MMAP_THRESHOLD {
            self.hash_mmap(path)
        } else {
            self.hash_read(path)
        }
    }

    /// Fingerprint an in-memory buffer.
    pub fn fingerprint_bytes(&self, data: &[u8]) -> String {
        let mut digest = Digest::new(self.algo);
        digest.update(data);
        digest.finish()
    }

    #[cfg(feature = "mmap")]
    fn hash_mmap(&self, path: &Path) -> Result<String, FsvError> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and dropped before returning; captures
        // do not race against writers to the scanned tree.
        let mmap = unsafe { memmap2::Mmap::map(file.file())? };
        Ok(self.fingerprint_bytes(&mmap))
    }

    #[cfg(not(feature = "mmap"))]
    fn hash_mmap(&self, path: &Path) -> Result<String, FsvError> {
        self.hash_read(path)
    }

    fn hash_read(&self, path: &Path) -> Result<String, FsvError> {
        let mut file = File::open(path)?;
        let mut digest = Digest::new(self.algo);

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            digest.update(&buffer[..bytes_read]);
        }

        Ok(digest.finish())
    }
}
