//! Streaming fingerprint function.
//!
//! # Overview
//!
//! [`Hasher`] turns file content into a fixed 32-byte [`Fingerprint`]
//! by streaming it through a bounded buffer, so memory use stays
//! `O(buffer_size)` whatever the file size. It holds no mutable state and
//! can be shared across worker threads behind an `Arc`.
//!
//! The [`Fingerprinter`] trait is the seam the worker pool depends on;
//! any deterministic function of the bytes can stand in for [`Hasher`].

use std::fs::File;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use sha2::Digest;

use super::{FileDescriptor, HashError};

/// Length of every fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Default read buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Fixed-size content fingerprint.
pub type Fingerprint = [u8; FINGERPRINT_LEN];

/// Computes the fingerprint of one discovered file.
///
/// Implementations must be deterministic and safe to call concurrently.
pub trait Fingerprinter: Send + Sync {
    /// Open `file` and fingerprint its full content.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or if its
    /// content length no longer matches the size recorded at discovery.
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError>;
}

/// Supported fingerprint algorithms.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (default)
    #[default]
    Blake3,
    /// SHA-256
    Sha256,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Running digest state for one file.
enum DigestState {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(bytes);
            }
            Self::Sha256(h) => h.update(bytes),
        }
    }

    fn finalize(self) -> Fingerprint {
        match self {
            Self::Blake3(h) => *h.finalize().as_bytes(),
            Self::Sha256(h) => {
                let mut out = [0u8; FINGERPRINT_LEN];
                out.copy_from_slice(&h.finalize());
                out
            }
        }
    }
}

/// Streaming file hasher.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a BLAKE3 hasher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithm::Blake3,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Select the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the read buffer size (at least one byte).
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The configured buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Fingerprint everything `reader` yields.
    ///
    /// Returns the fingerprint and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Propagates any read error other than `Interrupted`, which is retried.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupsweep::scanner::Hasher;
    ///
    /// let hasher = Hasher::new().with_buffer_size(2);
    /// let (a, len) = hasher.fingerprint_reader(&b"hello"[..]).unwrap();
    /// let (b, _) = hasher.fingerprint_reader(&b"hello"[..]).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(len, 5);
    /// ```
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> io::Result<(Fingerprint, u64)> {
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    state.update(&buffer[..n]);
                    total += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok((state.finalize(), total))
    }
}

impl Fingerprinter for Hasher {
    fn fingerprint(&self, file: &FileDescriptor) -> Result<Fingerprint, HashError> {
        let handle = File::open(&file.path).map_err(|e| HashError::from_io(&file.path, &e))?;
        let (fingerprint, read) = self
            .fingerprint_reader(handle)
            .map_err(|e| HashError::from_io(&file.path, &e))?;

        if read != file.size {
            return Err(HashError::SizeChanged {
                path: file.path.clone(),
                expected: file.size,
                actual: read,
            });
        }

        Ok(fingerprint)
    }
}

/// Render a fingerprint as lowercase hex.
///
/// # Examples
///
/// ```
/// use dupsweep::scanner::hash_to_hex;
///
/// let mut fp = [0u8; 32];
/// fp[0] = 0xab;
/// assert!(hash_to_hex(&fp).starts_with("ab00"));
/// assert_eq!(hash_to_hex(&fp).len(), 64);
/// ```
#[must_use]
pub fn hash_to_hex(fingerprint: &Fingerprint) -> String {
    use std::fmt::Write;

    fingerprint
        .iter()
        .fold(String::with_capacity(FINGERPRINT_LEN * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}
