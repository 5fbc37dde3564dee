//! String-to-key parameters and key derivation.
//!
//! [`String2Key`] is the parameter block stored with the key. [`KeyDeriver`] turns a
//! candidate phrase into symmetric key material for it. Every tester owns its own
//! deriver because the iterated variant keeps a scratch buffer that is rewritten for
//! each candidate.
//!
//! # Specifiers
//!
//! | Spec | Name | Hash input |
//! |------|------|------------|
//! | 0 | Simple | `phrase` |
//! | 1 | Salted | `salt ‖ phrase` |
//! | 3 | Iterated and salted | `salt ‖ phrase` repeated until `count` bytes |
//!
//! When the cipher key is longer than one digest, further hash contexts are run with
//! 1, 2, ... zero bytes fed first and their outputs are concatenated.

use std::fmt;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::crypto::{CipherAlgorithm, HashAlgorithm};
use crate::error::{Error, Result};

/// S2K specifier identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum S2kSpec {
    /// Hash of the phrase only (0).
    Simple,
    /// Hash of salt and phrase (1).
    Salted,
    /// Salted hash over a stretched input (3).
    IteratedSalted,
    /// Any other identifier.
    Unknown(u8),
}

impl From<u8> for S2kSpec {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Simple,
            1 => Self::Salted,
            3 => Self::IteratedSalted,
            other => Self::Unknown(other),
        }
    }
}

impl From<S2kSpec> for u8 {
    fn from(spec: S2kSpec) -> Self {
        match spec {
            S2kSpec::Simple => 0,
            S2kSpec::Salted => 1,
            S2kSpec::IteratedSalted => 3,
            S2kSpec::Unknown(id) => id,
        }
    }
}

impl fmt::Display for S2kSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Salted => write!(f, "salted"),
            Self::IteratedSalted => write!(f, "iterated+salted"),
            Self::Unknown(id) => write!(f, "spec {}", id),
        }
    }
}

/// S2K parameters of a secret key.
///
/// Binary fields are hex strings in the key file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct String2Key {
    /// S2K usage byte: 0 = unencrypted, 254 = SHA-1 checksum, 255 or other = 16-bit checksum.
    pub usage: u8,
    /// Symmetric cipher protecting the secret key material.
    pub cipher: CipherAlgorithm,
    /// S2K specifier.
    pub spec: S2kSpec,
    /// Hash algorithm used for derivation.
    pub hash: HashAlgorithm,
    /// Eight salt bytes (ignored for the simple specifier).
    #[serde(with = "crate::key::hex_bytes", default)]
    pub salt: Vec<u8>,
    /// Coded iteration count byte (only used by the iterated specifier).
    #[serde(default)]
    pub count: u8,
    /// CFB initialisation vector, one cipher block long.
    #[serde(with = "crate::key::hex_bytes")]
    pub iv: Vec<u8>,
}

impl String2Key {
    /// Number of bytes hashed by the iterated specifier.
    pub fn iterations(&self) -> usize {
        decode_count(self.count)
    }
}

/// Expands a coded count byte: `(16 + (c & 15)) << ((c >> 4) + 6)`.
pub fn decode_count(coded: u8) -> usize {
    (16usize + (coded as usize & 15)) << ((coded as usize >> 4) + 6)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum S2kHash {
    Md5,
    Sha1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Simple,
    Salted,
    Iterated(usize),
}

/// Derives cipher keys from candidate phrases.
///
/// # Example
///
/// ```rust
/// use phrasehound::s2k::{KeyDeriver, String2Key, S2kSpec};
/// use phrasehound::crypto::{CipherAlgorithm, HashAlgorithm};
///
/// let s2k = String2Key {
///     usage: 254,
///     cipher: CipherAlgorithm::Cast5,
///     spec: S2kSpec::IteratedSalted,
///     hash: HashAlgorithm::Sha1,
///     salt: vec![1, 2, 3, 4, 5, 6, 7, 8],
///     count: 0,
///     iv: vec![0; 8],
/// };
/// let mut deriver = KeyDeriver::new(&s2k, 16).unwrap();
/// let mut key = [0u8; 16];
/// deriver.derive(b"test123", &mut key);
/// ```
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    hash: S2kHash,
    mode: Mode,
    salt: [u8; 8],
    key_size: usize,
    scratch: Vec<u8>,
}

const SCRATCH_TARGET: usize = 4096;

impl KeyDeriver {
    /// Validates the parameters and prepares a deriver for `key_size`-byte keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] for hashes other than MD5/SHA-1 and
    /// unknown specifiers, [`Error::Key`] for a short salt.
    pub fn new(s2k: &String2Key, key_size: usize) -> Result<Self> {
        let hash = match s2k.hash {
            HashAlgorithm::Md5 => S2kHash::Md5,
            HashAlgorithm::Sha1 => S2kHash::Sha1,
            other => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "unsupported hash algorithm: {} ({})",
                    u8::from(other),
                    other
                )))
            }
        };
        let mode = match s2k.spec {
            S2kSpec::Simple => Mode::Simple,
            S2kSpec::Salted => Mode::Salted,
            S2kSpec::IteratedSalted => Mode::Iterated(s2k.iterations()),
            S2kSpec::Unknown(id) => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "unknown string-to-key spec: {}",
                    id
                )))
            }
        };

        let mut salt = [0u8; 8];
        if mode != Mode::Simple {
            if s2k.salt.len() != 8 {
                return Err(Error::Key(format!(
                    "salt must be 8 bytes, got {}",
                    s2k.salt.len()
                )));
            }
            salt.copy_from_slice(&s2k.salt);
        }

        Ok(Self {
            hash,
            mode,
            salt,
            key_size,
            scratch: Vec::with_capacity(SCRATCH_TARGET + 64),
        })
    }

    /// Length of the keys this deriver produces.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Writes the key for `phrase` into `out`, which must be `key_size()` bytes long.
    pub fn derive(&mut self, phrase: &[u8], out: &mut [u8]) {
        match self.hash {
            S2kHash::Md5 => self.derive_with::<Md5>(phrase, out),
            S2kHash::Sha1 => self.derive_with::<Sha1>(phrase, out),
        }
    }

    fn derive_with<D: Digest>(&mut self, phrase: &[u8], out: &mut [u8]) {
        let digest_size = <D as Digest>::output_size();
        if let Mode::Iterated(_) = self.mode {
            self.fill_scratch(phrase);
        }

        for (preload, chunk) in out.chunks_mut(digest_size).enumerate() {
            let mut hasher = D::new();
            for _ in 0..preload {
                hasher.update([0u8]);
            }
            match self.mode {
                Mode::Simple => hasher.update(phrase),
                Mode::Salted => {
                    hasher.update(self.salt);
                    hasher.update(phrase);
                }
                Mode::Iterated(count) => {
                    let unit = self.salt.len() + phrase.len();
                    // At least one full salt and phrase is always hashed.
                    let mut remaining = count.max(unit);
                    while remaining > 0 {
                        let n = remaining.min(self.scratch.len());
                        hasher.update(&self.scratch[..n]);
                        remaining -= n;
                    }
                }
            }
            let digest = hasher.finalize();
            chunk.copy_from_slice(&digest[..chunk.len()]);
        }
    }

    // Repeats salt || phrase so long inputs are fed in few large updates. The
    // buffer always holds whole units, so any prefix of it is a valid stream prefix.
    fn fill_scratch(&mut self, phrase: &[u8]) {
        let unit = self.salt.len() + phrase.len();
        let reps = (SCRATCH_TARGET / unit).max(1);
        self.scratch.clear();
        for _ in 0..reps {
            self.scratch.extend_from_slice(&self.salt);
            self.scratch.extend_from_slice(phrase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(spec: S2kSpec, hash: HashAlgorithm, count: u8) -> String2Key {
        String2Key {
            usage: 254,
            cipher: CipherAlgorithm::Cast5,
            spec,
            hash,
            salt: b"saltsalt".to_vec(),
            count,
            iv: vec![0; 8],
        }
    }

    #[test]
    fn test_decode_count() {
        assert_eq!(decode_count(0), 1024);
        assert_eq!(decode_count(0x60), 65536);
        assert_eq!(decode_count(96), 65536);
        assert_eq!(decode_count(0xff), 65_011_712);
    }

    #[test]
    fn test_simple_sha1_matches_plain_digest() {
        let mut deriver =
            KeyDeriver::new(&params(S2kSpec::Simple, HashAlgorithm::Sha1, 0), 16).unwrap();
        let mut key = [0u8; 16];
        deriver.derive(b"abc", &mut key);
        assert_eq!(key[..], Sha1::digest(b"abc")[..16]);
    }

    #[test]
    fn test_salted_md5() {
        let mut deriver =
            KeyDeriver::new(&params(S2kSpec::Salted, HashAlgorithm::Md5, 0), 16).unwrap();
        let mut key = [0u8; 16];
        deriver.derive(b"abc", &mut key);
        assert_eq!(key[..], Md5::digest(b"saltsaltabc")[..]);
    }

    #[test]
    fn test_iterated_equals_naive_stream() {
        let s2k = params(S2kSpec::IteratedSalted, HashAlgorithm::Sha1, 0x10);
        let mut deriver = KeyDeriver::new(&s2k, 16).unwrap();
        let mut key = [0u8; 16];
        deriver.derive(b"test123", &mut key);

        let mut stream = Vec::new();
        while stream.len() < s2k.iterations() {
            stream.extend_from_slice(b"saltsalttest123");
        }
        stream.truncate(s2k.iterations());
        assert_eq!(key[..], Sha1::digest(&stream)[..16]);
    }

    #[test]
    fn test_iterated_hashes_at_least_one_unit() {
        // A count below salt+phrase length still hashes the whole unit.
        let s2k = params(S2kSpec::IteratedSalted, HashAlgorithm::Md5, 0);
        let phrase = vec![b'p'; 2000];
        let mut deriver = KeyDeriver::new(&s2k, 16).unwrap();
        let mut key = [0u8; 16];
        deriver.derive(&phrase, &mut key);

        let mut unit = b"saltsalt".to_vec();
        unit.extend_from_slice(&phrase);
        assert_eq!(key[..], Md5::digest(&unit)[..]);
    }

    #[test]
    fn test_long_keys_use_zero_preloaded_contexts() {
        let mut deriver =
            KeyDeriver::new(&params(S2kSpec::Simple, HashAlgorithm::Sha1, 0), 32).unwrap();
        let mut key = [0u8; 32];
        deriver.derive(b"pw", &mut key);
        assert_eq!(key[..20], Sha1::digest(b"pw")[..]);
        assert_eq!(key[20..], Sha1::digest(b"\0pw")[..12]);
    }

    #[test]
    fn test_deriver_is_reusable() {
        let s2k = params(S2kSpec::IteratedSalted, HashAlgorithm::Sha1, 0);
        let mut deriver = KeyDeriver::new(&s2k, 16).unwrap();
        let mut first = [0u8; 16];
        let mut other = [0u8; 16];
        let mut again = [0u8; 16];
        deriver.derive(b"first", &mut first);
        deriver.derive(b"a much longer second phrase", &mut other);
        deriver.derive(b"first", &mut again);
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_unsupported_parameters() {
        let sha256 = params(S2kSpec::Simple, HashAlgorithm::Sha256, 0);
        assert!(matches!(
            KeyDeriver::new(&sha256, 16),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        let unknown = params(S2kSpec::Unknown(2), HashAlgorithm::Sha1, 0);
        assert!(matches!(
            KeyDeriver::new(&unknown, 16),
            Err(Error::UnsupportedAlgorithm(_))
        ));

        let mut short_salt = params(S2kSpec::Salted, HashAlgorithm::Sha1, 0);
        short_salt.salt = vec![1, 2];
        assert!(matches!(
            KeyDeriver::new(&short_salt, 16),
            Err(Error::Key(_))
        ));
    }
}
