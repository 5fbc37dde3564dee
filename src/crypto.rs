//! OpenPGP algorithm identifiers and the symmetric primitives the testers call.
//!
//! Identifiers are stored as they appear in the key (RFC 4880 numbering) and are only
//! checked when a tester is initialised, so an unsupported cipher is reported as a
//! setup error for the attack rather than as a key loading failure.
//!
//! | Id | Cipher | Block | Key |
//! |----|--------|-------|-----|
//! | 1 | IDEA | 8 | 16 (not supported) |
//! | 3 | CAST5 | 8 | 16 |
//! | 4 | Blowfish | 8 | 16 |
//! | 7 | AES-128 | 16 | 16 |
//! | 8 | AES-192 | 16 | 24 |
//! | 9 | AES-256 | 16 | 32 |

use std::fmt;

use cipher::{AsyncStreamCipher, BlockCipher, BlockEncryptMut, KeyInit, KeyIvInit};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Symmetric cipher identifier as stored in the key's S2K block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CipherAlgorithm {
    /// IDEA (1).
    Idea,
    /// Triple-DES (2).
    TripleDes,
    /// CAST5 (3).
    Cast5,
    /// Blowfish with a 128-bit key (4).
    Blowfish,
    /// AES with a 128-bit key (7).
    Aes128,
    /// AES with a 192-bit key (8).
    Aes192,
    /// AES with a 256-bit key (9).
    Aes256,
    /// Twofish (10).
    Twofish,
    /// Any other identifier.
    Unknown(u8),
}

impl From<u8> for CipherAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Idea,
            2 => Self::TripleDes,
            3 => Self::Cast5,
            4 => Self::Blowfish,
            7 => Self::Aes128,
            8 => Self::Aes192,
            9 => Self::Aes256,
            10 => Self::Twofish,
            other => Self::Unknown(other),
        }
    }
}

impl From<CipherAlgorithm> for u8 {
    fn from(alg: CipherAlgorithm) -> Self {
        match alg {
            CipherAlgorithm::Idea => 1,
            CipherAlgorithm::TripleDes => 2,
            CipherAlgorithm::Cast5 => 3,
            CipherAlgorithm::Blowfish => 4,
            CipherAlgorithm::Aes128 => 7,
            CipherAlgorithm::Aes192 => 8,
            CipherAlgorithm::Aes256 => 9,
            CipherAlgorithm::Twofish => 10,
            CipherAlgorithm::Unknown(id) => id,
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idea => write!(f, "IDEA"),
            Self::TripleDes => write!(f, "3DES"),
            Self::Cast5 => write!(f, "CAST5"),
            Self::Blowfish => write!(f, "Blowfish"),
            Self::Aes128 => write!(f, "AES-128"),
            Self::Aes192 => write!(f, "AES-192"),
            Self::Aes256 => write!(f, "AES-256"),
            Self::Twofish => write!(f, "Twofish"),
            Self::Unknown(id) => write!(f, "cipher {}", id),
        }
    }
}

/// Hash algorithm identifier used by the S2K function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum HashAlgorithm {
    /// MD5 (1).
    Md5,
    /// SHA-1 (2).
    Sha1,
    /// RIPEMD-160 (3).
    Ripemd160,
    /// SHA-256 (8).
    Sha256,
    /// Any other identifier.
    Unknown(u8),
}

impl From<u8> for HashAlgorithm {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Md5,
            2 => Self::Sha1,
            3 => Self::Ripemd160,
            8 => Self::Sha256,
            other => Self::Unknown(other),
        }
    }
}

impl From<HashAlgorithm> for u8 {
    fn from(alg: HashAlgorithm) -> Self {
        match alg {
            HashAlgorithm::Md5 => 1,
            HashAlgorithm::Sha1 => 2,
            HashAlgorithm::Ripemd160 => 3,
            HashAlgorithm::Sha256 => 8,
            HashAlgorithm::Unknown(id) => id,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Ripemd160 => write!(f, "RIPEMD-160"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Unknown(id) => write!(f, "hash {}", id),
        }
    }
}

/// A cipher the testers can run in OpenPGP CFB mode.
///
/// One variant per supported algorithm; each dispatches to a monomorphised
/// RustCrypto implementation. Keys change with every candidate, so the cipher is
/// keyed per call rather than held pre-keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfbCipher {
    /// CAST5, 8-byte blocks, 16-byte key.
    Cast5,
    /// Blowfish, 8-byte blocks, 16-byte key.
    Blowfish,
    /// AES-128.
    Aes128,
    /// AES-192.
    Aes192,
    /// AES-256.
    Aes256,
}

impl CfbCipher {
    /// Selects the implementation for `alg`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] for IDEA and anything not listed in
    /// the module table.
    pub fn for_algorithm(alg: CipherAlgorithm) -> Result<Self> {
        match alg {
            CipherAlgorithm::Cast5 => Ok(Self::Cast5),
            CipherAlgorithm::Blowfish => Ok(Self::Blowfish),
            CipherAlgorithm::Aes128 => Ok(Self::Aes128),
            CipherAlgorithm::Aes192 => Ok(Self::Aes192),
            CipherAlgorithm::Aes256 => Ok(Self::Aes256),
            other => Err(Error::UnsupportedAlgorithm(format!(
                "unsupported cipher algorithm: {} ({})",
                u8::from(other),
                other
            ))),
        }
    }

    /// Cipher block size in bytes.
    pub fn block_size(self) -> usize {
        match self {
            Self::Cast5 | Self::Blowfish => 8,
            Self::Aes128 | Self::Aes192 | Self::Aes256 => 16,
        }
    }

    /// Key size in bytes.
    pub fn key_size(self) -> usize {
        match self {
            Self::Cast5 | Self::Blowfish | Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Decrypts `buf` in place with CFB mode starting from `iv`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Key`] if `key` or `iv` has the wrong length.
    pub fn decrypt(self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Cast5 => cfb_decrypt::<cast5::Cast5>(key, iv, buf),
            Self::Blowfish => cfb_decrypt::<blowfish::Blowfish>(key, iv, buf),
            Self::Aes128 => cfb_decrypt::<aes::Aes128>(key, iv, buf),
            Self::Aes192 => cfb_decrypt::<aes::Aes192>(key, iv, buf),
            Self::Aes256 => cfb_decrypt::<aes::Aes256>(key, iv, buf),
        }
    }

    /// Encrypts `buf` in place with CFB mode starting from `iv`.
    ///
    /// Used to build fixtures; the attack itself only decrypts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Key`] if `key` or `iv` has the wrong length.
    pub fn encrypt(self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Cast5 => cfb_encrypt::<cast5::Cast5>(key, iv, buf),
            Self::Blowfish => cfb_encrypt::<blowfish::Blowfish>(key, iv, buf),
            Self::Aes128 => cfb_encrypt::<aes::Aes128>(key, iv, buf),
            Self::Aes192 => cfb_encrypt::<aes::Aes192>(key, iv, buf),
            Self::Aes256 => cfb_encrypt::<aes::Aes256>(key, iv, buf),
        }
    }
}

fn cfb_decrypt<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let decryptor = cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::Key(format!("bad key ({}) or iv ({}) length", key.len(), iv.len())))?;
    decryptor.decrypt(buf);
    Ok(())
}

fn cfb_encrypt<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| Error::Key(format!("bad key ({}) or iv ({}) length", key.len(), iv.len())))?;
    encryptor.encrypt(buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for id in 0..=255u8 {
            assert_eq!(u8::from(CipherAlgorithm::from(id)), id);
            assert_eq!(u8::from(HashAlgorithm::from(id)), id);
        }
    }

    #[test]
    fn test_idea_is_rejected() {
        let err = CfbCipher::for_algorithm(CipherAlgorithm::Idea).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
        assert!(err.to_string().contains("IDEA"));
        assert!(CfbCipher::for_algorithm(CipherAlgorithm::Unknown(42)).is_err());
    }

    #[test]
    fn test_sizes() {
        let cast5 = CfbCipher::for_algorithm(CipherAlgorithm::Cast5).unwrap();
        assert_eq!((cast5.block_size(), cast5.key_size()), (8, 16));
        let aes = CfbCipher::for_algorithm(CipherAlgorithm::Aes256).unwrap();
        assert_eq!((aes.block_size(), aes.key_size()), (16, 32));
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let plaintext = b"an odd length buffer spanning several blocks!".to_vec();
        for cipher in [
            CfbCipher::Cast5,
            CfbCipher::Blowfish,
            CfbCipher::Aes128,
            CfbCipher::Aes192,
            CfbCipher::Aes256,
        ] {
            let key = vec![0x5a; cipher.key_size()];
            let iv = vec![0x11; cipher.block_size()];
            let mut buf = plaintext.clone();
            cipher.encrypt(&key, &iv, &mut buf).unwrap();
            assert_ne!(buf, plaintext);

            // Decrypting only the first block yields the first plaintext block.
            let mut head = buf[..cipher.block_size()].to_vec();
            cipher.decrypt(&key, &iv, &mut head).unwrap();
            assert_eq!(head, plaintext[..cipher.block_size()]);

            cipher.decrypt(&key, &iv, &mut buf).unwrap();
            assert_eq!(buf, plaintext);
        }
    }

    #[test]
    fn test_wrong_iv_length() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            CfbCipher::Cast5.decrypt(&[0; 16], &[0; 4], &mut buf),
            Err(Error::Key(_))
        ));
    }
}
