//! The locked secret key under attack.
//!
//! Packet parsing is out of scope, so a [`Key`] is read from a small TOML document that
//! carries the fields a PGP secret-key packet would hold. Binary fields are hex strings.
//!
//! ```toml
//! version = 4
//! data = "8f1e..."            # encrypted secret MPIs followed by the checksum
//!
//! [public]
//! algorithm = "rsa"           # or "dsa" with p, q, g, y
//! n = "b1434413..."
//! e = "10001"
//!
//! [s2k]
//! usage = 254                 # 254 = SHA-1 trailer, other non-zero = 16-bit sum
//! cipher = 3                  # CAST5
//! spec = 3                    # iterated and salted
//! hash = 2                    # SHA-1
//! salt = "0102030405060708"
//! count = 96
//! iv = "0011223344556677"
//! ```
//!
//! Besides the raw parameters the key supplies the two checks a tester cannot do on its
//! own: [`Key::quick_check`] judges a decrypted first block and [`Key::verify`] checks
//! the recovered secret material against the public values.

use std::fmt;
use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::s2k::String2Key;

/// Smallest plausible bit count for the first secret MPI.
pub const MIN_BN_BITS: usize = 64;

/// Hex (de)serialisation for byte fields.
pub(crate) mod hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim()).map_err(D::Error::custom)
    }
}

/// A multi-precision integer, written as hex in the key file.
#[derive(Clone, PartialEq, Eq)]
pub struct Mpi(BigUint);

impl Mpi {
    /// Wraps a value.
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// The integer value.
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Bit length of the value.
    pub fn bits(&self) -> usize {
        self.0.bits() as usize
    }
}

impl fmt::Debug for Mpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpi({} bits)", self.bits())
    }
}

impl Serialize for Mpi {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_str_radix(16))
    }
}

impl<'de> Deserialize<'de> for Mpi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;
        let text = String::deserialize(deserializer)?;
        BigUint::parse_bytes(text.trim().as_bytes(), 16)
            .map(Mpi)
            .ok_or_else(|| D::Error::custom(format!("invalid hex integer: {:?}", text)))
    }
}

/// Public half of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum PublicKey {
    /// RSA modulus and exponent.
    Rsa {
        /// Modulus.
        n: Mpi,
        /// Public exponent.
        e: Mpi,
    },
    /// DSA domain parameters and public value.
    Dsa {
        /// Prime modulus.
        p: Mpi,
        /// Subgroup order.
        q: Mpi,
        /// Generator.
        g: Mpi,
        /// Public value `g^x mod p`.
        y: Mpi,
    },
}

/// A secret key as the attack sees it.
///
/// Immutable once loaded. Testers share it through an `Arc`; each tester keeps its own
/// derivation and decryption scratch state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Packet version; only 4 can be attacked.
    pub version: u8,
    /// Encrypted secret MPIs followed by the checksum.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Public parameters.
    pub public: PublicKey,
    /// Protection parameters.
    pub s2k: String2Key,
}

impl Key {
    /// Loads a key from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Key`] if it does
    /// not describe a usable key.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses a key from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Key`] for malformed documents.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let key: Key =
            toml::from_str(content).map_err(|e| Error::Key(format!("parse error: {}", e)))?;
        key.validate()?;
        Ok(key)
    }

    /// Renders the key as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Key(format!("serialize error: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        let modulus_bits = match &self.public {
            PublicKey::Rsa { n, .. } => n.bits(),
            PublicKey::Dsa { p, q, .. } => p.bits().min(q.bits()),
        };
        if modulus_bits == 0 {
            return Err(Error::Key("public modulus is zero".to_string()));
        }
        if self.locked() {
            if self.data.is_empty() {
                return Err(Error::Key("no encrypted data".to_string()));
            }
            if self.s2k.iv.is_empty() {
                return Err(Error::Key("missing iv".to_string()));
            }
        }
        Ok(())
    }

    /// True when the secret material is protected by a pass phrase.
    pub fn locked(&self) -> bool {
        self.s2k.usage != 0
    }

    /// Bit length of the RSA modulus or DSA prime.
    pub fn bits(&self) -> usize {
        match &self.public {
            PublicKey::Rsa { n, .. } => n.bits(),
            PublicKey::Dsa { p, .. } => p.bits(),
        }
    }

    /// Short algorithm name for log output.
    pub fn algorithm_name(&self) -> &'static str {
        match self.public {
            PublicKey::Rsa { .. } => "RSA",
            PublicKey::Dsa { .. } => "DSA",
        }
    }

    /// Cheap plausibility test on the first decrypted block.
    ///
    /// The block starts with the bit count of the first secret MPI followed by its
    /// most significant byte. A wrong pass phrase produces a random header, which this
    /// rejects with high probability.
    pub fn quick_check(&self, first_block: &[u8]) -> bool {
        if first_block.len() < 3 {
            return false;
        }
        let num_bits = u16::from_be_bytes([first_block[0], first_block[1]]) as usize;
        if num_bits < MIN_BN_BITS || num_bits > self.bits() {
            return false;
        }
        let top_bits = 8 - first_block[2].leading_zeros() as usize;
        num_bits % 8 == top_bits % 8
    }

    /// Checks decrypted secret MPIs (checksum already stripped) against the public key.
    pub fn verify(&self, secret: &[u8]) -> bool {
        let mut pos = 0;
        match &self.public {
            PublicKey::Rsa { n, .. } => {
                let (Some(_d), Some(p), Some(q), Some(u)) = (
                    read_mpi(secret, &mut pos),
                    read_mpi(secret, &mut pos),
                    read_mpi(secret, &mut pos),
                    read_mpi(secret, &mut pos),
                ) else {
                    return false;
                };
                if q.bits() == 0 || &p * &q != *n.value() {
                    return false;
                }
                (&p * &u) % &q == BigUint::from(1u32)
            }
            PublicKey::Dsa { p, g, y, .. } => {
                let Some(x) = read_mpi(secret, &mut pos) else {
                    return false;
                };
                g.value().modpow(&x, p.value()) == *y.value()
            }
        }
    }
}

/// Reads one length-prefixed MPI and advances `pos`.
pub(crate) fn read_mpi(buf: &[u8], pos: &mut usize) -> Option<BigUint> {
    let header = buf.get(*pos..*pos + 2)?;
    let bits = u16::from_be_bytes([header[0], header[1]]) as usize;
    let len = bits.div_ceil(8);
    let body = buf.get(*pos + 2..*pos + 2 + len)?;
    *pos += 2 + len;
    Some(BigUint::from_bytes_be(body))
}

/// Builders for encrypted keys used across the crate's tests.
#[cfg(test)]
pub(crate) mod testing {
    use num_bigint::BigUint;
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::crypto::{CfbCipher, CipherAlgorithm, HashAlgorithm};
    use crate::s2k::{KeyDeriver, S2kSpec};

    pub const RSA_P: &str = "c3a5c85c97cb3127b4d1a9f6e8c1e5ff";
    pub const RSA_Q: &str = "e7f1a3d5c4b29f8e1d6a5b4c3e2f1a39";
    pub const RSA_N: &str = "b143441319f959f18f616a955feb4d1a3a5212f9524979afb38d899e80591bc7";
    pub const RSA_D: &str = "5734615c084e2c5a731018b02dc503638e6bf2ba3497a1a4749d76c0bde64291";
    pub const RSA_U: &str = "9e12dd26e6992a8ddcfdf1f77a58bd5d";

    pub fn hex_int(text: &str) -> BigUint {
        BigUint::parse_bytes(text.as_bytes(), 16).unwrap()
    }

    pub fn write_mpi(out: &mut Vec<u8>, value: &BigUint) {
        out.extend_from_slice(&(value.bits() as u16).to_be_bytes());
        out.extend_from_slice(&value.to_bytes_be());
    }

    /// Plaintext secret MPIs of the fixture RSA key.
    pub fn rsa_secret() -> Vec<u8> {
        let mut secret = Vec::new();
        for value in [RSA_D, RSA_P, RSA_Q, RSA_U] {
            write_mpi(&mut secret, &hex_int(value));
        }
        secret
    }

    /// Appends the trailer required by `usage`.
    pub fn with_checksum(mut secret: Vec<u8>, usage: u8) -> Vec<u8> {
        if usage == 254 {
            let digest = Sha1::digest(&secret);
            secret.extend_from_slice(&digest);
        } else {
            let sum = secret
                .iter()
                .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
            secret.extend_from_slice(&sum.to_be_bytes());
        }
        secret
    }

    /// RSA key protected by `phrase` with the given parameters.
    pub fn rsa_key_with(
        phrase: &[u8],
        cipher: CipherAlgorithm,
        hash: HashAlgorithm,
        spec: S2kSpec,
        usage: u8,
    ) -> Key {
        let cfb = CfbCipher::for_algorithm(cipher).unwrap();
        let s2k = String2Key {
            usage,
            cipher,
            spec,
            hash,
            salt: vec![0x3c, 0x91, 0x0a, 0x7e, 0x55, 0xd2, 0x18, 0xf4],
            count: 0,
            iv: (0..cfb.block_size() as u8).map(|i| i.wrapping_mul(37)).collect(),
        };

        let mut session_key = vec![0u8; cfb.key_size()];
        KeyDeriver::new(&s2k, cfb.key_size())
            .unwrap()
            .derive(phrase, &mut session_key);

        let mut data = with_checksum(rsa_secret(), usage);
        cfb.encrypt(&session_key, &s2k.iv, &mut data).unwrap();

        Key {
            version: 4,
            data,
            public: PublicKey::Rsa {
                n: Mpi::new(hex_int(RSA_N)),
                e: Mpi::new(hex_int("10001")),
            },
            s2k,
        }
    }

    /// CAST5 / SHA-1 / iterated-salted key with a SHA-1 trailer.
    pub fn rsa_key(phrase: &[u8]) -> Key {
        rsa_key_with(
            phrase,
            CipherAlgorithm::Cast5,
            HashAlgorithm::Sha1,
            S2kSpec::IteratedSalted,
            254,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dsa_key() -> Key {
        let mut key = rsa_key(b"unused");
        key.public = PublicKey::Dsa {
            p: Mpi::new(BigUint::from(23u32)),
            q: Mpi::new(BigUint::from(11u32)),
            g: Mpi::new(BigUint::from(4u32)),
            y: Mpi::new(BigUint::from(18u32)),
        };
        key
    }

    #[test]
    fn test_toml_round_trip() {
        let key = rsa_key(b"test123");
        let text = key.to_toml().unwrap();
        assert!(text.contains("algorithm = \"rsa\""));
        assert_eq!(Key::from_toml_str(&text).unwrap(), key);
    }

    #[test]
    fn test_from_file() {
        let key = rsa_key(b"test123");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(key.to_toml().unwrap().as_bytes()).unwrap();
        let loaded = Key::from_file(file.path()).unwrap();
        assert!(loaded.locked());
        assert_eq!(loaded.bits(), 256);
        assert_eq!(loaded.algorithm_name(), "RSA");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Key::from_file(Path::new("/nonexistent/key.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_malformed_documents() {
        let bad_hex = r#"
version = 4
data = "zz"
[public]
algorithm = "rsa"
n = "ff"
e = "3"
[s2k]
usage = 254
cipher = 3
spec = 3
hash = 2
salt = "0102030405060708"
iv = "0001020304050607"
"#;
        assert!(matches!(Key::from_toml_str(bad_hex), Err(Error::Key(_))));

        let unknown_algorithm = bad_hex
            .replace("\"zz\"", "\"00\"")
            .replace("\"rsa\"", "\"elgamal\"");
        assert!(matches!(
            Key::from_toml_str(&unknown_algorithm),
            Err(Error::Key(_))
        ));

        let no_data = bad_hex.replace("\"zz\"", "\"\"");
        assert!(matches!(Key::from_toml_str(&no_data), Err(Error::Key(_))));
    }

    #[test]
    fn test_unlocked_key() {
        let mut key = rsa_key(b"x");
        key.s2k.usage = 0;
        assert!(!key.locked());
    }

    #[test]
    fn test_quick_check_accepts_real_header() {
        let key = rsa_key(b"x");
        assert!(key.quick_check(&rsa_secret()[..8]));
    }

    #[test]
    fn test_quick_check_rejects_implausible_headers() {
        let key = rsa_key(b"x");
        // too few bits
        assert!(!key.quick_check(&[0x00, 0x20, 0xff, 0, 0, 0, 0, 0]));
        // more bits than the modulus
        assert!(!key.quick_check(&[0x01, 0x01, 0x01, 0, 0, 0, 0, 0]));
        // 255 bits needs a top byte with 7 significant bits
        assert!(!key.quick_check(&[0x00, 0xff, 0xff, 0, 0, 0, 0, 0]));
        assert!(key.quick_check(&[0x00, 0xff, 0x57, 0, 0, 0, 0, 0]));
        assert!(!key.quick_check(&[0x00]));
    }

    #[test]
    fn test_verify_rsa() {
        let key = rsa_key(b"x");
        assert!(key.verify(&rsa_secret()));

        let mut corrupted = rsa_secret();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 1;
        assert!(!key.verify(&corrupted));

        assert!(!key.verify(&rsa_secret()[..10]));
        assert!(!key.verify(&[]));
    }

    #[test]
    fn test_verify_dsa() {
        let key = dsa_key();
        let mut secret = Vec::new();
        write_mpi(&mut secret, &BigUint::from(3u32));
        assert!(key.verify(&secret));

        let mut wrong = Vec::new();
        write_mpi(&mut wrong, &BigUint::from(5u32));
        assert!(!key.verify(&wrong));
        assert_eq!(key.algorithm_name(), "DSA");
        assert_eq!(key.bits(), 5);
    }

    #[test]
    fn test_read_mpi() {
        let mut pos = 0;
        let buf = [0x00, 0x09, 0x01, 0xff, 0x00, 0x01, 0x01];
        assert_eq!(read_mpi(&buf, &mut pos), Some(BigUint::from(511u32)));
        assert_eq!(pos, 4);
        assert_eq!(read_mpi(&buf, &mut pos), Some(BigUint::from(1u32)));
        assert_eq!(read_mpi(&buf, &mut pos), None);
    }
}
