//! Candidate pass phrases as they travel through the pipeline.
//!
//! [`PhraseBlock`] is the unit carried by every [`BoundedChannel`](crate::BoundedChannel):
//! an owned byte buffer whose zero-length form is the reserved termination sentinel.
//! [`SecretPhrase`] holds the recovered pass phrase once a tester succeeds and wipes
//! itself on drop.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// An owned candidate pass phrase.
///
/// Blocks are moved, not shared, between pipeline stages. A block of length zero
/// is never a real candidate: it tells the consuming stage to terminate.
///
/// # Example
///
/// ```rust
/// use phrasehound::PhraseBlock;
///
/// let block = PhraseBlock::from("hunter2");
/// assert_eq!(block.len(), 7);
/// assert!(!block.is_sentinel());
/// assert!(PhraseBlock::sentinel().is_sentinel());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PhraseBlock(Vec<u8>);

impl PhraseBlock {
    /// Creates a block holding a copy of `bytes`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the termination sentinel.
    pub fn sentinel() -> Self {
        Self(Vec::new())
    }

    /// Returns true for the zero-length termination sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the phrase in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`is_sentinel`](Self::is_sentinel).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The phrase bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the block and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Replaces the content while keeping the allocation.
    pub fn assign(&mut self, bytes: &[u8]) {
        self.0.clear();
        self.0.extend_from_slice(bytes);
    }

    /// Resizes the block to `len` bytes and returns the buffer for in-place writes.
    ///
    /// Guessers use this to overwrite a recycled block without reallocating.
    pub fn fill(&mut self, len: usize) -> &mut [u8] {
        self.0.resize(len, 0);
        &mut self.0
    }

    /// Builds `prefix || self || suffix`.
    pub fn wrapped(&self, prefix: &[u8], suffix: &[u8]) -> PhraseBlock {
        let mut bytes = Vec::with_capacity(prefix.len() + self.0.len() + suffix.len());
        bytes.extend_from_slice(prefix);
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(suffix);
        PhraseBlock(bytes)
    }

    /// Lossy UTF-8 view for log output.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for PhraseBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "PhraseBlock(<sentinel>)")
        } else {
            write!(f, "PhraseBlock({:?})", String::from_utf8_lossy(&self.0))
        }
    }
}

impl From<&str> for PhraseBlock {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for PhraseBlock {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for PhraseBlock {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// The recovered pass phrase.
///
/// The bytes are overwritten with zeros when the value is dropped and `Debug`
/// output never shows them. Cloning produces an independent copy that is wiped
/// on its own drop.
///
/// # Example
///
/// ```rust
/// use phrasehound::SecretPhrase;
///
/// let phrase = SecretPhrase::new(b"test123".to_vec());
/// assert_eq!(phrase.as_bytes(), b"test123");
///
/// let debug = format!("{:?}", phrase);
/// assert!(debug.contains("REDACTED"));
/// assert!(!debug.contains("test123"));
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretPhrase(Vec<u8>);

impl SecretPhrase {
    /// Wraps the recovered bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw pass phrase bytes.
    ///
    /// Avoid copying them into long-lived buffers.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy UTF-8 rendering for the final report.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretPhrase([REDACTED])")
    }
}
