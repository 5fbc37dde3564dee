//! Candidate testing.
//!
//! A [`Cracker`] decides whether one phrase unlocks the key. Checks run cheapest first:
//!
//! 1. derive the session key with the key's S2K parameters
//! 2. decrypt only the first cipher block and apply [`Key::quick_check`]
//! 3. decrypt everything and verify the SHA-1 or 16-bit checksum
//! 4. verify the recovered secret MPIs against the public key
//!
//! Almost every wrong phrase is rejected at step 2. [`run_tester`] is the tester
//! thread body.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha1::{Digest, Sha1};

use crate::attack::AttackContext;
use crate::channel::BoundedChannel;
use crate::crypto::CfbCipher;
use crate::error::{Error, Result};
use crate::guessers::BATCH_SIZE;
use crate::key::Key;
use crate::phrase::PhraseBlock;
use crate::s2k::KeyDeriver;

/// Candidates tested between two looks at the attack status.
pub const STATUS_POLL_INTERVAL: u32 = 128;

const SHA1_LEN: usize = 20;

/// Per-thread phrase checker for one key.
///
/// Holds its own derivation and decryption buffers, so each tester thread needs its
/// own instance.
#[derive(Debug)]
pub struct Cracker {
    key: Arc<Key>,
    cipher: CfbCipher,
    deriver: KeyDeriver,
    session_key: Vec<u8>,
    plaintext: Vec<u8>,
}

impl Cracker {
    /// Prepares a checker for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] for keys other than version 4 and for
    /// ciphers, hashes or S2K specifiers that are not handled, and [`Error::Key`] when
    /// the IV or encrypted data cannot belong to the cipher.
    pub fn new(key: Arc<Key>) -> Result<Self> {
        if key.version != 4 {
            return Err(Error::UnsupportedAlgorithm(format!(
                "version {} keys are not supported",
                key.version
            )));
        }
        let cipher = CfbCipher::for_algorithm(key.s2k.cipher)?;
        let deriver = KeyDeriver::new(&key.s2k, cipher.key_size())?;

        if key.s2k.iv.len() != cipher.block_size() {
            return Err(Error::Key(format!(
                "iv is {} bytes, {} needs {}",
                key.s2k.iv.len(),
                key.s2k.cipher,
                cipher.block_size()
            )));
        }
        let trailer = if key.s2k.usage == 254 { SHA1_LEN } else { 2 };
        if key.data.len() < cipher.block_size().max(trailer + 3) {
            return Err(Error::Key(format!(
                "encrypted data too short ({} bytes)",
                key.data.len()
            )));
        }

        let session_key = vec![0u8; cipher.key_size()];
        let plaintext = vec![0u8; key.data.len()];
        Ok(Self {
            key,
            cipher,
            deriver,
            session_key,
            plaintext,
        })
    }

    /// Returns true if `phrase` unlocks the key.
    pub fn check(&mut self, phrase: &[u8]) -> bool {
        self.deriver.derive(phrase, &mut self.session_key);

        let block = self.cipher.block_size();
        let head = &mut self.plaintext[..block];
        head.copy_from_slice(&self.key.data[..block]);
        if self
            .cipher
            .decrypt(&self.session_key, &self.key.s2k.iv, head)
            .is_err()
            || !self.key.quick_check(head)
        {
            return false;
        }

        self.plaintext.copy_from_slice(&self.key.data);
        if self
            .cipher
            .decrypt(&self.session_key, &self.key.s2k.iv, &mut self.plaintext)
            .is_err()
        {
            return false;
        }

        match verify_checksum(self.key.s2k.usage, &self.plaintext) {
            Some(secret) => self.key.verify(secret),
            None => false,
        }
    }
}

/// Checks the trailer and returns the secret material in front of it.
fn verify_checksum(usage: u8, plaintext: &[u8]) -> Option<&[u8]> {
    if usage == 254 {
        let split = plaintext.len().checked_sub(SHA1_LEN)?;
        let (secret, digest) = plaintext.split_at(split);
        (Sha1::digest(secret)[..] == *digest).then_some(secret)
    } else {
        let split = plaintext.len().checked_sub(2)?;
        let (secret, stored) = plaintext.split_at(split);
        let sum = secret
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
        (sum == u16::from_be_bytes([stored[0], stored[1]])).then_some(secret)
    }
}

/// Tests candidates from `input` until a sentinel arrives.
///
/// The status is polled every [`STATUS_POLL_INTERVAL`] candidates. Once the attack
/// has succeeded or failed, or `abort` is raised, the thread keeps taking items
/// without testing them so upstream stages never block, and still exits only on its
/// sentinel. Items taken in the same batch behind that sentinel are put back, so each
/// exiting tester consumes exactly one sentinel. Returns the number of phrases tested.
pub fn run_tester(
    cracker: &mut Cracker,
    input: &BoundedChannel<PhraseBlock>,
    ctx: &AttackContext,
    abort: &AtomicBool,
) -> u64 {
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut tested = 0u64;
    let mut since_poll = 0u32;
    let mut draining = false;

    loop {
        batch.clear();
        input.take_n(BATCH_SIZE, &mut batch);
        draining = draining || abort.load(Ordering::Acquire);

        let end = batch.iter().position(PhraseBlock::is_sentinel);
        for phrase in &batch[..end.unwrap_or(batch.len())] {
            since_poll += 1;
            if since_poll >= STATUS_POLL_INTERVAL {
                since_poll = 0;
                draining = draining || ctx.status().is_final();
            }
            if draining {
                continue;
            }
            tested += 1;
            if cracker.check(phrase.as_bytes()) {
                ctx.phrase_found(phrase.as_bytes());
                draining = true;
            }
        }

        if let Some(end) = end {
            input.put_n(batch.drain(end + 1..));
            return tested;
        }
    }
}
