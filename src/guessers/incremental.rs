//! Exhaustive enumeration over a charset.
//!
//! Phrases are produced length-major: all strings of length `min` first, then
//! `min + 1`, up to `max`. Within a length the order follows the charset like an
//! odometer whose rightmost wheel turns fastest. For charset `ab` and lengths 1..=2
//! the sequence is `a b aa ab ba bb`.

use crate::checkpoint::{StateReader, StateWriter};
use crate::error::{Error, Result};
use crate::guessers::charset::{self, CharsetOptions};
use crate::guessers::{Guesser, GuesserOptions};
use crate::phrase::PhraseBlock;

pub(crate) const NAME: &str = "incremental";

const TAG_LENGTH: &str = "length";
const TAG_INDEXES: &str = "indexes";
const TAG_HAS_NEXT: &str = "has_next";

/// Odometer-style exhaustive guesser.
#[derive(Debug, Clone, Default)]
pub struct IncrementalGuesser {
    options: CharsetOptions,
    length: usize,
    indexes: Vec<u32>,
    has_next: bool,
}

impl IncrementalGuesser {
    /// Creates an unconfigured guesser with default charset options.
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self) {
        let radix = self.options.charset.len() as u32;
        for pos in (0..self.length).rev() {
            self.indexes[pos] += 1;
            if self.indexes[pos] < radix {
                return;
            }
            self.indexes[pos] = 0;
        }
        // Every wheel wrapped: move on to the next length.
        self.length += 1;
        if self.length > self.options.max {
            self.has_next = false;
        }
    }
}

impl Guesser for IncrementalGuesser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn options(&self) -> &'static [(&'static str, &'static str)] {
        charset::OPTIONS
    }

    fn setup(&mut self, options: &GuesserOptions) -> Result<()> {
        self.options.apply(NAME, options)
    }

    fn init(&mut self) -> Result<()> {
        self.options.validate()?;
        self.length = self.options.min;
        self.indexes = vec![0; self.options.max];
        self.has_next = true;
        Ok(())
    }

    fn guess(&mut self, out: &mut PhraseBlock) -> bool {
        if !self.has_next {
            return false;
        }
        let charset = &self.options.charset;
        for (byte, &index) in out
            .fill(self.length)
            .iter_mut()
            .zip(&self.indexes[..self.length])
        {
            *byte = charset[index as usize];
        }
        self.advance();
        true
    }

    fn save_state(&self, writer: &mut dyn StateWriter) {
        writer.put_usize(TAG_LENGTH, self.length);
        writer.put_u32_list(TAG_INDEXES, &self.indexes);
        writer.put_bool(TAG_HAS_NEXT, self.has_next);
    }

    fn load_state(&mut self, reader: &mut dyn StateReader) -> Result<()> {
        self.options.validate()?;
        let length = reader.get_usize(TAG_LENGTH)?;
        let indexes = reader.get_u32_list(TAG_INDEXES)?;
        let has_next = reader.get_bool(TAG_HAS_NEXT)?;

        let (min, max) = (self.options.min, self.options.max);
        if length < min || length > max + 1 || (has_next && length > max) {
            return Err(Error::State(format!(
                "length {} outside {}..={}",
                length, min, max
            )));
        }
        if indexes.len() != max {
            return Err(Error::State(format!(
                "expected {} indexes, found {}",
                max,
                indexes.len()
            )));
        }
        let radix = self.options.charset.len() as u32;
        if indexes.iter().any(|&i| i >= radix) {
            return Err(Error::State(format!(
                "index beyond charset of {} characters",
                radix
            )));
        }

        self.length = length;
        self.indexes = indexes;
        self.has_next = has_next;
        Ok(())
    }
}
