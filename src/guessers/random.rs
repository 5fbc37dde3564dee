//! Random phrases over a charset.
//!
//! Lengths and characters are drawn uniformly. The stream never ends, so a random
//! attack only stops on success, error or interrupt, and an interrupted run starts
//! over with a fresh generator.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::guessers::charset::{self, CharsetOptions};
use crate::guessers::{Guesser, GuesserOptions};
use crate::phrase::PhraseBlock;

pub(crate) const NAME: &str = "random";

/// Uniform random guesser.
#[derive(Debug, Default)]
pub struct RandomGuesser {
    options: CharsetOptions,
    rng: Option<StdRng>,
}

impl RandomGuesser {
    /// Creates an unconfigured guesser with default charset options.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Guesser for RandomGuesser {
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
        let rng = StdRng::from_rng(OsRng)
            .map_err(|e| Error::InvalidConfig(format!("cannot seed random generator: {}", e)))?;
        self.rng = Some(rng);
        Ok(())
    }

    fn guess(&mut self, out: &mut PhraseBlock) -> bool {
        let Some(rng) = self.rng.as_mut() else {
            return false;
        };
        let charset = &self.options.charset;
        let length = rng.gen_range(self.options.min..=self.options.max);
        for byte in out.fill(length).iter_mut() {
            *byte = charset[rng.gen_range(0..charset.len())];
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::guessers::tests::options;

    #[test]
    fn test_bounds_and_alphabet() {
        let mut g = RandomGuesser::new();
        g.setup(&options(&[("charset", "xyz"), ("min", "2"), ("max", "5")]))
            .unwrap();
        g.init().unwrap();

        let mut block = PhraseBlock::default();
        let mut lengths = std::collections::BTreeSet::new();
        for _ in 0..2000 {
            assert!(g.guess(&mut block));
            assert!((2..=5).contains(&block.len()));
            assert!(block.as_bytes().iter().all(|b| b"xyz".contains(b)));
            lengths.insert(block.len());
        }
        assert_eq!(lengths.len(), 4);
    }

    #[test]
    fn test_guess_before_init() {
        let mut g = RandomGuesser::new();
        assert!(!g.guess(&mut PhraseBlock::default()));
    }

    #[test]
    fn test_no_state_and_reinit_on_load() {
        let mut g = RandomGuesser::new();
        g.setup(&options(&[("charset", "ab"), ("max", "3")])).unwrap();
        g.init().unwrap();

        let mut checkpoint = Checkpoint::new();
        g.save_state(&mut checkpoint);
        assert!(checkpoint.entries().is_empty());

        let mut fresh = RandomGuesser::new();
        fresh.setup(&options(&[("charset", "ab"), ("max", "3")])).unwrap();
        fresh.load_state(&mut checkpoint.reader()).unwrap();
        assert!(fresh.guess(&mut PhraseBlock::default()));
    }
}
