//! Candidate phrase generators.
//!
//! A [`Guesser`] is configured from a string-keyed option map, initialised once and
//! then pulled for candidates one at a time. The pipeline does not pull directly:
//! [`run_guesser`] drives a guesser on its own thread, pushing batches of
//! [`BATCH_SIZE`] blocks into the first channel until the guesser runs dry or the
//! controller raises the abort flag.
//!
//! # Lifecycle
//!
//! ```text
//!   create(name) ──▶ setup(options) ──▶ init() ──────────┐
//!                                   └─▶ load_state(r) ───┤
//!                                                        ▼
//!                                              guess() ... guess() = false
//!                                                        │
//!                                                        ▼
//!                                                  save_state(w)
//! ```
//!
//! # Available Guessers
//!
//! | Name | Resumable | Exhausts |
//! |------|-----------|----------|
//! | `incremental` | yes | after the longest length |
//! | `random` | no | never |
//! | `dictionary` | yes | after the last line |

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::attack::AttackContext;
use crate::channel::BoundedChannel;
use crate::checkpoint::{StateReader, StateWriter};
use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::phrase::PhraseBlock;
use crate::plog_fmt;

mod charset;
mod dictionary;
mod incremental;
mod random;

pub use charset::CharsetOptions;
pub use dictionary::DictionaryGuesser;
pub use incremental::IncrementalGuesser;
pub use random::RandomGuesser;

/// Option map handed to [`Guesser::setup`].
pub type GuesserOptions = BTreeMap<String, String>;

/// Number of candidates a guesser thread produces per channel write.
pub const BATCH_SIZE: usize = 8;

const CATALOGUE: &[(&str, &str)] = &[
    (
        incremental::NAME,
        "every string over a charset, shortest first, in charset order",
    ),
    (random::NAME, "random strings over a charset, never ends"),
    (dictionary::NAME, "lines of a word list in file order"),
];

/// A source of candidate pass phrases.
///
/// Implementations hold only their own progress; they never touch channels or the
/// attack status.
pub trait Guesser: Send {
    /// Name used on the command line and in logs.
    fn name(&self) -> &'static str;

    /// Recognised option keys with a short description each.
    fn options(&self) -> &'static [(&'static str, &'static str)];

    /// Applies options. Unknown keys are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for values that cannot be parsed.
    fn setup(&mut self, options: &GuesserOptions) -> Result<()>;

    /// Validates the configuration and resets progress to the start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] or [`Error::Io`] when the guesser cannot run.
    fn init(&mut self) -> Result<()>;

    /// Writes the next candidate into `out`. Returns false once exhausted, leaving
    /// `out` untouched.
    fn guess(&mut self, out: &mut PhraseBlock) -> bool;

    /// Writes the progress needed to continue after the last guessed phrase.
    fn save_state(&self, _writer: &mut dyn StateWriter) {}

    /// Restores progress saved by [`save_state`](Self::save_state). Replaces
    /// [`init`](Self::init) on resume.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingState`] or [`Error::State`] for incomplete or
    /// inconsistent checkpoints.
    fn load_state(&mut self, _reader: &mut dyn StateReader) -> Result<()> {
        self.init()
    }
}

/// Instantiates a guesser by name.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for unknown names.
///
/// # Example
///
/// ```rust
/// use phrasehound::guessers::{self, GuesserOptions};
/// use phrasehound::PhraseBlock;
///
/// let mut guesser = guessers::create("incremental").unwrap();
/// let options: GuesserOptions = [("charset", "ab"), ("max", "2")]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v.to_string()))
///     .collect();
/// guesser.setup(&options).unwrap();
/// guesser.init().unwrap();
///
/// let mut block = PhraseBlock::default();
/// assert!(guesser.guess(&mut block));
/// assert_eq!(block.as_bytes(), b"a");
/// ```
pub fn create(name: &str) -> Result<Box<dyn Guesser>> {
    match name {
        incremental::NAME => Ok(Box::new(IncrementalGuesser::new())),
        random::NAME => Ok(Box::new(RandomGuesser::new())),
        dictionary::NAME => Ok(Box::new(DictionaryGuesser::new())),
        other => Err(Error::InvalidConfig(format!(
            "unknown guesser '{}' (try --list-guessers)",
            other
        ))),
    }
}

/// Names and descriptions of every guesser [`create`] knows.
pub fn catalogue() -> &'static [(&'static str, &'static str)] {
    CATALOGUE
}

pub(crate) fn warn_unknown_option(guesser: &str, key: &str) {
    plog_fmt!(
        LogLevel::Warn,
        "Ignoring unknown option '{}' for guesser {}",
        key,
        guesser
    );
}

/// Drives `guesser` until it is exhausted or `abort` is raised.
///
/// Candidates are written to `output` in batches. When the guesser runs dry the short
/// final batch is still delivered and the context is told exactly once. Returns the
/// number of candidates produced.
pub fn run_guesser(
    guesser: &mut dyn Guesser,
    output: &BoundedChannel<PhraseBlock>,
    ctx: &AttackContext,
    abort: &AtomicBool,
    rate_interval: Duration,
) -> u64 {
    let mut batch: Vec<PhraseBlock> = vec![PhraseBlock::default(); BATCH_SIZE];
    let mut produced: u64 = 0;
    let mut window_start = Instant::now();
    let mut window_count: u64 = 0;

    while !abort.load(Ordering::Acquire) {
        let mut n = 0;
        while n < BATCH_SIZE && guesser.guess(&mut batch[n]) {
            n += 1;
        }

        if n > 0 {
            window_count += n as u64;
            let elapsed = window_start.elapsed();
            if elapsed >= rate_interval {
                plog_fmt!(
                    LogLevel::Info,
                    "Rate: {} phrases / second. Phrase: {}",
                    (window_count as f64 / elapsed.as_secs_f64()) as u64,
                    batch[n - 1].to_string_lossy()
                );
                window_start = Instant::now();
                window_count = 0;
            }
            produced += n as u64;
            output.put_n(batch[..n].iter_mut().map(std::mem::take));
        }

        if n < BATCH_SIZE {
            plog_fmt!(
                LogLevel::Notice,
                "Guesser {} exhausted after {} phrases",
                guesser.name(),
                produced
            );
            ctx.exhausted();
            break;
        }
    }

    produced
}
