//! Transforms between the guesser and the testers.
//!
//! A [`Filter`] maps one candidate to zero or more candidates. Filter stages sit
//! between two channels and are run by [`run_filter`] on one or more threads.
//!
//! | Filter | Output per input | Workers |
//! |--------|------------------|---------|
//! | [`PrefixSuffixFilter`] | `prefixes × suffixes` wrapped copies | 1 |
//! | [`RegexFilter`] | the input or nothing | `--regex-jobs` |

use std::sync::atomic::{AtomicBool, Ordering};

use crate::channel::BoundedChannel;
use crate::phrase::PhraseBlock;

mod affix;
mod rules;

pub use affix::PrefixSuffixFilter;
pub use rules::{RegexFilter, Rule};

/// A pipeline filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Allow/deny by regular expressions.
    Regex(RegexFilter),
    /// Prefix and suffix expansion.
    PrefixSuffix(PrefixSuffixFilter),
}

impl Filter {
    /// Short name used for thread names and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Regex(_) => "regex",
            Filter::PrefixSuffix(_) => "affix",
        }
    }

    /// Appends the candidates derived from `phrase` to `out`.
    pub fn apply(&self, phrase: &PhraseBlock, out: &mut Vec<PhraseBlock>) {
        match self {
            Filter::Regex(filter) => {
                if filter.matches(phrase.as_bytes()) {
                    out.push(phrase.clone());
                }
            }
            Filter::PrefixSuffix(filter) => filter.expand(phrase, out),
        }
    }
}

/// Moves candidates from `input` through `filter` into `output`.
///
/// Stops on the first sentinel taken from `input`. Once `abort` is raised, candidates
/// are still taken but dropped, so upstream never blocks and the thread still exits on
/// exactly one sentinel. Returns the number of candidates forwarded.
pub fn run_filter(
    filter: &Filter,
    input: &BoundedChannel<PhraseBlock>,
    output: &BoundedChannel<PhraseBlock>,
    abort: &AtomicBool,
) -> u64 {
    let mut derived = Vec::new();
    let mut forwarded = 0u64;

    loop {
        let phrase = input.take();
        if phrase.is_sentinel() {
            break;
        }
        if abort.load(Ordering::Acquire) {
            continue;
        }
        filter.apply(&phrase, &mut derived);
        for block in derived.drain(..) {
            output.put(block);
            forwarded += 1;
        }
    }

    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_filter_until_sentinel() {
        let filter = Filter::Regex(RegexFilter::from_rules("+ ^a\n- z$\n"));
        let input = BoundedChannel::new(8);
        let output = BoundedChannel::new(8);
        for word in ["apple", "banana", "az", "avocado"] {
            input.put(PhraseBlock::from(word));
        }
        input.put(PhraseBlock::sentinel());
        input.put(PhraseBlock::from("after"));

        let forwarded = run_filter(&filter, &input, &output, &AtomicBool::new(false));
        assert_eq!(forwarded, 2);
        assert_eq!(output.take().as_bytes(), b"apple");
        assert_eq!(output.take().as_bytes(), b"avocado");
        // Items behind the sentinel stay queued.
        assert_eq!(input.size(), 1);
    }

    #[test]
    fn test_run_filter_drops_candidates_after_abort() {
        let filter = Filter::PrefixSuffix(PrefixSuffixFilter::new(&["x"], &[]));
        let input = BoundedChannel::new(4);
        let output = BoundedChannel::new(4);
        input.put(PhraseBlock::from("w"));
        input.put(PhraseBlock::sentinel());
        input.put(PhraseBlock::sentinel());
        assert_eq!(run_filter(&filter, &input, &output, &AtomicBool::new(true)), 0);
        assert_eq!(output.size(), 0);
        // Only its own sentinel is consumed.
        assert_eq!(input.size(), 1);
    }

    #[test]
    fn test_apply_dispatch() {
        let mut out = Vec::new();
        let affix = Filter::PrefixSuffix(PrefixSuffixFilter::new(&["x"], &["1", "2"]));
        affix.apply(&PhraseBlock::from("w"), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(affix.name(), "affix");

        let regex = Filter::Regex(RegexFilter::from_rules("- w"));
        regex.apply(&PhraseBlock::from("w"), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(regex.name(), "regex");
    }
}
