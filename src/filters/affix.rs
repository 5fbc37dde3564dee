//! Prefix and suffix expansion.

use crate::phrase::PhraseBlock;

/// Wraps each candidate in every configured prefix and suffix.
///
/// Outputs are ordered prefix-major. An unset side contributes a single empty string,
/// so with only prefixes the output is one copy per prefix, and with neither side set
/// the input passes through unchanged.
///
/// # Example
///
/// ```rust
/// use phrasehound::filters::PrefixSuffixFilter;
/// use phrasehound::PhraseBlock;
///
/// let filter = PrefixSuffixFilter::new(&["x", "y"], &["1", "2"]);
/// let mut out = Vec::new();
/// filter.expand(&PhraseBlock::from("w"), &mut out);
/// let words: Vec<_> = out.iter().map(|b| b.to_string_lossy()).collect();
/// assert_eq!(words, ["xw1", "xw2", "yw1", "yw2"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSuffixFilter {
    prefixes: Vec<Vec<u8>>,
    suffixes: Vec<Vec<u8>>,
}

impl PrefixSuffixFilter {
    /// Builds a filter from prefix and suffix lists; either may be empty.
    pub fn new<S: AsRef<str>>(prefixes: &[S], suffixes: &[S]) -> Self {
        Self {
            prefixes: axis(prefixes),
            suffixes: axis(suffixes),
        }
    }

    /// Number of outputs per input.
    pub fn fan_out(&self) -> usize {
        self.prefixes.len() * self.suffixes.len()
    }

    /// Appends every wrapped form of `phrase` to `out`.
    pub fn expand(&self, phrase: &PhraseBlock, out: &mut Vec<PhraseBlock>) {
        out.reserve(self.fan_out());
        for prefix in &self.prefixes {
            for suffix in &self.suffixes {
                out.push(phrase.wrapped(prefix, suffix));
            }
        }
    }
}

fn axis<S: AsRef<str>>(values: &[S]) -> Vec<Vec<u8>> {
    if values.is_empty() {
        vec![Vec::new()]
    } else {
        values.iter().map(|v| v.as_ref().as_bytes().to_vec()).collect()
    }
}
