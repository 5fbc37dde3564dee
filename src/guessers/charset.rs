//! Options shared by guessers that build phrases from a character set.

use crate::error::{Error, Result};
use crate::guessers::{warn_unknown_option, GuesserOptions};

pub(crate) const OPTIONS: &[(&str, &str)] = &[
    ("charset", "characters to build phrases from (default: printable ASCII)"),
    ("min", "shortest phrase length (default 1)"),
    ("max", "longest phrase length (default 10)"),
];

const DEFAULT_MIN: usize = 1;
const DEFAULT_MAX: usize = 10;

/// Longest phrase length a charset guesser accepts.
pub const MAX_LENGTH: usize = 1024;

/// Character set and length bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetOptions {
    /// Bytes phrases are built from, in enumeration order.
    pub charset: Vec<u8>,
    /// Shortest length, at least 1.
    pub min: usize,
    /// Longest length.
    pub max: usize,
}

impl Default for CharsetOptions {
    fn default() -> Self {
        Self {
            charset: (32u8..=126).collect(),
            min: DEFAULT_MIN,
            max: DEFAULT_MAX,
        }
    }
}

impl CharsetOptions {
    /// Applies `charset`, `min` and `max` from `options`; other keys are warned about.
    pub(crate) fn apply(&mut self, guesser: &str, options: &GuesserOptions) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                "charset" => self.charset = value.as_bytes().to_vec(),
                "min" => self.min = parse_length(key, value)?,
                "max" => self.max = parse_length(key, value)?,
                _ => warn_unknown_option(guesser, key),
            }
        }
        Ok(())
    }

    /// Checks the bounds and charset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty charset, `min == 0`, `min > max`
    /// or `max` above [`MAX_LENGTH`].
    pub fn validate(&self) -> Result<()> {
        if self.charset.is_empty() {
            return Err(Error::InvalidConfig("charset is empty".to_string()));
        }
        if self.min == 0 {
            return Err(Error::InvalidConfig("min must be at least 1".to_string()));
        }
        if self.min > self.max {
            return Err(Error::InvalidConfig(format!(
                "min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        if self.max > MAX_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "max ({}) exceeds the longest supported phrase ({})",
                self.max, MAX_LENGTH
            )));
        }
        Ok(())
    }
}

fn parse_length(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} must be a number, got {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guessers::tests::options;

    #[test]
    fn test_defaults() {
        let opts = CharsetOptions::default();
        assert_eq!(opts.charset.len(), 95);
        assert_eq!(opts.charset[0], b' ');
        assert_eq!(*opts.charset.last().unwrap(), b'~');
        assert_eq!((opts.min, opts.max), (1, 10));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_apply() {
        let mut opts = CharsetOptions::default();
        opts.apply(
            "incremental",
            &options(&[("charset", "01"), ("min", "3"), ("max", " 5 "), ("colour", "red")]),
        )
        .unwrap();
        assert_eq!(opts.charset, b"01");
        assert_eq!((opts.min, opts.max), (3, 5));
    }

    #[test]
    fn test_invalid_values() {
        let mut opts = CharsetOptions::default();
        assert!(matches!(
            opts.apply("incremental", &options(&[("max", "lots")])),
            Err(Error::InvalidConfig(_))
        ));

        let empty = CharsetOptions {
            charset: Vec::new(),
            ..CharsetOptions::default()
        };
        assert!(empty.validate().is_err());

        let zero = CharsetOptions {
            min: 0,
            ..CharsetOptions::default()
        };
        assert!(zero.validate().is_err());

        let inverted = CharsetOptions {
            min: 4,
            max: 3,
            ..CharsetOptions::default()
        };
        assert!(matches!(inverted.validate(), Err(Error::InvalidConfig(_))));

        let huge = CharsetOptions {
            max: usize::MAX,
            ..CharsetOptions::default()
        };
        assert!(matches!(huge.validate(), Err(Error::InvalidConfig(_))));

        let longest = CharsetOptions {
            max: MAX_LENGTH,
            ..CharsetOptions::default()
        };
        assert!(longest.validate().is_ok());
    }
}
