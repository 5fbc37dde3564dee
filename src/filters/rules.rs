//! Regular-expression allow/deny rules.
//!
//! Rule files are line oriented:
//!
//! ```text
//! # must start with a capital letter
//! + ^[A-Z]
//! # but not end in a digit
//! - [0-9]$
//! ```
//!
//! A candidate passes when it matches every `+` rule and no `-` rule. Rules are
//! checked in file order and checking stops at the first failure.

use std::path::Path;

use regex::bytes::Regex;

use crate::config::LogLevel;
use crate::error::Result;
use crate::plog_fmt;

/// One compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Candidate must match.
    Required(Regex),
    /// Candidate must not match.
    Forbidden(Regex),
}

impl Rule {
    fn accepts(&self, phrase: &[u8]) -> bool {
        match self {
            Rule::Required(re) => re.is_match(phrase),
            Rule::Forbidden(re) => !re.is_match(phrase),
        }
    }
}

/// Ordered rule list.
///
/// # Example
///
/// ```rust
/// use phrasehound::filters::RegexFilter;
///
/// let filter = RegexFilter::from_rules("+ ^a\n- z$\n");
/// assert!(filter.matches(b"apple"));
/// assert!(!filter.matches(b"banana"));
/// assert!(!filter.matches(b"az"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegexFilter {
    rules: Vec<Rule>,
}

impl RegexFilter {
    /// Loads rules from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read. Bad rule
    /// lines are not errors.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_rules(&content))
    }

    /// Parses rule text, warning about and skipping malformed lines.
    pub fn from_rules(text: &str) -> Self {
        let mut rules = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(rule) => rules.push(rule),
                Err(reason) => plog_fmt!(
                    LogLevel::Warn,
                    "Skipping regex rule on line {}: {}",
                    number + 1,
                    reason
                ),
            }
        }
        Self { rules }
    }

    /// The compiled rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True if `phrase` satisfies every rule.
    pub fn matches(&self, phrase: &[u8]) -> bool {
        self.rules.iter().all(|rule| rule.accepts(phrase))
    }
}

fn parse_line(line: &str) -> std::result::Result<Rule, String> {
    let mut chars = line.chars();
    let kind = chars.next();
    let pattern = chars.as_str().trim_start();
    if pattern.is_empty() {
        return Err("missing pattern".to_string());
    }
    let compile = |p: &str| Regex::new(p).map_err(|e| format!("bad pattern: {}", e));
    match kind {
        Some('+') => Ok(Rule::Required(compile(pattern)?)),
        Some('-') => Ok(Rule::Forbidden(compile(pattern)?)),
        _ => Err(format!("expected '+' or '-', got {:?}", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_required_and_forbidden() {
        let filter = RegexFilter::from_rules("+ ^a\n- z$");
        assert!(filter.matches(b"apple"));
        assert!(!filter.matches(b"banana"));
        assert!(!filter.matches(b"az"));
    }

    #[test]
    fn test_comments_blank_and_malformed_lines() {
        let filter = RegexFilter::from_rules(
            "# comment\n\n+ ^[0-9]+$\n* nonsense\n+\n- (unclosed\n  - 7  \n",
        );
        assert_eq!(filter.rules().len(), 2);
        assert!(filter.matches(b"123"));
        assert!(!filter.matches(b"1237"));
        assert!(!filter.matches(b"abc"));
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = RegexFilter::from_rules("");
        assert!(filter.matches(b"anything"));
    }

    #[test]
    fn test_non_utf8_phrases() {
        let filter = RegexFilter::from_rules("- ^x");
        assert!(filter.matches(&[0xff, 0xfe]));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "+ ^a").unwrap();
        let filter = RegexFilter::from_file(file.path()).unwrap();
        assert_eq!(filter.rules().len(), 1);

        assert!(matches!(
            RegexFilter::from_file(Path::new("/nonexistent/rules")),
            Err(Error::Io(_))
        ));
    }
}
