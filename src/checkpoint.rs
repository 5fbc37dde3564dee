//! Checkpoints for resumable attacks.
//!
//! A [`Checkpoint`] is an ordered list of `(tag, value)` entries. The controller writes
//! a fixed section order: the attack options as a run of `arg` entries, followed by
//! whatever progress fields the guesser needs to continue exactly where it stopped.
//!
//! ```text
//!   arg       = --guesser=incremental
//!   arg       = --option=charset=abcdefgh
//!   arg       = --jobs=2
//!   length    = 4
//!   indexes   = 3,0,7,1,0,0
//!   has_next  = true
//! ```
//!
//! Producers and consumers of that sequence only see the [`StateWriter`] and
//! [`StateReader`] traits. On disk the checkpoint is a pickle document written
//! atomically with owner-only permissions.
//!
//! # Example
//!
//! ```rust
//! use phrasehound::checkpoint::{Checkpoint, StateReader, StateWriter};
//!
//! let mut checkpoint = Checkpoint::new();
//! checkpoint.put_usize("length", 3);
//! checkpoint.put_u32_list("indexes", &[1, 0, 2]);
//!
//! let mut reader = checkpoint.reader();
//! assert_eq!(reader.get_usize("length").unwrap(), 3);
//! assert_eq!(reader.get_u32_list("indexes").unwrap(), vec![1, 0, 2]);
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current on-disk checkpoint revision.
pub const CHECKPOINT_REVISION: u32 = 1;

/// Sink for checkpoint entries.
///
/// Only [`put_str`](Self::put_str) must be implemented; the typed helpers render
/// their values as text.
pub trait StateWriter {
    /// Appends one entry.
    fn put_str(&mut self, tag: &str, value: &str);

    /// Appends an unsigned integer entry.
    fn put_usize(&mut self, tag: &str, value: usize) {
        self.put_str(tag, &value.to_string());
    }

    /// Appends a comma-separated list of unsigned integers.
    fn put_u32_list(&mut self, tag: &str, values: &[u32]) {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.put_str(tag, &joined);
    }

    /// Appends a boolean entry.
    fn put_bool(&mut self, tag: &str, value: bool) {
        self.put_str(tag, if value { "true" } else { "false" });
    }
}

/// Cursor over checkpoint entries.
///
/// Readers consume entries in the order they were written. The typed getters
/// expect the entry under the cursor to carry the requested tag; a mismatch or
/// the end of the sequence is reported as [`Error::MissingState`].
pub trait StateReader {
    /// Tag of the entry under the cursor, or `None` once exhausted.
    fn peek_tag(&self) -> Option<&str>;

    /// Returns the value under the cursor and advances.
    fn next_value(&mut self) -> Option<String>;

    /// Reads the entry tagged `tag` as text.
    fn get_str(&mut self, tag: &str) -> Result<String> {
        let mismatch = match self.peek_tag() {
            Some(current) if current == tag => None,
            Some(current) => Some(format!("expected tag '{}', found '{}'", tag, current)),
            None => Some(format!("tag '{}' is missing", tag)),
        };
        if let Some(message) = mismatch {
            return Err(Error::MissingState(message));
        }
        self.next_value()
            .ok_or_else(|| Error::MissingState(format!("tag '{}' is missing", tag)))
    }

    /// Reads the entry tagged `tag` as an unsigned integer.
    fn get_usize(&mut self, tag: &str) -> Result<usize> {
        let value = self.get_str(tag)?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::State(format!("tag '{}': not a number: {}", tag, value)))
    }

    /// Reads the entry tagged `tag` as a comma-separated integer list.
    fn get_u32_list(&mut self, tag: &str) -> Result<Vec<u32>> {
        let value = self.get_str(tag)?;
        if value.trim().is_empty() {
            return Ok(Vec::new());
        }
        value
            .split(',')
            .map(|part| {
                part.trim()
                    .parse()
                    .map_err(|_| Error::State(format!("tag '{}': not a number: {}", tag, part)))
            })
            .collect()
    }

    /// Reads the entry tagged `tag` as a boolean.
    fn get_bool(&mut self, tag: &str) -> Result<bool> {
        let value = self.get_str(tag)?;
        match value.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(Error::State(format!("tag '{}': not a boolean: {}", tag, other))),
        }
    }
}

/// Serialized progress of an interrupted attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format revision, [`CHECKPOINT_REVISION`] for files written by this version.
    pub revision: u32,
    /// RFC 3339 time at which the checkpoint was taken.
    pub saved_at: String,
    entries: Vec<(String, String)>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint {
    /// Creates an empty checkpoint stamped with the current time.
    pub fn new() -> Self {
        Self {
            revision: CHECKPOINT_REVISION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            entries: Vec::new(),
        }
    }

    /// All entries in write order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Returns a reader positioned at the first entry.
    pub fn reader(&self) -> CheckpointReader<'_> {
        CheckpointReader {
            entries: &self.entries,
            pos: 0,
        }
    }

    /// Checks revision and entry tags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] for an unknown revision or an empty tag.
    pub fn validate(&self) -> Result<()> {
        if self.revision != CHECKPOINT_REVISION {
            return Err(Error::State(format!(
                "unsupported checkpoint revision {} (expected {})",
                self.revision, CHECKPOINT_REVISION
            )));
        }
        if let Some(index) = self.entries.iter().position(|(tag, _)| tag.trim().is_empty()) {
            return Err(Error::State(format!("entry {} has an empty tag", index)));
        }
        if chrono::DateTime::parse_from_rfc3339(&self.saved_at).is_err() {
            return Err(Error::State(format!(
                "invalid checkpoint timestamp: {}",
                self.saved_at
            )));
        }
        Ok(())
    }

    /// Reads and validates a checkpoint file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if the file cannot be opened, decoded or validated.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::State(format!("cannot open state file: {}", e)))?;
        let reader = BufReader::new(file);
        let checkpoint: Self = serde_pickle::from_reader(reader, Default::default())
            .map_err(|e| Error::State(format!("cannot parse state file: {}", e)))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Writes the checkpoint atomically.
    ///
    /// The pickle is staged in a uniquely named file next to `path` (owner-only on
    /// Unix) and persisted over `path` once complete, so a crash never leaves a torn
    /// state file behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if any step fails.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            Error::State(format!("cannot stage state file in {}: {}", dir.display(), e))
        })?;

        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_pickle::to_writer(&mut writer, self, Default::default())
                .map_err(|e| Error::State(format!("cannot encode checkpoint: {}", e)))?;
            writer
                .flush()
                .map_err(|e| Error::State(format!("cannot write checkpoint: {}", e)))?;
        }

        staged
            .persist(path)
            .map_err(|e| Error::State(format!("cannot replace {}: {}", path.display(), e.error)))?;
        Ok(())
    }
}

impl StateWriter for Checkpoint {
    fn put_str(&mut self, tag: &str, value: &str) {
        self.entries.push((tag.to_string(), value.to_string()));
    }
}

/// [`StateReader`] over a borrowed [`Checkpoint`].
#[derive(Debug, Clone)]
pub struct CheckpointReader<'a> {
    entries: &'a [(String, String)],
    pos: usize,
}

impl StateReader for CheckpointReader<'_> {
    fn peek_tag(&self) -> Option<&str> {
        self.entries.get(self.pos).map(|(tag, _)| tag.as_str())
    }

    fn next_value(&mut self) -> Option<String> {
        let value = self.entries.get(self.pos).map(|(_, value)| value.clone());
        if value.is_some() {
            self.pos += 1;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_typed_round_trip() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.put_str("arg", "--jobs");
        checkpoint.put_usize("length", 7);
        checkpoint.put_u32_list("indexes", &[0, 4, 2]);
        checkpoint.put_bool("has_next", false);

        let mut reader = checkpoint.reader();
        assert_eq!(reader.get_str("arg").unwrap(), "--jobs");
        assert_eq!(reader.get_usize("length").unwrap(), 7);
        assert_eq!(reader.get_u32_list("indexes").unwrap(), vec![0, 4, 2]);
        assert!(!reader.get_bool("has_next").unwrap());
        assert_eq!(reader.peek_tag(), None);
    }

    #[test]
    fn test_wrong_tag_is_missing_state() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.put_usize("length", 1);

        let mut reader = checkpoint.reader();
        assert!(matches!(
            reader.get_usize("indexes"),
            Err(Error::MissingState(_))
        ));
        // The cursor did not move.
        assert_eq!(reader.get_usize("length").unwrap(), 1);
        assert!(matches!(reader.get_bool("has_next"), Err(Error::MissingState(_))));
    }

    #[test]
    fn test_bad_values_are_state_errors() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.put_str("length", "seven");
        checkpoint.put_str("has_next", "maybe");
        checkpoint.put_str("indexes", "1,x");

        let mut reader = checkpoint.reader();
        assert!(matches!(reader.get_usize("length"), Err(Error::State(_))));
        assert!(matches!(reader.get_bool("has_next"), Err(Error::State(_))));
        assert!(matches!(reader.get_u32_list("indexes"), Err(Error::State(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phrasehound.state");

        let mut checkpoint = Checkpoint::new();
        checkpoint.put_str("arg", "--guesser");
        checkpoint.put_str("arg", "dictionary");
        checkpoint.put_usize("cursor", 42);
        checkpoint.write_to_file(&path).unwrap();

        let loaded = Checkpoint::read_from_file(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_state_file_with_tmp_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phrasehound.tmp");

        let mut first = Checkpoint::new();
        first.put_usize("cursor", 1);
        first.write_to_file(&path).unwrap();
        let mut second = Checkpoint::new();
        second.put_usize("cursor", 2);
        second.write_to_file(&path).unwrap();

        assert_eq!(Checkpoint::read_from_file(&path).unwrap(), second);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("phrasehound.tmp")]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_large_counters_are_not_truncated() {
        let large = u32::MAX as usize + 7;
        let mut checkpoint = Checkpoint::new();
        checkpoint.put_usize("cursor", large);
        assert_eq!(checkpoint.reader().get_usize("cursor").unwrap(), large);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("phrasehound.state");
        Checkpoint::new().write_to_file(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_rejects_foreign_revision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phrasehound.state");

        let mut checkpoint = Checkpoint::new();
        checkpoint.revision = 99;
        checkpoint.write_to_file(&path).unwrap();

        assert!(matches!(
            Checkpoint::read_from_file(&path),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phrasehound.state");
        std::fs::write(&path, b"definitely not a pickle").unwrap();

        assert!(matches!(
            Checkpoint::read_from_file(&path),
            Err(Error::State(_))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn u32_lists_survive(values in prop::collection::vec(any::<u32>(), 0..32)) {
            let mut checkpoint = Checkpoint::new();
            checkpoint.put_u32_list("indexes", &values);
            let mut reader = checkpoint.reader();
            prop_assert_eq!(reader.get_u32_list("indexes").unwrap(), values);
        }

        #[test]
        fn entries_keep_write_order(
            entries in prop::collection::vec(("[a-z_]{1,12}", ".{0,24}"), 0..16),
        ) {
            let mut checkpoint = Checkpoint::new();
            for (tag, value) in &entries {
                checkpoint.put_str(tag, value);
            }

            let mut reader = checkpoint.reader();
            for (tag, value) in &entries {
                prop_assert_eq!(reader.peek_tag(), Some(tag.as_str()));
                prop_assert_eq!(&reader.next_value().unwrap(), value);
            }
            prop_assert!(reader.next_value().is_none());
        }
    }
}
