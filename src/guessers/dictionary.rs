//! Word list replay.

use std::path::PathBuf;

use crate::checkpoint::{StateReader, StateWriter};
use crate::error::{Error, Result};
use crate::guessers::{warn_unknown_option, Guesser, GuesserOptions};
use crate::phrase::PhraseBlock;

pub(crate) const NAME: &str = "dictionary";

const OPTIONS: &[(&str, &str)] = &[("dictionary", "word list, one phrase per line")];

const TAG_CURSOR: &str = "cursor";

/// Replays the lines of a file in order.
///
/// The whole file is loaded at init. Empty lines are skipped and a trailing `\r` is
/// stripped, so DOS word lists work unchanged.
#[derive(Debug, Clone, Default)]
pub struct DictionaryGuesser {
    path: Option<PathBuf>,
    words: Vec<Vec<u8>>,
    cursor: usize,
}

impl DictionaryGuesser {
    /// Creates a guesser with no word list configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when no words are loaded.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn load_words(&mut self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            Error::InvalidConfig("dictionary guesser needs -o dictionary=FILE".to_string())
        })?;
        let content = std::fs::read(path)?;
        self.words = content
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(<[u8]>::to_vec)
            .collect();
        Ok(())
    }
}

impl Guesser for DictionaryGuesser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn options(&self) -> &'static [(&'static str, &'static str)] {
        OPTIONS
    }

    fn setup(&mut self, options: &GuesserOptions) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                "dictionary" => self.path = Some(PathBuf::from(value)),
                _ => warn_unknown_option(NAME, key),
            }
        }
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        self.load_words()?;
        self.cursor = 0;
        Ok(())
    }

    fn guess(&mut self, out: &mut PhraseBlock) -> bool {
        match self.words.get(self.cursor) {
            Some(word) => {
                out.assign(word);
                self.cursor += 1;
                true
            }
            None => false,
        }
    }

    fn save_state(&self, writer: &mut dyn StateWriter) {
        writer.put_usize(TAG_CURSOR, self.cursor);
    }

    fn load_state(&mut self, reader: &mut dyn StateReader) -> Result<()> {
        self.load_words()?;
        let cursor = reader.get_usize(TAG_CURSOR)?;
        if cursor > self.words.len() {
            return Err(Error::State(format!(
                "cursor {} beyond the {} words of the dictionary",
                cursor,
                self.words.len()
            )));
        }
        self.cursor = cursor;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::guessers::tests::options;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn word_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn guesser_for(file: &NamedTempFile) -> DictionaryGuesser {
        let mut g = DictionaryGuesser::new();
        g.setup(&options(&[(
            "dictionary",
            file.path().to_str().unwrap(),
        )]))
        .unwrap();
        g
    }

    #[test]
    fn test_replays_lines_in_order() {
        let file = word_file("alpha\r\n\nbeta\ngamma\n");
        let mut g = guesser_for(&file);
        g.init().unwrap();
        assert_eq!(g.len(), 3);

        let mut block = PhraseBlock::default();
        let mut seen = Vec::new();
        while g.guess(&mut block) {
            seen.push(block.to_string_lossy());
        }
        assert_eq!(seen, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_missing_path_and_file() {
        let mut g = DictionaryGuesser::new();
        assert!(matches!(g.init(), Err(Error::InvalidConfig(_))));

        g.setup(&options(&[("dictionary", "/nonexistent/words.txt")]))
            .unwrap();
        assert!(matches!(g.init(), Err(Error::Io(_))));
    }

    #[test]
    fn test_resume_from_cursor() {
        let file = word_file("one\ntwo\nthree\n");
        let mut g = guesser_for(&file);
        g.init().unwrap();
        let mut block = PhraseBlock::default();
        assert!(g.guess(&mut block));

        let mut checkpoint = Checkpoint::new();
        g.save_state(&mut checkpoint);

        let mut resumed = guesser_for(&file);
        resumed.load_state(&mut checkpoint.reader()).unwrap();
        assert!(resumed.guess(&mut block));
        assert_eq!(block.as_bytes(), b"two");
    }

    #[test]
    fn test_cursor_beyond_end() {
        let file = word_file("one\n");
        let mut checkpoint = Checkpoint::new();
        checkpoint.put_usize("cursor", 7);
        let mut g = guesser_for(&file);
        assert!(matches!(
            g.load_state(&mut checkpoint.reader()),
            Err(Error::State(_))
        ));
    }
}
