//! Configuration management for phrasehound.
//!
//! Two kinds of settings exist. Process settings (logging, state file, pipeline
//! tuning) live in [`Config`] and may come from a TOML file. Attack settings (which
//! guesser, its options, filters, worker counts) live in [`AttackOptions`] and only
//! come from the command line, because they are stored in and restored from the
//! checkpoint as an argument vector.
//!
//! # Configuration Flow
//!
//! ```text
//!     ┌─────────────────┐
//!     │ Config::default │ ◄── Built-in defaults
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌────────────────────┐
//!     │ Config file     │ ◄───│ phrasehound.conf   │  (TOML, optional)
//!     │ exists?         │     │ or --config        │
//!     └────────┬────────┘     └────────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌────────────────────┐
//!     │ Apply CLI args  │ ◄───│ --loglevel, --state│
//!     │ (override)      │     │ PHRASEHOUND_STATE  │
//!     └────────┬────────┘     └────────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ Validate        │
//!     └─────────────────┘
//! ```
//!
//! # Example Configuration File
//!
//! ```toml
//! loglevel = "notice"              # debug, info, notice, warn, error
//! # logfile = "/var/log/phrasehound.log"
//! state_file = "phrasehound.state"
//! channel_capacity = 8192          # slots per pipeline channel, at least 8
//! rate_interval_secs = 2           # guessing rate report period
//! ```
//!
//! # What This Module Does NOT Do
//!
//! - **Guesser option validation**: each guesser checks its own keys in `setup`
//! - **Runtime reconfiguration**: settings are read once at startup

use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::checkpoint::{StateReader, StateWriter};
use crate::error::{Error, Result};
use crate::guessers::GuesserOptions;

/// Checkpoint tag under which attack arguments are stored.
pub const ARG_TAG: &str = "arg";

/// Log level for phrasehound output.
///
/// From most to least verbose: [`Debug`](LogLevel::Debug) > [`Info`](LogLevel::Info) >
/// [`Notice`](LogLevel::Notice) > [`Warn`](LogLevel::Warn) > [`Error`](LogLevel::Error)
///
/// # Example
///
/// ```rust
/// use phrasehound::LogLevel;
///
/// let level: LogLevel = "warning".parse().unwrap();
/// assert_eq!(level, LogLevel::Warn);
/// assert!(LogLevel::Notice < level);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Low-level debugging information.
    Debug,
    /// Informational messages about normal operation.
    Info,
    /// Notable events such as resume, exhaustion and the found phrase.
    #[default]
    Notice,
    /// Conditions that deserve attention but do not stop the attack.
    Warn,
    /// Failures.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Notice => write!(f, "NOTICE"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            _ => Err(Error::InvalidConfig(format!("invalid log level: {}", s))),
        }
    }
}

/// Process configuration.
///
/// # Fields
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `loglevel` | `notice` | Minimum level written to the log |
/// | `logfile` | none | Append to this file instead of stdout |
/// | `state_file` | `phrasehound.state` | Checkpoint location |
/// | `channel_capacity` | 8192 | Slots in every pipeline channel |
/// | `rate_interval_secs` | 2 | Seconds between guessing rate reports |
///
/// # Example
///
/// ```rust
/// use phrasehound::Config;
///
/// let config = Config::default();
/// assert_eq!(config.channel_capacity, 8192);
/// assert!(config.validate().is_ok());
///
/// let text = config.to_toml().unwrap();
/// assert!(text.contains("state_file"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Log level for output.
    #[serde(default)]
    pub loglevel: LogLevel,
    /// Log file path. None for stdout.
    #[serde(default)]
    pub logfile: Option<String>,
    /// Path to the checkpoint file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Capacity of each channel between pipeline stages.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Seconds between guessing rate reports.
    #[serde(default = "default_rate_interval_secs")]
    pub rate_interval_secs: u64,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("phrasehound.state")
}
fn default_channel_capacity() -> usize {
    8192
}
fn default_rate_interval_secs() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: LogLevel::default(),
            logfile: None,
            state_file: default_state_file(),
            channel_capacity: default_channel_capacity(),
            rate_interval_secs: default_rate_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    /// Returns [`Error::InvalidConfig`] if the TOML is invalid.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a channel cannot hold one guesser batch or
    /// the rate interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity < crate::guessers::BATCH_SIZE {
            return Err(Error::InvalidConfig(format!(
                "channel_capacity must be at least {}",
                crate::guessers::BATCH_SIZE
            )));
        }
        if self.rate_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "rate_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}

/// What to attack with.
///
/// These options are saved verbatim in the checkpoint, so a resumed attack runs with
/// exactly the settings it was started with.
///
/// # Example
///
/// ```rust
/// use phrasehound::AttackOptions;
///
/// let options = AttackOptions::from_args(["-g", "incremental", "-o", "charset=ab", "-j", "4"]).unwrap();
/// assert_eq!(options.jobs, 4);
/// assert_eq!(options.guesser_options()["charset"], "ab");
/// assert_eq!(AttackOptions::from_args(options.to_args()).unwrap(), options);
/// ```
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AttackOptions {
    /// Guesser generating candidate phrases (see --list-guessers).
    #[arg(short = 'g', long = "guesser", default_value = "incremental")]
    pub guesser: String,

    /// Guesser option, repeatable (e.g. -o charset=abc -o max=6).
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub options: Vec<(String, String)>,

    /// Rule file for the regex filter ("+ pattern" / "- pattern" lines).
    #[arg(long = "regexes", value_name = "FILE")]
    pub regexes: Option<PathBuf>,

    /// Prefixes prepended to every candidate (comma separated).
    #[arg(long = "prefixes", value_delimiter = ',')]
    pub prefixes: Vec<String>,

    /// Suffixes appended to every candidate (comma separated).
    #[arg(long = "suffixes", value_delimiter = ',')]
    pub suffixes: Vec<String>,

    /// Number of tester threads.
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    pub jobs: usize,

    /// Number of regex filter threads.
    #[arg(short = 'r', long = "regex-jobs", default_value_t = 1)]
    pub regex_jobs: usize,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct StoredArgs {
    #[command(flatten)]
    options: AttackOptions,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            guesser: "incremental".to_string(),
            options: Vec::new(),
            regexes: None,
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            jobs: 1,
            regex_jobs: 1,
        }
    }
}

impl AttackOptions {
    /// Parses options from an argument vector without a program name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if clap rejects the arguments.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        StoredArgs::try_parse_from(args)
            .map(|stored| stored.options)
            .map_err(|e| Error::InvalidConfig(format!("bad attack arguments: {}", e)))
    }

    /// Canonical argument vector that [`from_args`](Self::from_args) parses back.
    pub fn to_args(&self) -> Vec<String> {
        // `--flag=value` keeps values that start with '-' from being read as flags.
        let mut args = vec![format!("--guesser={}", self.guesser)];
        for (key, value) in &self.options {
            args.push(format!("--option={}={}", key, value));
        }
        if let Some(ref regexes) = self.regexes {
            args.push(format!("--regexes={}", regexes.to_string_lossy()));
        }
        args.extend(self.prefixes.iter().map(|p| format!("--prefixes={}", p)));
        args.extend(self.suffixes.iter().map(|s| format!("--suffixes={}", s)));
        args.push(format!("--jobs={}", self.jobs));
        args.push(format!("--regex-jobs={}", self.regex_jobs));
        args
    }

    /// Guesser options as a map. Later duplicates win.
    pub fn guesser_options(&self) -> GuesserOptions {
        self.options.iter().cloned().collect()
    }

    /// True when a prefix/suffix stage is needed.
    pub fn wraps_phrases(&self) -> bool {
        !self.prefixes.is_empty() || !self.suffixes.is_empty()
    }

    /// Checks worker counts and names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.guesser.is_empty() {
            return Err(Error::InvalidConfig("guesser name is empty".to_string()));
        }
        if self.jobs == 0 {
            return Err(Error::InvalidConfig("jobs must be at least 1".to_string()));
        }
        if self.regex_jobs == 0 {
            return Err(Error::InvalidConfig(
                "regex-jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Writes the argument vector as a run of `arg` entries.
    pub fn save(&self, writer: &mut dyn StateWriter) {
        for arg in self.to_args() {
            writer.put_str(ARG_TAG, &arg);
        }
    }

    /// Reads the `arg` run written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingState`] if the reader is not positioned at an `arg`
    /// entry and [`Error::State`] if the stored arguments no longer parse.
    pub fn load(reader: &mut dyn StateReader) -> Result<Self> {
        let mut args = Vec::new();
        while reader.peek_tag() == Some(ARG_TAG) {
            if let Some(value) = reader.next_value() {
                args.push(value);
            }
        }
        if args.is_empty() {
            return Err(Error::MissingState(ARG_TAG.to_string()));
        }
        Self::from_args(args).map_err(|e| Error::State(e.to_string()))
    }
}

/// Command-line arguments for phrasehound.
///
/// # Examples
///
/// Attack a key with the default incremental guesser over lowercase letters:
/// ```bash
/// phrasehound -o charset=abcdefghijklmnopqrstuvwxyz -o max=6 -j 4 secret.key
/// ```
///
/// Replay a word list with suffix variations:
/// ```bash
/// phrasehound -g dictionary -o dictionary=words.txt --suffixes 1,123,! secret.key
/// ```
///
/// # Environment Variables
///
/// - `PHRASEHOUND_STATE`: checkpoint path (equivalent to `--state`)
/// - `PHRASEHOUND_CONFIG`: configuration file (equivalent to `--config`)
#[derive(Parser, Debug)]
#[command(name = "phrasehound")]
#[command(about = "Recover the pass phrase of a locked PGP secret key")]
#[command(version)]
#[command(
    long_about = "phrasehound runs guessers, optional regex and prefix/suffix filters and \
    parallel testers as a pipeline against a locked secret key. Interrupting the run \
    saves a checkpoint that the next invocation resumes from."
)]
pub struct CliArgs {
    /// Secret key file (TOML), or "-" for stdin.
    #[arg(value_name = "KEY")]
    pub key: Option<PathBuf>,

    /// Path to the checkpoint file.
    #[arg(long = "state", env = "PHRASEHOUND_STATE")]
    pub state_file: Option<PathBuf>,

    /// Ignore an existing checkpoint and start from scratch.
    #[arg(long = "no-resume")]
    pub no_resume: bool,

    /// Write default config to file and exit.
    #[arg(long = "generate_config")]
    pub generate_config: Option<PathBuf>,

    /// List available guessers and their options, then exit.
    #[arg(short = 'l', long = "list-guessers")]
    pub list_guessers: bool,

    /// Log verbosity (DEBUG, INFO, NOTICE, WARN, ERROR).
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log to file instead of stdout.
    #[arg(long)]
    pub logfile: Option<String>,

    /// Path to configuration file.
    #[arg(
        long = "config",
        env = "PHRASEHOUND_CONFIG",
        default_value = "phrasehound.conf"
    )]
    pub config_file: PathBuf,

    /// Attack settings.
    #[command(flatten)]
    pub attack: AttackOptions,
}

impl CliArgs {
    /// Apply CLI arguments to a configuration, overriding values.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref state_file) = self.state_file {
            config.state_file = state_file.clone();
        }
        if let Some(ref loglevel) = self.loglevel {
            if let Ok(level) = loglevel.parse() {
                config.loglevel = level;
            }
        }
        if let Some(ref logfile) = self.logfile {
            config.logfile = Some(logfile.clone());
        }
    }
}

/// Load configuration from file and CLI arguments.
///
/// 1. Start with defaults
/// 2. Apply config file if it exists
/// 3. Apply CLI arguments (override)
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if configuration is invalid.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = Config::default();

    if args.config_file.exists() {
        config = Config::from_file(&args.config_file)?;
    }

    args.apply_to(&mut config);
    config.validate()?;

    Ok(config)
}
