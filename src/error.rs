//! Error types for phrasehound.
//!
//! This module defines the [`enum@Error`] enum covering every failure that can stop an
//! attack from starting or resuming. Per-candidate failures (a wrong pass phrase) are
//! never errors; they are ordinary negative results inside the tester.
//!
//! # Error Categories
//!
//! ```text
//!   Error
//!   ├── Io                    ◄── File I/O failures (dictionary, rule file, key, state)
//!   ├── InvalidConfig         ◄── Inconsistent options or configuration values
//!   ├── UnsupportedAlgorithm  ◄── Cipher, hash, S2K spec or key version not handled
//!   ├── MissingState          ◄── Checkpoint lacks a tag needed to resume
//!   ├── State                 ◄── Checkpoint file corrupt or unreadable
//!   ├── Key                   ◄── Key file malformed
//!   └── Runtime               ◄── A worker failed while the attack ran
//! ```
//!
//! # Recovery Guide
//!
//! | Error | Recoverable | Recommended Action |
//! |-------|-------------|-------------------|
//! | [`Io`](Error::Io) | Sometimes | Check paths and permissions |
//! | [`InvalidConfig`](Error::InvalidConfig) | No | Fix the options or config file |
//! | [`UnsupportedAlgorithm`](Error::UnsupportedAlgorithm) | No | The key cannot be attacked |
//! | [`MissingState`](Error::MissingState) | No | Start over with `--no-resume` |
//! | [`State`](Error::State) | No | Delete the state file |
//! | [`Key`](Error::Key) | No | Regenerate the key file |
//! | [`Runtime`](Error::Runtime) | Sometimes | Check the log, then resume |
//!
//! # Example
//!
//! ```rust
//! use phrasehound::{Config, Error, Result};
//!
//! fn load_config() -> Result<Config> {
//!     let config = Config::from_file(std::path::Path::new("phrasehound.conf"))?;
//!     config.validate()?;
//!     Ok(config)
//! }
//!
//! match load_config() {
//!     Ok(_) => println!("config loaded"),
//!     Err(Error::Io(e)) => eprintln!("file error: {}", e),
//!     Err(Error::InvalidConfig(msg)) => eprintln!("config error: {}", msg),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// Errors that can occur while setting up, running or resuming an attack.
///
/// Setup errors are detected on the controller thread before any worker starts,
/// so a failing attack never leaves threads parked on an empty pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading or writing a file.
    ///
    /// # Recovery
    ///
    /// - Check that the dictionary, rule, key and state paths exist
    /// - Check file permissions and free disk space
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or option values are inconsistent.
    ///
    /// Raised for things like `min > max`, an empty charset, an unknown guesser
    /// name or zero tester jobs.
    ///
    /// # Recovery
    ///
    /// Fix the command line or the configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The key uses an algorithm that cannot be attacked.
    ///
    /// Covers unknown or unsupported ciphers (including IDEA), hash algorithms,
    /// S2K specifiers and key versions other than 4. Fatal for the whole attack.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A checkpoint lacks a tag required to restore guesser progress.
    ///
    /// # Recovery
    ///
    /// Start a fresh attack with `--no-resume`.
    #[error("missing state: {0}")]
    MissingState(String),

    /// The checkpoint file is corrupt, has an unknown revision or holds
    /// values that cannot be parsed.
    ///
    /// # Recovery
    ///
    /// Delete the state file and start again.
    #[error("state file error: {0}")]
    State(String),

    /// The key file could not be decoded.
    #[error("key error: {0}")]
    Key(String),

    /// A worker failed after the attack started.
    #[error("attack failed: {0}")]
    Runtime(String),
}

/// Result type alias for phrasehound operations.
pub type Result<T> = std::result::Result<T, Error>;
