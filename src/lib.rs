//! # phrasehound
//!
//! Pass phrase recovery for locked OpenPGP secret keys.
//!
//! # Overview
//!
//! phrasehound runs a multi-threaded guess-and-test pipeline against one secret key
//! whose private material is protected by a symmetric cipher keyed from a pass phrase
//! through an OpenPGP string-to-key (S2K) function:
//!
//! - **Guessers** ([`guessers`]): incremental, random and dictionary candidate sources
//! - **Filters** ([`filters`]): regex allow/deny rules and prefix/suffix expansion
//! - **Testers** ([`tester`]): S2K derivation, CFB decryption and secret verification
//! - **Controller** ([`attack`]): stage wiring, status tracking and orderly shutdown
//! - **Checkpoints** ([`checkpoint`]): interrupted attacks resume where they stopped
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attack`] | [`Attack`] controller and the shared [`AttackContext`] |
//! | [`channel`] | Bounded blocking [`BoundedChannel`] between stages |
//! | [`checkpoint`] | Tagged resume state and its file format |
//! | [`config`] | Configuration management (TOML, CLI, environment) |
//! | [`crypto`] | Algorithm identifiers and CFB decryption |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`filters`] | Pipeline filters |
//! | [`guessers`] | Candidate generators |
//! | [`key`] | Secret key model and verification |
//! | [`logger`] | Logging infrastructure using tracing |
//! | [`phrase`] | Candidate buffers and the found phrase |
//! | [`s2k`] | String-to-key derivation |
//! | [`tester`] | Per-thread candidate checker |
//!
//! # What This Library Does NOT Do
//!
//! - **OpenPGP packet parsing**: keys are supplied already decomposed, as TOML
//! - **Public key or message cracking**: only secret key protection is attacked
//! - **Version 3 keys**: only version 4 secret key packets are handled
//! - **Distributed attacks**: one process, one machine, one key
//!
//! # Quick Start
//!
//! ## As a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phrasehound::{Attack, AttackContext, AttackOptions, AttackStatus, Key};
//!
//! fn main() -> phrasehound::Result<()> {
//!     let key = Key::from_file(std::path::Path::new("secret.toml"))?;
//!     let options = AttackOptions::from_args(["-o", "charset=abc123", "-o", "max=6"])?;
//!
//!     let outcome = Attack::new(key, options, Arc::new(AttackContext::new())).run()?;
//!     if outcome.status == AttackStatus::Success {
//!         if let Some(phrase) = outcome.phrase {
//!             println!("{}", phrase.to_string_lossy());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## As a CLI Application
//!
//! ```bash
//! # Every phrase of 1..=6 characters over a small charset, 4 testers
//! phrasehound -o charset=abc123 -o max=6 -j 4 secret.toml
//!
//! # Word list with suffixes, keeping only capitalised candidates
//! phrasehound -g dictionary -o dictionary=words.txt --suffixes 1,123 --regexes caps.rules secret.toml
//!
//! # Ignore a previous checkpoint
//! phrasehound --no-resume secret.toml
//! ```
//!
//! # Configuration
//!
//! ```text
//! ┌─────────────────┐
//! │   CLI Arguments │ ◄── Highest priority (overrides all)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Environment   │ ◄── PHRASEHOUND_STATE, PHRASEHOUND_CONFIG
//! │    Variables    │
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Config File   │ ◄── TOML file (default: phrasehound.conf)
//! │     (TOML)      │
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Defaults     │
//! └─────────────────┘
//! ```
//!
//! Attack settings (guesser, filters, job counts) are command-line only. They are
//! stored in the checkpoint so a resumed run uses the settings it was started with.
//!
//! # Security Considerations
//!
//! - **Memory Safety**: the found phrase is zeroized on drop (using zeroize)
//! - **Output**: the phrase is printed once and never logged
//! - **Checkpoints**: contain progress only, never candidate phrases

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod attack;
pub mod channel;
pub mod checkpoint;
pub mod config;
pub mod crypto;
pub mod error;
pub mod filters;
pub mod guessers;
pub mod key;
pub mod logger;
pub mod phrase;
pub mod s2k;
pub mod tester;

pub use attack::{Attack, AttackContext, AttackOutcome, AttackStatus};
pub use channel::BoundedChannel;
pub use checkpoint::Checkpoint;
pub use config::{load_config, AttackOptions, CliArgs, Config, LogLevel};
pub use error::{Error, Result};
pub use key::Key;
pub use phrase::{PhraseBlock, SecretPhrase};
