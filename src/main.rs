//! phrasehound CLI application entry point.
//!
//! # Startup Flow
//!
//! ```text
//!   ┌─────────────────┐
//!   │  Parse CLI Args │ ◄── clap parses command-line arguments
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐      ┌─────────────────┐
//!   │ --generate_config│─────▶│ Write default   │────▶ Exit
//!   │ / --list-guessers│      │ config or list  │
//!   └────────┬─────────┘      └─────────────────┘
//!            │ No
//!            ▼
//!   ┌─────────────────┐
//!   │  Load Config    │ ◄── Defaults → File → CLI → Env
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  Read Key       │ ◄── TOML file or stdin
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐      ┌─────────────────┐
//!   │ Checkpoint      │─yes─▶│ Resume with the │
//!   │   present?      │      │ stored settings │
//!   └────────┬────────┘      └────────┬────────┘
//!            │ No                     │
//!            ▼                        ▼
//!   ┌─────────────────────────────────────────┐
//!   │ Run attack (Ctrl-C interrupts and saves) │
//!   └─────────────────────────────────────────┘
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Pass phrase found |
//! | 1 | Not found, interrupted, or error (see stderr) |

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use phrasehound::checkpoint::Checkpoint;
use phrasehound::{
    config, guessers, logger, Attack, AttackContext, AttackOptions, AttackStatus, CliArgs,
    Config, Error, Key, LogLevel,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> phrasehound::Result<u8> {
    let args = CliArgs::parse();

    if let Some(ref output_path) = args.generate_config {
        let config = Config::default();
        std::fs::write(output_path, config.to_toml()?)?;
        println!("Wrote default config to {}", output_path.display());
        return Ok(0);
    }

    if args.list_guessers {
        list_guessers()?;
        return Ok(0);
    }

    let config = config::load_config(&args)?;
    logger::init(config.loglevel, config.logfile.as_deref())?;
    logger::plog(
        LogLevel::Notice,
        &format!("phrasehound {} starting", env!("CARGO_PKG_VERSION")),
    );

    let key_path = args
        .key
        .as_deref()
        .ok_or_else(|| Error::InvalidConfig("no key file given".to_string()))?;
    let key = read_key(key_path)?;
    if !key.locked() {
        return Err(Error::Key(
            "key is not protected by a pass phrase, nothing to recover".to_string(),
        ));
    }

    let checkpoint = if args.no_resume || !config.state_file.exists() {
        None
    } else {
        Some(Checkpoint::read_from_file(&config.state_file)?)
    };

    let ctx = Arc::new(AttackContext::new());
    let interrupt = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctx.interrupt();
            }
        })
    };

    let capacity = config.channel_capacity;
    let rate_interval = Duration::from_secs(config.rate_interval_secs);
    let attack_options = args.attack.clone();
    let attack_ctx = Arc::clone(&ctx);
    let outcome = tokio::task::spawn_blocking(move || match checkpoint {
        Some(checkpoint) => {
            let mut reader = checkpoint.reader();
            let options = AttackOptions::load(&mut reader)?;
            logger::plog(
                LogLevel::Notice,
                &format!(
                    "Resuming from checkpoint saved at {}, arguments: {}",
                    checkpoint.saved_at,
                    options.to_args().join(" ")
                ),
            );
            Attack::new(key, options, attack_ctx)
                .with_capacity(capacity)
                .with_rate_interval(rate_interval)
                .resume(&mut reader)
        }
        None => Attack::new(key, attack_options, attack_ctx)
            .with_capacity(capacity)
            .with_rate_interval(rate_interval)
            .run(),
    })
    .await
    .map_err(|e| Error::Runtime(format!("attack task failed: {}", e)))??;
    interrupt.abort();

    match outcome.status {
        AttackStatus::Success => {
            if let Some(ref phrase) = outcome.phrase {
                println!("Pass phrase: {}", phrase.to_string_lossy());
            }
            remove_checkpoint(&config.state_file);
        }
        AttackStatus::Exhausted => {
            eprintln!("Search space exhausted, pass phrase not found");
            remove_checkpoint(&config.state_file);
        }
        AttackStatus::Aborted => match outcome.checkpoint {
            Some(ref checkpoint) => {
                checkpoint.write_to_file(&config.state_file)?;
                eprintln!(
                    "Interrupted, progress saved to {}",
                    config.state_file.display()
                );
            }
            None => eprintln!("Interrupted, guesser state could not be saved"),
        },
        AttackStatus::Error => {
            let message = outcome
                .error
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string());
            return Err(Error::Runtime(message));
        }
        AttackStatus::Running => {}
    }

    Ok(outcome.exit_status())
}

fn read_key(path: &Path) -> phrasehound::Result<Key> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Key::from_toml_str(&content)
    } else {
        Key::from_file(path)
    }
}

fn remove_checkpoint(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            logger::plog(
                LogLevel::Warn,
                &format!("Cannot remove state file {}: {}", path.display(), e),
            );
        }
    }
}

fn list_guessers() -> phrasehound::Result<()> {
    for (name, description) in guessers::catalogue() {
        println!("{} - {}", name, description);
        let guesser = guessers::create(name)?;
        for (option, help) in guesser.options() {
            println!("    {:<12} {}", option, help);
        }
    }
    Ok(())
}
