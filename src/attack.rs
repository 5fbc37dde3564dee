//! Attack controller.
//!
//! [`Attack`] owns the pipeline for one attempt on one key:
//!
//! ```text
//!  ┌─────────┐ ch0 ┌──────────────┐ ch1 ┌──────────────┐ ch2 ┌──────────────┐
//!  │ guesser │────▶│ prefix/suffix│────▶│ regex × R    │────▶│ tester × J   │
//!  └─────────┘     └──────────────┘     └──────────────┘     └──────────────┘
//!                    (optional)           (optional)
//! ```
//!
//! Every worker runs on its own OS thread and only blocks inside a
//! [`BoundedChannel`]. Workers report terminal conditions through the shared
//! [`AttackContext`]; the controller thread sleeps on its condition variable until
//! one arrives and then boils the pipeline out.
//!
//! # Status Transitions
//!
//! ```text
//!              ┌──────────▶ Success ◀─────────┐
//!              │                               │
//!   Running ───┼──────────▶ Exhausted ─────────┤
//!              │                               │
//!              ├──────────▶ Aborted ───────────┤
//!              │                               ▼
//!              └──────────────────────────▶  Error
//! ```
//!
//! Success and Error are final. Exhausted and Aborted still allow Success, since the
//! candidates already in flight keep being tested while the pipeline drains.
//!
//! # Boil-Out
//!
//! Stages are stopped strictly in pipeline order. The guesser is stopped and joined
//! first. Then, for each downstream stage, sentinels are pushed into its input channel
//! (up to the channel's capacity, topped up while workers remain) until every worker
//! of the stage has exited, and the stage is joined. Because a stage is only drained
//! after everything upstream of it has exited, no producer can be left blocked on a
//! full channel. After an interrupt the drained candidates are all tested, so the
//! saved guesser state resumes exactly after the last phrase tested.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::channel::BoundedChannel;
use crate::checkpoint::{Checkpoint, StateReader};
use crate::config::{AttackOptions, LogLevel};
use crate::error::{Error, Result};
use crate::filters::{run_filter, Filter, PrefixSuffixFilter, RegexFilter};
use crate::guessers::{self, run_guesser, Guesser, BATCH_SIZE};
use crate::key::Key;
use crate::phrase::{PhraseBlock, SecretPhrase};
use crate::plog_fmt;
use crate::tester::{run_tester, Cracker};

/// Default capacity of every pipeline channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8192;

/// Where an attack stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackStatus {
    /// Workers are producing and testing candidates.
    Running,
    /// A tester found the pass phrase.
    Success,
    /// The guesser ran out of candidates.
    Exhausted,
    /// A worker failed.
    Error,
    /// The operator interrupted the attack.
    Aborted,
}

impl AttackStatus {
    /// True for Success and Error, after which no further transition happens.
    pub fn is_final(self) -> bool {
        matches!(self, AttackStatus::Success | AttackStatus::Error)
    }

    /// True for every status other than Running.
    pub fn is_terminal(self) -> bool {
        self != AttackStatus::Running
    }

    fn can_become(self, next: AttackStatus) -> bool {
        match self {
            AttackStatus::Running => next != AttackStatus::Running,
            AttackStatus::Exhausted | AttackStatus::Aborted => next.is_final(),
            AttackStatus::Success | AttackStatus::Error => false,
        }
    }
}

impl fmt::Display for AttackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackStatus::Running => write!(f, "running"),
            AttackStatus::Success => write!(f, "success"),
            AttackStatus::Exhausted => write!(f, "exhausted"),
            AttackStatus::Error => write!(f, "error"),
            AttackStatus::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug)]
struct Shared {
    status: AttackStatus,
    boiling_out: bool,
    phrase: Option<SecretPhrase>,
    error: Option<String>,
}

/// Status word shared by the controller and all workers of one attack.
///
/// One mutex guards the status, the boil-out flag, the found phrase and the first
/// error message; every change is broadcast on one condition variable.
///
/// # Example
///
/// ```rust
/// use phrasehound::attack::{AttackContext, AttackStatus};
///
/// let ctx = AttackContext::new();
/// ctx.exhausted();
/// assert!(ctx.phrase_found(b"hunter2"));
/// assert!(!ctx.phrase_found(b"hunter3"));
/// assert_eq!(ctx.status(), AttackStatus::Success);
/// ```
#[derive(Debug)]
pub struct AttackContext {
    shared: Mutex<Shared>,
    changed: Condvar,
}

impl Default for AttackContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AttackContext {
    /// Creates a context in the Running state.
    pub fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                status: AttackStatus::Running,
                boiling_out: false,
                phrase: None,
                error: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Current status.
    pub fn status(&self) -> AttackStatus {
        self.shared.lock().status
    }

    /// True while the controller is draining the pipeline.
    pub fn is_boiling_out(&self) -> bool {
        self.shared.lock().boiling_out
    }

    /// Copy of the found pass phrase, if any.
    pub fn phrase(&self) -> Option<SecretPhrase> {
        self.shared.lock().phrase.clone()
    }

    /// First error reported, if any.
    pub fn error_message(&self) -> Option<String> {
        self.shared.lock().error.clone()
    }

    /// Records the pass phrase. Only the first call succeeds; it returns true.
    pub fn phrase_found(&self, phrase: &[u8]) -> bool {
        let won = self.transition(AttackStatus::Success, |shared| {
            shared.phrase = Some(SecretPhrase::new(phrase.to_vec()));
        });
        if won {
            plog_fmt!(LogLevel::Notice, "Pass phrase found");
        }
        won
    }

    /// The guesser has no more candidates.
    pub fn exhausted(&self) {
        self.transition(AttackStatus::Exhausted, |_| {});
    }

    /// Reports a failure. The first message is kept.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        plog_fmt!(LogLevel::Error, "{}", message);
        self.transition(AttackStatus::Error, |shared| {
            shared.error.get_or_insert(message);
        });
    }

    /// External stop request, e.g. Ctrl-C.
    pub fn interrupt(&self) {
        if self.transition(AttackStatus::Aborted, |_| {}) {
            plog_fmt!(LogLevel::Notice, "Interrupted, stopping attack");
        }
    }

    /// Blocks until the status leaves Running and returns it.
    pub fn wait(&self) -> AttackStatus {
        let mut shared = self.shared.lock();
        while shared.status == AttackStatus::Running {
            self.changed.wait(&mut shared);
        }
        shared.status
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> AttackStatus {
        let mut shared = self.shared.lock();
        if shared.status == AttackStatus::Running {
            self.changed.wait_for(&mut shared, timeout);
        }
        shared.status
    }

    fn set_boiling_out(&self, value: bool) {
        self.shared.lock().boiling_out = value;
        self.changed.notify_all();
    }

    fn transition(&self, next: AttackStatus, update: impl FnOnce(&mut Shared)) -> bool {
        let mut shared = self.shared.lock();
        if !shared.status.can_become(next) {
            return false;
        }
        plog_fmt!(LogLevel::Debug, "Status {} -> {}", shared.status, next);
        shared.status = next;
        update(&mut shared);
        drop(shared);
        self.changed.notify_all();
        true
    }
}

/// Result of one attack run.
#[derive(Debug, Clone)]
pub struct AttackOutcome {
    /// Status after the pipeline drained.
    pub status: AttackStatus,
    /// The pass phrase, on success.
    pub phrase: Option<SecretPhrase>,
    /// First reported error, on error.
    pub error: Option<String>,
    /// Resume point, when the attack was interrupted.
    pub checkpoint: Option<Checkpoint>,
    /// Candidates the guesser produced.
    pub phrases_generated: u64,
    /// Candidates the testers checked.
    pub phrases_tested: u64,
}

impl AttackOutcome {
    /// Process exit status: 0 on success, 1 otherwise.
    pub fn exit_status(&self) -> u8 {
        if self.status == AttackStatus::Success {
            0
        } else {
            1
        }
    }
}

struct Stage {
    name: &'static str,
    input: Arc<BoundedChannel<PhraseBlock>>,
    abort: Arc<AtomicBool>,
    handles: Vec<JoinHandle<u64>>,
}

type GuesserHandle = JoinHandle<(Box<dyn Guesser>, u64)>;

struct Drained {
    guesser: Option<Box<dyn Guesser>>,
    generated: u64,
    tested: u64,
}

const TESTER_STAGE: &str = "tester";

/// One attack on one key.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use phrasehound::attack::{Attack, AttackContext, AttackStatus};
/// use phrasehound::{AttackOptions, Key};
///
/// let key = Key::from_file(std::path::Path::new("secret.toml")).unwrap();
/// let options = AttackOptions::from_args(["-o", "charset=abc123", "-o", "max=6", "-j", "4"]).unwrap();
/// let ctx = Arc::new(AttackContext::new());
///
/// let outcome = Attack::new(key, options, ctx).run().unwrap();
/// if outcome.status == AttackStatus::Success {
///     println!("{}", outcome.phrase.unwrap().to_string_lossy());
/// }
/// ```
pub struct Attack {
    key: Arc<Key>,
    options: AttackOptions,
    ctx: Arc<AttackContext>,
    capacity: usize,
    rate_interval: Duration,
}

impl Attack {
    /// Prepares an attack. Nothing runs until [`run`](Self::run) or
    /// [`resume`](Self::resume).
    pub fn new(key: impl Into<Arc<Key>>, options: AttackOptions, ctx: Arc<AttackContext>) -> Self {
        Self {
            key: key.into(),
            options,
            ctx,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            rate_interval: Duration::from_secs(2),
        }
    }

    /// Sets the capacity of every channel.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the period of guessing rate reports.
    pub fn with_rate_interval(mut self, interval: Duration) -> Self {
        self.rate_interval = interval;
        self
    }

    /// The shared status context.
    pub fn context(&self) -> &Arc<AttackContext> {
        &self.ctx
    }

    /// Runs from the start of the guesser's search space.
    ///
    /// # Errors
    ///
    /// Setup failures (bad options, unreadable files, unsupported key parameters) are
    /// returned before any thread starts. Failures after that are reported in the
    /// outcome.
    pub fn run(&self) -> Result<AttackOutcome> {
        let mut guesser = self.create_guesser()?;
        guesser.init()?;
        self.execute(guesser)
    }

    /// Runs from guesser progress read out of a checkpoint.
    ///
    /// `reader` must be positioned at the guesser entries, i.e. after the argument
    /// section has been consumed with [`AttackOptions::load`].
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus [`Error::MissingState`] and [`Error::State`] for
    /// unusable checkpoints.
    pub fn resume(&self, reader: &mut dyn StateReader) -> Result<AttackOutcome> {
        let mut guesser = self.create_guesser()?;
        guesser.load_state(reader)?;
        plog_fmt!(LogLevel::Notice, "Resuming {} guesser", guesser.name());
        self.execute(guesser)
    }

    fn create_guesser(&self) -> Result<Box<dyn Guesser>> {
        self.options.validate()?;
        if self.capacity < BATCH_SIZE {
            return Err(Error::InvalidConfig(format!(
                "channel capacity must be at least {}",
                BATCH_SIZE
            )));
        }
        let workers = self.options.jobs.max(self.options.regex_jobs);
        if workers > self.capacity {
            return Err(Error::InvalidConfig(format!(
                "{} workers per stage exceed channel capacity {}",
                workers, self.capacity
            )));
        }
        if !self.key.locked() {
            return Err(Error::InvalidConfig(
                "key is not protected by a pass phrase".to_string(),
            ));
        }
        let mut guesser = guessers::create(&self.options.guesser)?;
        guesser.setup(&self.options.guesser_options())?;
        Ok(guesser)
    }

    fn build_filters(&self) -> Result<Vec<(Arc<Filter>, usize)>> {
        let mut filters = Vec::new();
        if self.options.wraps_phrases() {
            let affix = PrefixSuffixFilter::new(&self.options.prefixes, &self.options.suffixes);
            filters.push((Arc::new(Filter::PrefixSuffix(affix)), 1));
        }
        if let Some(ref path) = self.options.regexes {
            let rules = RegexFilter::from_file(path)?;
            filters.push((Arc::new(Filter::Regex(rules)), self.options.regex_jobs));
        }
        Ok(filters)
    }

    fn execute(&self, guesser: Box<dyn Guesser>) -> Result<AttackOutcome> {
        let filters = self.build_filters()?;
        let crackers = (0..self.options.jobs)
            .map(|_| Cracker::new(Arc::clone(&self.key)))
            .collect::<Result<Vec<_>>>()?;

        let channels: Vec<Arc<BoundedChannel<PhraseBlock>>> = (0..=filters.len())
            .map(|_| Arc::new(BoundedChannel::new(self.capacity)))
            .collect();

        plog_fmt!(
            LogLevel::Notice,
            "Attacking {}-bit {} key ({}, {}) with {} guesser, {} filter stage(s), {} tester(s)",
            self.key.bits(),
            self.key.algorithm_name(),
            self.key.s2k.cipher,
            self.key.s2k.hash,
            guesser.name(),
            filters.len(),
            crackers.len()
        );

        // Consumers are started before producers so a failed spawn never leaves a
        // producer without a consumer.
        let mut stages = Vec::with_capacity(filters.len() + 1);
        let tester_input = Arc::clone(&channels[filters.len()]);
        stages.push(self.spawn_testers(crackers, tester_input));
        for (index, (filter, workers)) in filters.into_iter().enumerate().rev() {
            let input = Arc::clone(&channels[index]);
            let output = Arc::clone(&channels[index + 1]);
            stages.push(self.spawn_filter(filter, workers, input, output));
        }
        stages.reverse();

        let guesser_abort = Arc::new(AtomicBool::new(false));
        let guesser_handle = if self.ctx.status().is_final() {
            None
        } else {
            self.spawn_guesser(guesser, Arc::clone(&channels[0]), Arc::clone(&guesser_abort))
        };

        let status = self.ctx.wait();
        plog_fmt!(LogLevel::Notice, "Attack {}, draining pipeline", status);

        let drained = self.boil_out(guesser_handle, &guesser_abort, stages);
        Ok(self.outcome(drained))
    }

    fn spawn_guesser(
        &self,
        mut guesser: Box<dyn Guesser>,
        output: Arc<BoundedChannel<PhraseBlock>>,
        abort: Arc<AtomicBool>,
    ) -> Option<GuesserHandle> {
        let ctx = Arc::clone(&self.ctx);
        let rate_interval = self.rate_interval;
        let spawned = thread::Builder::new()
            .name("guesser".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_guesser(guesser.as_mut(), &output, &ctx, &abort, rate_interval)
                }));
                let produced = match result {
                    Ok(produced) => produced,
                    Err(_) => {
                        ctx.error("guesser worker panicked");
                        0
                    }
                };
                (guesser, produced)
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.ctx.error(format!("cannot start guesser thread: {}", e));
                None
            }
        }
    }

    fn spawn_filter(
        &self,
        filter: Arc<Filter>,
        workers: usize,
        input: Arc<BoundedChannel<PhraseBlock>>,
        output: Arc<BoundedChannel<PhraseBlock>>,
    ) -> Stage {
        let name = filter.name();
        let abort = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let filter = Arc::clone(&filter);
            let (input, output, abort) =
                (Arc::clone(&input), Arc::clone(&output), Arc::clone(&abort));
            let ctx = Arc::clone(&self.ctx);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    guard_worker(name, &ctx, &input, || {
                        run_filter(&filter, &input, &output, &abort)
                    })
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.ctx
                        .error(format!("cannot start {} thread: {}", name, e));
                    break;
                }
            }
        }
        Stage {
            name,
            input,
            abort,
            handles,
        }
    }

    fn spawn_testers(
        &self,
        crackers: Vec<Cracker>,
        input: Arc<BoundedChannel<PhraseBlock>>,
    ) -> Stage {
        let abort = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(crackers.len());
        for (i, mut cracker) in crackers.into_iter().enumerate() {
            let (input, abort) = (Arc::clone(&input), Arc::clone(&abort));
            let ctx = Arc::clone(&self.ctx);
            let spawned = thread::Builder::new()
                .name(format!("tester-{}", i))
                .spawn(move || {
                    guard_worker(TESTER_STAGE, &ctx, &input, || {
                        run_tester(&mut cracker, &input, &ctx, &abort)
                    })
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.ctx.error(format!("cannot start tester thread: {}", e));
                    break;
                }
            }
        }
        Stage {
            name: TESTER_STAGE,
            input,
            abort,
            handles,
        }
    }

    fn boil_out(
        &self,
        guesser_handle: Option<GuesserHandle>,
        guesser_abort: &AtomicBool,
        stages: Vec<Stage>,
    ) -> Drained {
        self.ctx.set_boiling_out(true);
        let mut tested = 0;

        guesser_abort.store(true, Ordering::Release);
        let (guesser, generated) = match guesser_handle.map(JoinHandle::join) {
            Some(Ok((guesser, generated))) => (Some(guesser), generated),
            Some(Err(_)) => {
                self.ctx.error("guesser worker panicked");
                (None, 0)
            }
            None => (None, 0),
        };
        plog_fmt!(LogLevel::Debug, "Guesser stopped after {} phrases", generated);

        let queued = queued_candidates(&stages);
        if queued > 0 && !self.ctx.status().is_final() {
            plog_fmt!(
                LogLevel::Notice,
                "Finishing {} queued candidates before stopping",
                queued
            );
        }

        for stage in stages {
            if self.ctx.status().is_final() {
                stage.abort.store(true, Ordering::Release);
            }
            if !stage.handles.is_empty() {
                // Each worker consumes exactly one sentinel.
                for _ in 0..stage.input.capacity() {
                    stage.input.put(PhraseBlock::sentinel());
                }
            }

            let mut processed = 0u64;
            for handle in stage.handles {
                match handle.join() {
                    Ok(count) => processed += count,
                    Err(_) => self.ctx.error(format!("{} worker panicked", stage.name)),
                }
            }
            plog_fmt!(
                LogLevel::Debug,
                "Stage {} stopped after {} phrases",
                stage.name,
                processed
            );
            if stage.name == TESTER_STAGE {
                tested = processed;
            }
        }

        self.ctx.set_boiling_out(false);
        Drained {
            guesser,
            generated,
            tested,
        }
    }

    fn outcome(&self, drained: Drained) -> AttackOutcome {
        let Drained {
            guesser,
            generated,
            tested,
        } = drained;
        let status = self.ctx.status();
        let checkpoint = match (status, guesser) {
            (AttackStatus::Aborted, Some(guesser)) => {
                let mut checkpoint = Checkpoint::new();
                self.options.save(&mut checkpoint);
                guesser.save_state(&mut checkpoint);
                Some(checkpoint)
            }
            _ => None,
        };
        plog_fmt!(
            LogLevel::Notice,
            "Attack finished: {} ({} phrases generated, {} tested)",
            status,
            generated,
            tested
        );
        AttackOutcome {
            status,
            phrase: self.ctx.phrase(),
            error: self.ctx.error_message(),
            checkpoint,
            phrases_generated: generated,
            phrases_tested: tested,
        }
    }
}

/// Runs a downstream worker body; a panic is reported and the worker keeps consuming
/// its input until a sentinel so upstream stages cannot block on it.
fn guard_worker(
    name: &str,
    ctx: &AttackContext,
    input: &BoundedChannel<PhraseBlock>,
    body: impl FnOnce() -> u64,
) -> u64 {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(count) => count,
        Err(_) => {
            ctx.error(format!("{} worker panicked", name));
            while !input.take().is_sentinel() {}
            0
        }
    }
}

/// Candidates waiting in the input channels of `stages`.
fn queued_candidates(stages: &[Stage]) -> usize {
    stages.iter().map(|stage| stage.input.size()).sum()
}
