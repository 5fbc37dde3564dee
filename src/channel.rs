//! Bounded ring-buffer channel connecting pipeline stages.
//!
//! A [`BoundedChannel`] is a fixed-capacity circular buffer guarded by two counting
//! [`Semaphore`]s, one counting free slots and one counting filled slots, plus two
//! independent cursor locks so that producers (tail) and consumers (head) never
//! contend with each other.
//!
//! # Slot accounting
//!
//! ```text
//!   put:    free.acquire(n) ─▶ lock tail ─▶ write n slots ─▶ filled.release(n) ─▶ unlock
//!   take:   filled.acquire(..) ─▶ lock head ─▶ read k slots ─▶ free.release(k) ─▶ unlock
//! ```
//!
//! Between operations `filled + free == capacity`. While an operation is in flight
//! the slots it has acquired but not yet released are counted by neither semaphore,
//! so the sum is at most `capacity`.
//!
//! # Ordering
//!
//! Items written by one producer thread are taken in the order they were put. A bulk
//! [`put_n`](BoundedChannel::put_n) lands as one contiguous run because the free slots
//! are reserved up front and the tail cursor is held for the whole write.
//!
//! # Termination
//!
//! The channel itself has no notion of closing. Stages treat a delivered sentinel
//! [`PhraseBlock`](crate::PhraseBlock) as the signal to stop; the controller decides how
//! many sentinels to inject.

use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
///
/// Supports acquiring several permits at once, which is what makes bulk puts atomic
/// with respect to other producers.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Blocks until `n` permits are available and takes all of them.
    pub fn acquire(&self, n: usize) {
        let mut permits = self.permits.lock();
        while *permits < n {
            self.available.wait(&mut permits);
        }
        *permits -= n;
    }

    /// Blocks until at least one permit is available, then takes as many as are
    /// available up to `max`. Returns the number taken.
    pub fn acquire_up_to(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        let taken = (*permits).min(max);
        *permits -= taken;
        taken
    }

    /// Returns `n` permits and wakes waiters.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += n;
        // Waiters may need different counts, so wake all of them.
        self.available.notify_all();
    }

    /// Number of permits currently available. Racy; diagnostics only.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

/// A bounded multi-producer multi-consumer FIFO.
///
/// `T: Default` is used to leave an empty value behind in a slot after it has been
/// taken; for [`PhraseBlock`](crate::PhraseBlock) that is the sentinel, which is
/// never observed because filled-slot accounting guards every read.
///
/// # Example
///
/// ```rust
/// use phrasehound::{BoundedChannel, PhraseBlock};
///
/// let channel = BoundedChannel::new(4);
/// channel.put_n(vec![PhraseBlock::from("a"), PhraseBlock::from("b")]);
///
/// let mut out = Vec::new();
/// assert_eq!(channel.take_n(8, &mut out), 2);
/// assert_eq!(out[0].as_bytes(), b"a");
/// assert_eq!(out[1].as_bytes(), b"b");
/// ```
#[derive(Debug)]
pub struct BoundedChannel<T> {
    slots: Box<[Mutex<T>]>,
    head: Mutex<usize>,
    tail: Mutex<usize>,
    free: Semaphore,
    filled: Semaphore,
}

impl<T: Default> BoundedChannel<T> {
    /// Creates a channel with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| Mutex::new(T::default())).collect(),
            head: Mutex::new(0),
            tail: Mutex::new(0),
            free: Semaphore::new(capacity),
            filled: Semaphore::new(0),
        }
    }

    /// Inserts one item, blocking while the channel is full.
    pub fn put(&self, item: T) {
        self.free.acquire(1);
        let mut tail = self.tail.lock();
        *self.slots[*tail].lock() = item;
        *tail = (*tail + 1) % self.slots.len();
        self.filled.release(1);
    }

    /// Inserts all `items` as one contiguous run.
    ///
    /// Free slots for the whole batch are reserved before anything is written, so no
    /// other producer can interleave with the run.
    ///
    /// # Panics
    ///
    /// Panics if the batch is larger than the channel capacity, since the
    /// reservation could never be satisfied.
    pub fn put_n<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let n = items.len();
        if n == 0 {
            return;
        }
        assert!(
            n <= self.slots.len(),
            "bulk put of {} items exceeds channel capacity {}",
            n,
            self.slots.len()
        );

        self.free.acquire(n);
        let mut tail = self.tail.lock();
        let mut written = 0;
        for item in items.take(n) {
            *self.slots[*tail].lock() = item;
            *tail = (*tail + 1) % self.slots.len();
            written += 1;
        }
        self.filled.release(written);
        // An iterator reporting a wrong length must not leak reserved slots.
        self.free.release(n - written);
    }

    /// Removes one item, blocking while the channel is empty.
    pub fn take(&self) -> T {
        self.filled.acquire(1);
        let mut head = self.head.lock();
        let item = std::mem::take(&mut *self.slots[*head].lock());
        *head = (*head + 1) % self.slots.len();
        self.free.release(1);
        item
    }

    /// Removes up to `max` items and appends them to `out`.
    ///
    /// Blocks only until the first item is available, then takes whatever is
    /// present up to `max`. Returns the number of items appended.
    pub fn take_n(&self, max: usize, out: &mut Vec<T>) -> usize {
        let n = self.filled.acquire_up_to(max);
        if n == 0 {
            return 0;
        }
        let mut head = self.head.lock();
        out.reserve(n);
        for _ in 0..n {
            out.push(std::mem::take(&mut *self.slots[*head].lock()));
            *head = (*head + 1) % self.slots.len();
        }
        self.free.release(n);
        n
    }
}

impl<T> BoundedChannel<T> {
    /// Maximum number of items the channel holds.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of filled slots. Racy; for diagnostics only.
    pub fn size(&self) -> usize {
        self.filled.available()
    }

    /// Number of free slots. Racy; for diagnostics only.
    pub fn free_slots(&self) -> usize {
        self.free.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::PhraseBlock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn block(s: &str) -> PhraseBlock {
        PhraseBlock::from(s)
    }

    #[test]
    fn test_fifo_single_producer() {
        let channel = BoundedChannel::new(8);
        for s in ["a", "b", "c"] {
            channel.put(block(s));
        }
        assert_eq!(channel.take(), block("a"));
        assert_eq!(channel.take(), block("b"));
        assert_eq!(channel.take(), block("c"));
    }

    #[test]
    fn test_wraps_around() {
        let channel = BoundedChannel::new(3);
        for round in 0..10 {
            let name = format!("item{}", round);
            channel.put(block(&name));
            channel.put(block("x"));
            assert_eq!(channel.take(), block(&name));
            assert_eq!(channel.take(), block("x"));
        }
        assert_eq!(channel.size(), 0);
        assert_eq!(channel.free_slots(), 3);
    }

    #[test]
    fn test_take_n_returns_what_is_available() {
        let channel = BoundedChannel::new(16);
        channel.put_n(vec![block("a"), block("b"), block("c")]);

        let mut out = Vec::new();
        assert_eq!(channel.take_n(8, &mut out), 3);
        assert_eq!(out, vec![block("a"), block("b"), block("c")]);

        channel.put_n(vec![block("d"), block("e"), block("f")]);
        out.clear();
        assert_eq!(channel.take_n(2, &mut out), 2);
        assert_eq!(channel.take_n(2, &mut out), 1);
        assert_eq!(out, vec![block("d"), block("e"), block("f")]);
    }

    #[test]
    fn test_take_blocks_until_put() {
        let channel = Arc::new(BoundedChannel::new(2));
        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.take())
        };
        thread::sleep(Duration::from_millis(50));
        channel.put(block("late"));
        assert_eq!(consumer.join().unwrap(), block("late"));
    }

    #[test]
    fn test_put_blocks_while_full() {
        let channel = Arc::new(BoundedChannel::new(1));
        channel.put(block("first"));

        let done = Arc::new(AtomicUsize::new(0));
        let producer = {
            let channel = Arc::clone(&channel);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                channel.put(block("second"));
                done.store(1, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(done.load(Ordering::SeqCst), 0);

        assert_eq!(channel.take(), block("first"));
        producer.join().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(channel.take(), block("second"));
    }

    #[test]
    #[should_panic(expected = "exceeds channel capacity")]
    fn test_put_n_larger_than_capacity_panics() {
        let channel = BoundedChannel::new(2);
        channel.put_n(vec![block("a"), block("b"), block("c")]);
    }

    #[test]
    fn test_bulk_put_is_contiguous() {
        // Two producers push tagged batches; every batch must arrive as one run.
        let channel = Arc::new(BoundedChannel::new(8));
        let producers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|tag| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for batch in 0..200 {
                        let items: Vec<_> = (0..8)
                            .map(|i| block(&format!("{}{}-{}", tag, batch, i)))
                            .collect();
                        channel.put_n(items);
                    }
                })
            })
            .collect();

        let mut received = Vec::with_capacity(3200);
        while received.len() < 3200 {
            channel.take_n(8, &mut received);
        }
        for handle in producers {
            handle.join().unwrap();
        }

        for run in received.chunks(8) {
            let first = run[0].to_string_lossy();
            let prefix = first.split('-').next().unwrap().to_string();
            for (i, item) in run.iter().enumerate() {
                assert_eq!(item.to_string_lossy(), format!("{}-{}", prefix, i));
            }
        }
    }

    #[test]
    fn test_sentinels_release_blocked_consumers() {
        let channel = Arc::new(BoundedChannel::<PhraseBlock>::new(4));
        let exited = Arc::new(AtomicUsize::new(0));

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let channel = Arc::clone(&channel);
                let exited = Arc::clone(&exited);
                thread::spawn(move || loop {
                    if channel.take().is_sentinel() {
                        exited.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        for _ in 0..channel.capacity() {
            channel.put(PhraseBlock::sentinel());
        }
        for handle in consumers {
            handle.join().unwrap();
        }
        assert_eq!(exited.load(Ordering::SeqCst), 4);
        assert_eq!(channel.size(), 0);
    }

    #[test]
    fn test_semaphore_acquire_up_to() {
        let sem = Semaphore::new(5);
        assert_eq!(sem.acquire_up_to(3), 3);
        assert_eq!(sem.acquire_up_to(3), 2);
        assert_eq!(sem.available(), 0);
        sem.release(4);
        assert_eq!(sem.acquire_up_to(8), 4);
        assert_eq!(sem.acquire_up_to(0), 0);
    }
}
