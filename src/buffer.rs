use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cursor state guarded by the buffer lock
///
/// `len` is the fill count (0..=capacity). It disambiguates the case where
/// `write == read`, which happens both when the buffer is empty and when it
/// is full.
#[derive(Debug)]
struct Slots<T> {
    storage: Vec<Option<T>>,
    write: usize,
    read: usize,
    len: usize,
}

impl<T> Slots<T> {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn advance(&self, cursor: usize) -> usize {
        (cursor + 1) % self.capacity()
    }

    fn take_oldest(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.storage[self.read].take();
        self.read = self.advance(self.read);
        self.len -= 1;
        value
    }
}

#[derive(Debug)]
struct Shared<T> {
    slots: Mutex<Slots<T>>,
    capacity: usize,
    pushed: Condvar,
    total_pushed: AtomicU64,
    total_overwritten: AtomicU64,
    total_popped: AtomicU64,
}

/// A fixed-capacity circular buffer that overwrites its oldest value when full
///
/// Push never blocks and never fails: pushing into a full buffer discards the
/// oldest unread value. Pop never blocks and reports an empty buffer as
/// `None`. Both run entirely inside one critical section, so the emptiness
/// decision and the cursor update are a single atomic step.
///
/// Cloning a `RingBuffer` produces another handle to the same storage.
#[derive(Debug)]
pub struct RingBuffer<T: Send> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> RingBuffer<T> {
    /// Create a new ring buffer with the specified capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");

        let mut storage = Vec::with_capacity(capacity);
        storage.resize_with(capacity, || None);

        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots {
                    storage,
                    write: 0,
                    read: 0,
                    len: 0,
                }),
                capacity,
                pushed: Condvar::new(),
                total_pushed: AtomicU64::new(0),
                total_overwritten: AtomicU64::new(0),
                total_popped: AtomicU64::new(0),
            }),
        }
    }

    /// Store a value, overwriting the oldest unread value if the buffer is full
    ///
    /// Returns the value that was overwritten, if any.
    pub fn push(&self, value: T) -> Option<T> {
        let evicted = {
            let mut slots = self.shared.slots.lock();
            log::trace!(
                "push begin: write={} read={} len={}",
                slots.write,
                slots.read,
                slots.len
            );

            let evicted = if slots.len == slots.capacity() {
                slots.take_oldest()
            } else {
                None
            };

            let write = slots.write;
            slots.storage[write] = Some(value);
            slots.write = slots.advance(write);
            slots.len += 1;

            log::trace!(
                "push end: write={} read={} len={} overwrote={}",
                slots.write,
                slots.read,
                slots.len,
                evicted.is_some()
            );
            evicted
        };

        self.shared.total_pushed.fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.shared.total_overwritten.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.pushed.notify_one();
        evicted
    }

    /// Take the oldest unread value, or `None` if the buffer is empty
    pub fn pop(&self) -> Option<T> {
        let value = {
            let mut slots = self.shared.slots.lock();
            let value = slots.take_oldest();
            log::trace!(
                "pop: write={} read={} len={} found={}",
                slots.write,
                slots.read,
                slots.len,
                value.is_some()
            );
            value
        };

        if value.is_some() {
            self.shared.total_popped.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Take the oldest unread value, waiting up to `timeout` for a push if
    /// the buffer is currently empty
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let value = {
            let mut slots = self.shared.slots.lock();
            if slots.len == 0 {
                let _ = self.shared.pushed.wait_for(&mut slots, timeout);
            }
            slots.take_oldest()
        };

        if value.is_some() {
            self.shared.total_popped.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Get the number of unread values
    pub fn len(&self) -> usize {
        self.shared.slots.lock().len
    }

    /// Check if the buffer holds no unread values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the next push will overwrite an unread value
    pub fn is_full(&self) -> bool {
        let slots = self.shared.slots.lock();
        slots.len == slots.capacity()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Get the lifetime push/overwrite/pop counters
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            pushed: self.shared.total_pushed.load(Ordering::Relaxed),
            overwritten: self.shared.total_overwritten.load(Ordering::Relaxed),
            popped: self.shared.total_popped.load(Ordering::Relaxed),
        }
    }
}

/// Lifetime counters of a ring buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub pushed: u64,
    pub overwritten: u64,
    pub popped: u64,
}

impl BufferStats {
    /// Values still unread when the counters were taken
    pub fn unread(&self) -> u64 {
        // counters are bumped outside the lock, so a live read can lag
        self.pushed
            .saturating_sub(self.overwritten)
            .saturating_sub(self.popped)
    }

    /// Format counters as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Pushed: {}, Overwritten: {}, Popped: {}, Unread: {}",
            self.pushed,
            self.overwritten,
            self.popped,
            self.unread()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn drain<T: Send>(buffer: &RingBuffer<T>) -> Vec<T> {
        std::iter::from_fn(|| buffer.pop()).collect()
    }

    #[test]
    fn test_buffer_push_pop() {
        let buffer = RingBuffer::new(10);
        assert_eq!(buffer.push(42), None);
        assert_eq!(buffer.pop(), Some(42));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_pop_on_fresh_buffer() {
        let buffer: RingBuffer<i64> = RingBuffer::new(3);
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.stats(), BufferStats::default());
    }

    #[test]
    fn test_pop_after_full_drain() {
        let buffer = RingBuffer::new(3);
        for i in 0..3 {
            buffer.push(i);
        }
        assert_eq!(drain(&buffer), vec![0, 1, 2]);
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.stats().popped, 3);

        buffer.push(7);
        assert_eq!(buffer.pop(), Some(7));
    }

    #[test]
    fn test_fifo_under_capacity() {
        let buffer = RingBuffer::new(5);
        for i in [10, 20, 30, 40] {
            buffer.push(i);
        }
        assert_eq!(drain(&buffer), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_overwrite_keeps_most_recent() {
        for k in 0..7 {
            let buffer = RingBuffer::new(3);
            for v in 1..=(3 + k) {
                buffer.push(v);
            }
            let expected: Vec<_> = ((k + 1)..=(3 + k)).collect();
            assert_eq!(drain(&buffer), expected, "k = {k}");
            assert_eq!(buffer.stats().overwritten, k as u64);
        }
    }

    #[test]
    fn test_push_returns_evicted_value() {
        let buffer = RingBuffer::new(2);
        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert!(buffer.is_full());
        assert_eq!(buffer.push(3), Some(1));
        assert_eq!(buffer.push(4), Some(2));
        assert_eq!(drain(&buffer), vec![3, 4]);
    }

    #[test]
    fn test_interleaved_wraparound() {
        let buffer = RingBuffer::new(3);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.pop(), Some(1));
        buffer.push(3);
        buffer.push(4);
        // full again with cursors wrapped
        buffer.push(5);
        assert_eq!(drain(&buffer), vec![3, 4, 5]);
    }

    #[test]
    fn test_capacity_one() {
        let buffer = RingBuffer::new(1);
        buffer.push(1);
        assert_eq!(buffer.push(2), Some(1));
        assert_eq!(buffer.pop(), Some(2));
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let buffer = RingBuffer::new(4);
        for i in 0..50 {
            buffer.push(i);
            if i % 3 == 0 {
                buffer.pop();
            }
            assert!(buffer.len() <= buffer.capacity());
        }
        let stats = buffer.stats();
        assert_eq!(stats.unread(), buffer.len() as u64);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::<i64>::new(0);
    }

    #[test]
    fn test_capacity() {
        let buffer: RingBuffer<i32> = RingBuffer::new(42);
        assert_eq!(buffer.capacity(), 42);
    }

    #[test]
    fn test_capacity_readable_while_locked() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4);
        let _guard = buffer.shared.slots.lock();
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let buffer = RingBuffer::new(3);
        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(9);
        });

        let start = Instant::now();
        let mut got = None;
        while got.is_none() && start.elapsed() < Duration::from_secs(5) {
            got = buffer.pop_timeout(Duration::from_secs(1));
        }
        handle.join().unwrap();
        assert_eq!(got, Some(9));
    }

    #[test]
    fn test_pop_timeout_on_empty_returns_none() {
        let buffer: RingBuffer<i64> = RingBuffer::new(3);
        assert_eq!(buffer.pop_timeout(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let buffer = RingBuffer::new(8);
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        buffer.push(w * 1000 + i);
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..2)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    let mut seen = 0u64;
                    for _ in 0..2000 {
                        if buffer.pop().is_some() {
                            seen += 1;
                        }
                        assert!(buffer.len() <= 8);
                    }
                    seen
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        let popped: u64 = readers.into_iter().map(|r| r.join().unwrap()).sum();

        let stats = buffer.stats();
        assert_eq!(stats.pushed, 4000);
        assert_eq!(stats.popped, popped);
        assert_eq!(stats.unread(), buffer.len() as u64);
        assert!(buffer.len() <= 8);
    }
}
