//! Bounded (or unbounded) per-channel byte FIFO, the queue a channel's
//! reader drains and the background router fills.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A single channel's byte queue. Capacity `0` is unbounded and never
/// reports backpressure; any other value blocks the producer once full.
pub struct ChannelQueue {
    capacity: usize,
    buf: Mutex<VecDeque<u8>>,
    not_empty: Condvar,
    not_full: Condvar,
    shutdown: Arc<AtomicBool>,
}

impl ChannelQueue {
    /// Build a queue sharing the multiplexer's teardown flag, so a blocked
    /// reader or writer wakes up promptly when the multiplexer shuts down.
    pub fn new(capacity: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            capacity,
            buf: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            shutdown,
        }
    }

    /// Enqueue every byte of `data`. For a bounded queue, splits the write
    /// across free-capacity chunks and blocks between chunks until a reader
    /// drains space; for an unbounded queue (`capacity == 0`), enqueues the
    /// whole slice in one step with no blocking at all.
    pub fn put_bulk(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let mut guard = self.buf.lock().unwrap();

        if self.capacity == 0 {
            guard.extend(data.iter().copied());
            drop(guard);
            self.not_empty.notify_all();
            return;
        }

        let mut offset = 0;
        while offset < data.len() {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let free = self.capacity.saturating_sub(guard.len());
            if free == 0 {
                guard = self.not_full.wait(guard).unwrap();
                continue;
            }
            let take = free.min(data.len() - offset);
            guard.extend(data[offset..offset + take].iter().copied());
            offset += take;
            self.not_empty.notify_all();
        }
    }

    /// Block for up to `timeout` waiting for a byte. Returns `None` on
    /// timeout or on multiplexer shutdown with nothing left to drain.
    pub fn get(&self, timeout: Duration) -> Option<u8> {
        let mut guard = self.buf.lock().unwrap();
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(byte) = guard.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Some(byte);
            }

            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let (next_guard, result) = self.not_empty.wait_timeout(guard, remaining).unwrap();
            guard = next_guard;
            if result.timed_out() && guard.is_empty() {
                return None;
            }
        }
    }

    /// `true` for a bounded queue at capacity. Always `false` when unbounded.
    pub fn is_full(&self) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.buf.lock().unwrap().len() >= self.capacity
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.lock().unwrap().is_empty()
    }

    /// Number of bytes currently queued.
    pub fn size(&self) -> usize {
        self.buf.lock().unwrap().len()
    }

    /// Wake any thread blocked in `get`/`put_bulk` so it can observe a
    /// shutdown signal set elsewhere.
    pub fn wake_all(&self) {
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = ChannelQueue::new(0, flag());
        q.put_bulk(b"abc");
        assert_eq!(q.get(Duration::from_millis(10)), Some(b'a'));
        assert_eq!(q.get(Duration::from_millis(10)), Some(b'b'));
        assert_eq!(q.get(Duration::from_millis(10)), Some(b'c'));
    }

    #[test]
    fn unbounded_queue_never_reports_full() {
        let q = ChannelQueue::new(0, flag());
        q.put_bulk(&[0u8; 1000]);
        assert!(!q.is_full());
    }

    #[test]
    fn bounded_queue_fills_and_drains() {
        let q = Arc::new(ChannelQueue::new(5, flag()));
        q.put_bulk(b"foo");
        q.put_bulk(b"bar");
        assert!(q.is_full());

        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(q.get(Duration::from_millis(50)).unwrap());
        }
        assert_eq!(out, b"fooba");
        assert!(!q.is_full());
        assert_eq!(q.get(Duration::from_millis(50)), Some(b'r'));
        assert!(q.is_empty());
    }

    #[test]
    fn bounded_put_blocks_until_drained_by_another_thread() {
        let q = Arc::new(ChannelQueue::new(2, flag()));
        q.put_bulk(b"xy");
        assert!(q.is_full());

        let writer_q = Arc::clone(&q);
        let writer = std::thread::spawn(move || {
            writer_q.put_bulk(b"z");
        });

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(q.get(Duration::from_millis(50)), Some(b'x'));
        writer.join().unwrap();

        let mut remaining = Vec::new();
        while let Some(b) = q.get(Duration::from_millis(50)) {
            remaining.push(b);
        }
        assert_eq!(remaining, b"yz");
    }

    #[test]
    fn get_times_out_on_empty_queue() {
        let q = ChannelQueue::new(0, flag());
        assert_eq!(q.get(Duration::from_millis(20)), None);
    }

    #[test]
    fn shutdown_unblocks_waiting_get() {
        let shutdown = flag();
        let q = Arc::new(ChannelQueue::new(1, Arc::clone(&shutdown)));
        let reader_q = Arc::clone(&q);
        let reader = std::thread::spawn(move || reader_q.get(Duration::from_secs(5)));

        std::thread::sleep(Duration::from_millis(20));
        shutdown.store(true, Ordering::Release);
        q.wake_all();

        assert_eq!(reader.join().unwrap(), None);
    }
}
