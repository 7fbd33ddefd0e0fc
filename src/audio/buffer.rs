//! Handoff queue between the real-time callback and the streaming worker
//!
//! The producer side must never block. It makes a single non-blocking attempt
//! at the active queue lock; if the worker is holding it, the packet goes to a
//! lock-free overflow queue instead and is merged back, in order, by whichever
//! side takes the lock next.

use crossbeam::queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::packet::FramePacket;
use crate::pacing::Wait;

/// Two-slot producer/consumer buffer for [`FramePacket`]s
pub struct HandoffQueue {
    active: Mutex<VecDeque<FramePacket>>,
    overflow: SegQueue<FramePacket>,
    cond: Condvar,
    deferred_count: AtomicUsize,
}

impl HandoffQueue {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(VecDeque::new()),
            overflow: SegQueue::new(),
            cond: Condvar::new(),
            deferred_count: AtomicUsize::new(0),
        }
    }

    /// Enqueue a packet without blocking.
    pub fn push(&self, packet: FramePacket) {
        match self.active.try_lock() {
            Some(mut active) => {
                Self::merge_overflow(&self.overflow, &mut active);
                active.push_back(packet);
                self.cond.notify_one();
            }
            None => {
                self.overflow.push(packet);
                self.deferred_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Wait for packets and move every queued packet into `out`.
    ///
    /// Returns immediately when `running` is already false; the flag is read
    /// under the queue lock, so a stop followed by [`wake`](Self::wake) is
    /// never missed. `out` is appended to in arrival order and is left
    /// untouched if nothing arrived before the wait expired.
    pub fn pop_all_or_wait(&self, wait: Wait, running: &AtomicBool, out: &mut VecDeque<FramePacket>) {
        let mut active = self.active.lock();
        Self::merge_overflow(&self.overflow, &mut active);

        if active.is_empty() && running.load(Ordering::Acquire) {
            match wait {
                Wait::For(timeout) => {
                    self.cond.wait_for(&mut active, timeout);
                }
                Wait::Until(deadline) => {
                    self.cond.wait_until(&mut active, deadline);
                }
            }
            Self::merge_overflow(&self.overflow, &mut active);
        }

        if out.is_empty() {
            std::mem::swap(out, &mut *active);
        } else {
            out.extend(active.drain(..));
        }
    }

    /// Unblock a waiting consumer without adding data.
    pub fn wake(&self) {
        let _active = self.active.lock();
        self.cond.notify_one();
    }

    /// Drop everything queued
    pub fn clear(&self) {
        let mut active = self.active.lock();
        active.clear();
        while self.overflow.pop().is_some() {}
    }

    /// Number of packets waiting in both queues
    pub fn len(&self) -> usize {
        self.active.lock().len() + self.overflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many pushes found the active queue busy and went through overflow
    pub fn deferred_count(&self) -> usize {
        self.deferred_count.load(Ordering::Relaxed)
    }

    fn merge_overflow(overflow: &SegQueue<FramePacket>, active: &mut VecDeque<FramePacket>) {
        while let Some(packet) = overflow.pop() {
            active.push_back(packet);
        }
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to a handoff queue
pub type SharedHandoffQueue = Arc<HandoffQueue>;

/// Create a new shared handoff queue
pub fn create_shared_queue() -> SharedHandoffQueue {
    Arc::new(HandoffQueue::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn tagged(tag: u32) -> FramePacket {
        FramePacket::from_channels(&[[tag as f32]])
    }

    fn tag_of(packet: &FramePacket) -> u32 {
        let b = packet.samples();
        f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u32
    }

    fn drain_now(queue: &HandoffQueue) -> Vec<u32> {
        let running = AtomicBool::new(true);
        let mut out = VecDeque::new();
        queue.pop_all_or_wait(Wait::For(Duration::ZERO), &running, &mut out);
        out.iter().map(tag_of).collect()
    }

    #[test]
    fn test_push_and_drain_in_order() {
        let queue = HandoffQueue::new();
        for tag in 0..5 {
            queue.push(tagged(tag));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(drain_now(&queue), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.deferred_count(), 0);
    }

    #[test]
    fn test_pushes_while_locked_are_not_lost() {
        let queue = HandoffQueue::new();
        queue.push(tagged(0));

        {
            let _consumer = queue.active.lock();
            for tag in 1..=10 {
                queue.push(tagged(tag));
            }
        }

        assert_eq!(queue.deferred_count(), 10);
        assert_eq!(queue.len(), 11);
        assert_eq!(drain_now(&queue), (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_next_push_merges_overflow_first() {
        let queue = HandoffQueue::new();
        {
            let _consumer = queue.active.lock();
            queue.push(tagged(1));
            queue.push(tagged(2));
        }
        queue.push(tagged(3));

        assert_eq!(queue.overflow.len(), 0);
        assert_eq!(drain_now(&queue), vec![1, 2, 3]);
    }

    #[test]
    fn test_wait_times_out_empty() {
        let queue = HandoffQueue::new();
        let running = AtomicBool::new(true);
        let mut out = VecDeque::new();

        let start = Instant::now();
        queue.pop_all_or_wait(Wait::For(Duration::from_millis(20)), &running, &mut out);
        assert!(out.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_stopped_consumer_does_not_wait() {
        let queue = HandoffQueue::new();
        let running = AtomicBool::new(false);
        let mut out = VecDeque::new();

        let start = Instant::now();
        queue.pop_all_or_wait(Wait::For(Duration::from_secs(5)), &running, &mut out);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_push_wakes_waiting_consumer() {
        let queue = create_shared_queue();
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let running = AtomicBool::new(true);
                let mut out = VecDeque::new();
                queue.pop_all_or_wait(Wait::For(Duration::from_secs(5)), &running, &mut out);
                out.iter().map(tag_of).collect::<Vec<_>>()
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(tagged(7));

        let start = Instant::now();
        let received = consumer.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(received, vec![7]);
    }

    #[test]
    fn test_wake_unblocks_after_stop() {
        let queue = create_shared_queue();
        let running = Arc::new(AtomicBool::new(true));
        let consumer = {
            let queue = queue.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut out = VecDeque::new();
                queue.pop_all_or_wait(Wait::For(Duration::from_secs(5)), &running, &mut out);
                out.len()
            })
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        running.store(false, Ordering::Release);
        queue.wake();

        assert_eq!(consumer.join().unwrap(), 0);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_clear() {
        let queue = HandoffQueue::new();
        queue.push(tagged(1));
        {
            let _consumer = queue.active.lock();
            queue.push(tagged(2));
        }
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producer_preserves_order() {
        let queue = create_shared_queue();
        let total = 2_000u32;

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for tag in 0..total {
                    queue.push(tagged(tag));
                    if tag % 64 == 0 {
                        thread::yield_now();
                    }
                }
            })
        };

        let running = AtomicBool::new(true);
        let mut out = VecDeque::new();
        let mut seen = Vec::with_capacity(total as usize);
        let deadline = Instant::now() + Duration::from_secs(10);
        while seen.len() < total as usize && Instant::now() < deadline {
            queue.pop_all_or_wait(Wait::For(Duration::from_millis(1)), &running, &mut out);
            seen.extend(out.drain(..).map(|p| tag_of(&p)));
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..total).collect::<Vec<_>>());
    }

    proptest! {
        // `true` = push with the consumer holding the lock, `false` = push freely,
        // interleaved with drains at arbitrary points.
        #[test]
        fn prop_order_preserved(ops in prop::collection::vec((any::<bool>(), any::<bool>()), 1..200)) {
            let queue = HandoffQueue::new();
            let mut seen = Vec::new();
            let mut next = 0u32;

            for (contended, drain) in ops {
                if contended {
                    let _consumer = queue.active.lock();
                    queue.push(tagged(next));
                } else {
                    queue.push(tagged(next));
                }
                next += 1;

                if drain {
                    seen.extend(drain_now(&queue));
                }
            }
            seen.extend(drain_now(&queue));

            prop_assert_eq!(seen, (0..next).collect::<Vec<_>>());
        }
    }
}
