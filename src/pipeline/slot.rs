//! Single-slot overwrite queue between the capture and classifier workers.
//!
//! `put` never blocks: an unread value is replaced. `take_timeout` blocks
//! the reader until a value arrives or the timeout passes.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// One-element handoff where the newest value always wins.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `value`, returning the unread value it displaced, if any.
    pub fn put(&self, value: T) -> Option<T> {
        let displaced = self.value.lock().replace(value);
        self.ready.notify_one();
        displaced
    }

    /// Take the value without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.value.lock().take()
    }

    /// Wait up to `timeout` for a value. `None` on timeout.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.value.lock();
        if guard.is_none() {
            // Spurious wakeups simply fall through to the take below.
            let _ = self.ready.wait_for(&mut guard, timeout);
        }
        guard.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_put_overwrites() {
        let slot = LatestSlot::new();
        assert_eq!(slot.put(1), None);
        assert_eq!(slot.put(2), Some(1));
        assert_eq!(slot.try_take(), Some(2));
        assert_eq!(slot.try_take(), None);
    }

    #[test]
    fn test_take_timeout_empty() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        let start = Instant::now();
        assert_eq!(slot.take_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_take_ready_value_immediately() {
        let slot = LatestSlot::new();
        slot.put("frame");
        assert_eq!(slot.take_timeout(Duration::from_secs(5)), Some("frame"));
    }

    #[test]
    fn test_wakes_waiting_reader() {
        let slot = Arc::new(LatestSlot::new());
        let writer = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.put(7u32);
        });
        let mut got = None;
        let deadline = Instant::now() + Duration::from_secs(5);
        while got.is_none() && Instant::now() < deadline {
            got = slot.take_timeout(Duration::from_millis(100));
        }
        handle.join().unwrap();
        assert_eq!(got, Some(7));
    }

    #[test]
    fn test_reader_sees_latest_only() {
        let slot = LatestSlot::new();
        for i in 0..100 {
            slot.put(i);
        }
        assert_eq!(slot.take_timeout(Duration::from_millis(1)), Some(99));
        assert_eq!(slot.try_take(), None);
    }
}
