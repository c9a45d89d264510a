//! Delayed actions run by the event loop

use std::time::{Duration, Instant};

use super::queue::WorkItem;

/// Stand-in deadline offset for delays too long to represent
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Identifies a scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    deadline: Instant,
    item: WorkItem,
}

/// Pending timers, kept in firing order
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    // Sorted by deadline; equal deadlines keep insertion order
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, delay: Duration, item: WorkItem, now: Instant) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        // Saturate instead of overflowing on "never" style delays
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let index = self.timers.partition_point(|t| t.deadline <= deadline);
        self.timers.insert(index, Timer { id, deadline, item });
        id
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(index) => {
                self.timers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.timers.first().map(|t| t.deadline)
    }

    /// Remove and return every timer due at `now`, in firing order
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<WorkItem> {
        let due = self.timers.partition_point(|t| t.deadline <= now);
        self.timers.drain(..due).map(|t| t.item).collect()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> WorkItem {
        let log = Arc::clone(log);
        WorkItem::detached(move || log.lock().push(value))
    }

    #[test]
    fn test_fires_in_deadline_then_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        let mut timers = TimerQueue::default();
        timers.schedule(Duration::from_millis(30), recording(&log, 3), now);
        timers.schedule(Duration::from_millis(10), recording(&log, 1), now);
        timers.schedule(Duration::from_millis(10), recording(&log, 2), now);

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(10)));
        for item in timers.take_due(now + Duration::from_millis(15)) {
            item.run();
        }
        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(timers.clear(), 1);
    }

    #[test]
    fn test_overlong_delay_saturates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        let mut timers = TimerQueue::default();
        timers.schedule(Duration::MAX, recording(&log, 1), now);
        timers.schedule(Duration::from_secs(1), recording(&log, 2), now);

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(1)));
        let due = timers.take_due(now + Duration::from_secs(60 * 60 * 24 * 365));
        assert_eq!(due.len(), 1);
        assert_eq!(timers.clear(), 1);
    }

    #[test]
    fn test_cancel() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        let mut timers = TimerQueue::default();
        let id = timers.schedule(Duration::ZERO, recording(&log, 1), now);

        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.take_due(now).is_empty());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_clear_counts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        let mut timers = TimerQueue::default();
        timers.schedule(Duration::from_secs(1), recording(&log, 1), now);
        timers.schedule(Duration::from_secs(2), recording(&log, 2), now);
        assert_eq!(timers.clear(), 2);
        assert_eq!(timers.next_deadline(), None);
    }
}
