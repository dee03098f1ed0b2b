//! A manually stepped timer queue.
//!
//! The session never sleeps. It schedules events at a delay on a virtual
//! clock, and whoever drives it (the terminal loop or a test) decides how
//! far the clock moves. Events due at the same instant fire in the order
//! they were scheduled.

use std::collections::BTreeMap;
use std::time::Duration;

/// Handle for a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    now: Duration,
    queue: BTreeMap<(Duration, TaskId), E>,
    next_id: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            queue: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Queue `event` to fire `delay` after now.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.insert((self.now + delay, id), event);
        id
    }

    /// Drop a pending event. Returns it if it had not fired yet.
    pub fn cancel(&mut self, id: TaskId) -> Option<E> {
        let key = *self.queue.keys().find(|(_, task)| *task == id)?;
        self.queue.remove(&key)
    }

    /// Drop every pending event matching `predicate`.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&E) -> bool) {
        self.queue.retain(|_, event| !predicate(event));
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// When the earliest pending event is due.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Earliest due time among events matching `predicate`.
    pub fn next_due_where(&self, mut predicate: impl FnMut(&E) -> bool) -> Option<Duration> {
        self.queue
            .iter()
            .find(|(_, event)| predicate(event))
            .map(|((at, _), _)| *at)
    }

    /// Pop the earliest event due at or before `until`, moving the clock to its time.
    pub fn pop_due(&mut self, until: Duration) -> Option<E> {
        let (&(at, id), _) = self.queue.iter().next()?;
        if at > until {
            return None;
        }
        self.now = self.now.max(at);
        self.queue.remove(&(at, id))
    }

    /// Move the clock forward without firing anything. Never moves backwards.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule(ms(300), "late");
        s.schedule(ms(100), "early");
        s.schedule(ms(100), "early-second");

        assert_eq!(s.pop_due(ms(50)), None);
        assert_eq!(s.pop_due(ms(1000)), Some("early"));
        assert_eq!(s.now(), ms(100));
        assert_eq!(s.pop_due(ms(1000)), Some("early-second"));
        assert_eq!(s.pop_due(ms(1000)), Some("late"));
        assert_eq!(s.now(), ms(300));
        assert!(s.is_empty());
    }

    #[test]
    fn test_schedule_is_relative_to_now() {
        let mut s = Scheduler::new();
        s.set_now(ms(500));
        s.schedule(ms(100), 1);
        assert_eq!(s.next_due(), Some(ms(600)));
        s.set_now(ms(200));
        assert_eq!(s.now(), ms(500));
    }

    #[test]
    fn test_cancel() {
        let mut s = Scheduler::new();
        let a = s.schedule(ms(100), 'a');
        s.schedule(ms(200), 'b');
        assert_eq!(s.cancel(a), Some('a'));
        assert_eq!(s.cancel(a), None);
        assert_eq!(s.pop_due(ms(1000)), Some('b'));
    }

    #[test]
    fn test_cancel_where_and_next_due_where() {
        let mut s = Scheduler::new();
        s.schedule(ms(100), 1);
        s.schedule(ms(200), 2);
        s.schedule(ms(300), 3);
        assert_eq!(s.next_due_where(|e| *e > 1), Some(ms(200)));
        s.cancel_where(|e| e % 2 == 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.pop_due(ms(1000)), Some(2));
    }
}
