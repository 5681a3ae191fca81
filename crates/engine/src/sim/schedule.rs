use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// An entry that came due, with the simulated time it was scheduled for.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    pub at: Duration,
    pub event: T,
}

#[derive(Debug)]
struct Entry<T> {
    at: Duration,
    seq: u64,
    event: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest entry; ties pop in insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Fire-at queue on a simulated clock. The clock moves only through
/// [`Scheduler::advance`], so not advancing it freezes every pending entry.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn schedule_at(&mut self, at: Duration, event: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { at, seq, event });
    }

    pub fn schedule_after(&mut self, delay: Duration, event: T) {
        self.schedule_at(self.now + delay, event);
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    /// Pops the earliest entry due at or before the current time.
    pub fn pop_due(&mut self) -> Option<Fired<T>> {
        if self.queue.peek()?.at > self.now {
            return None;
        }
        self.queue.pop().map(|entry| Fired {
            at: entry.at,
            event: entry.event,
        })
    }

    /// Drops every pending entry and returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn drain(scheduler: &mut Scheduler<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| scheduler.pop_due())
            .map(|fired| fired.event)
            .collect()
    }

    #[test]
    fn entries_fire_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(300), "c");
        scheduler.schedule_after(ms(100), "a");
        scheduler.schedule_after(ms(200), "b");

        scheduler.advance(ms(150));
        assert_eq!(drain(&mut scheduler), vec!["a"]);
        scheduler.advance(ms(200));
        assert_eq!(drain(&mut scheduler), vec!["b", "c"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn equal_fire_times_keep_insertion_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(10), "first");
        scheduler.schedule_after(ms(10), "second");
        scheduler.advance(ms(10));
        assert_eq!(drain(&mut scheduler), vec!["first", "second"]);
    }

    #[test]
    fn nothing_fires_without_advancing() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(1), "x");
        assert!(scheduler.pop_due().is_none());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn fired_entry_reports_scheduled_time() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(40), "x");
        scheduler.advance(ms(100));
        let fired = scheduler.pop_due().expect("due");
        assert_eq!(fired.at, ms(40));
        assert_eq!(scheduler.now(), ms(100));
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(1), "a");
        scheduler.schedule_after(ms(2), "b");
        assert_eq!(scheduler.cancel_all(), 2);
        scheduler.advance(ms(10));
        assert!(scheduler.pop_due().is_none());
    }
}
