//! Virtual clock and task scheduler.
//!
//! Tasks are registered at absolute timestamps and popped in time order. Ties
//! are broken by registration order, so two tasks due at the same instant fire
//! in the order they were scheduled. Repeating tasks keep their handle across
//! repeats; unscheduling a handle drops every future repeat.
//!
//! The heap never removes entries eagerly. Each registration remembers the
//! sequence number of its live heap entry and anything else is skipped on pop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use log::trace;

use crate::ids::TaskHandle;

#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    time: f64,
    seq: u64,
    handle: TaskHandle,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest time first, then earliest registration
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct Registration<T> {
    task: T,
    repeat: Option<f64>,
    seq: u64,
}

/// A task popped from the queue.
#[derive(Clone, Debug, PartialEq)]
pub struct Due<T> {
    pub handle: TaskHandle,
    pub task: T,
    /// Scheduled time of this firing.
    pub time: f64,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now: f64,
    next_seq: u64,
    next_handle: u64,
    queue: BinaryHeap<QueueEntry>,
    live: HashMap<TaskHandle, Registration<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(now: f64) -> Self {
        Self {
            now,
            next_seq: 0,
            next_handle: 0,
            queue: BinaryHeap::new(),
            live: HashMap::new(),
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Register `task` at `event_time`, repeating every `repeat` seconds until
    /// unscheduled when given.
    pub fn schedule(&mut self, task: T, event_time: f64, repeat: Option<f64>) -> TaskHandle {
        debug_assert!(repeat.map_or(true, |r| r > 0.0), "repeat interval must be positive");
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        let seq = self.push_entry(handle, event_time);
        trace!("schedule {:?} at {event_time} (repeat {repeat:?})", handle);
        self.live.insert(handle, Registration { task, repeat, seq });
        handle
    }

    /// Drop a registration. Returns false when the handle had already fired
    /// (one-shot) or been unscheduled.
    pub fn unschedule(&mut self, handle: TaskHandle) -> bool {
        let removed = self.live.remove(&handle).is_some();
        if removed {
            trace!("unschedule {:?}", handle);
        }
        removed
    }

    #[inline]
    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Number of live registrations.
    #[inline]
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Time of the next live firing, if any.
    pub fn peek_time(&mut self) -> Option<f64> {
        self.discard_stale();
        self.queue.peek().map(|e| e.time)
    }

    /// Move the clock forward without firing anything. Never moves backward.
    pub fn advance(&mut self, to: f64) {
        if to > self.now {
            self.now = to;
        }
    }

    fn push_entry(&mut self, handle: TaskHandle, time: f64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueueEntry { time, seq, handle });
        seq
    }

    fn is_live(&self, entry: &QueueEntry) -> bool {
        self.live
            .get(&entry.handle)
            .map_or(false, |reg| reg.seq == entry.seq)
    }

    fn discard_stale(&mut self) {
        while let Some(top) = self.queue.peek() {
            if self.is_live(top) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pop the next task due at or before `until` and move the clock to its
    /// time. Repeating tasks are re-registered before being returned.
    pub fn pop_due(&mut self, until: f64) -> Option<Due<T>> {
        self.discard_stale();
        let top = *self.queue.peek()?;
        if top.time > until {
            return None;
        }
        self.queue.pop();
        self.advance(top.time);

        let repeat = self.live.get(&top.handle).and_then(|reg| reg.repeat);
        let task = match repeat {
            Some(interval) => {
                let seq = self.push_entry(top.handle, top.time + interval);
                let reg = self.live.get_mut(&top.handle)?;
                reg.seq = seq;
                reg.task.clone()
            }
            None => self.live.remove(&top.handle)?.task,
        };
        trace!("fire {:?} at {}", top.handle, top.time);
        Some(Due {
            handle: top.handle,
            task,
            time: top.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>, until: f64) -> Vec<(&'static str, f64)> {
        let mut out = Vec::new();
        while let Some(due) = s.pop_due(until) {
            out.push((due.task, due.time));
        }
        out
    }

    #[test]
    fn fires_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule("late", 2.0, None);
        s.schedule("early", 1.0, None);
        assert_eq!(drain(&mut s, 10.0), vec![("early", 1.0), ("late", 2.0)]);
        assert_eq!(s.now(), 2.0);
    }

    #[test]
    fn same_time_fires_in_registration_order() {
        let mut s = Scheduler::new();
        s.schedule("a", 1.0, None);
        s.schedule("b", 1.0, None);
        s.schedule("c", 1.0, None);
        let names: Vec<_> = drain(&mut s, 1.0).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn unscheduled_tasks_never_fire() {
        let mut s = Scheduler::new();
        let h = s.schedule("gone", 1.0, None);
        s.schedule("kept", 1.5, None);
        assert!(s.unschedule(h));
        assert!(!s.unschedule(h));
        assert_eq!(drain(&mut s, 5.0), vec![("kept", 1.5)]);
    }

    #[test]
    fn repeating_task_fires_until_unscheduled() {
        let mut s = Scheduler::new();
        let h = s.schedule("tick", 1.0, Some(0.5));
        let fired = drain(&mut s, 2.0);
        assert_eq!(fired, vec![("tick", 1.0), ("tick", 1.5), ("tick", 2.0)]);
        assert!(s.is_scheduled(h));
        assert_eq!(s.peek_time(), Some(2.5));
        s.unschedule(h);
        assert_eq!(s.peek_time(), None);
        assert!(drain(&mut s, 10.0).is_empty());
    }

    #[test]
    fn clock_never_moves_backward() {
        let mut s: Scheduler<&'static str> = Scheduler::starting_at(5.0);
        s.schedule("past", 1.0, None);
        let due = s.pop_due(5.0).unwrap();
        assert_eq!(due.time, 1.0);
        assert_eq!(s.now(), 5.0);
        s.advance(3.0);
        assert_eq!(s.now(), 5.0);
    }

    #[test]
    fn tasks_after_horizon_stay_queued() {
        let mut s = Scheduler::new();
        s.schedule("later", 3.0, None);
        assert!(s.pop_due(2.0).is_none());
        assert_eq!(s.pending(), 1);
    }
}
