//! Outbound event queue shared by the engine and the dispatcher.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event::Event;

/// Thread-safe FIFO of events awaiting delivery. Cloning shares the queue.
///
/// The lock is held only for a single push or pop, never across I/O.
/// There is no bound, priority, or deduplication.
#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<Event>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preallocate room for `capacity` events. Not a limit.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn push(&self, event: Event) {
        self.lock().push_back(event);
    }

    /// Remove and return the oldest event. Never blocks on an empty queue.
    pub fn pop(&self) -> Option<Event> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecurrenceEvent;
    use reschedular_common::AttemptStatus;

    fn event(id: usize) -> Event {
        Event::Recurrence(RecurrenceEvent {
            id: format!("s-{id}"),
            participant_id: "p-1".into(),
            questionnaire_id: "q-1".into(),
            status: AttemptStatus::Pending,
            scheduled_at: None,
        })
    }

    fn id_of(event: Event) -> String {
        match event {
            Event::Recurrence(e) => e.id,
            Event::Completion(e) => e.id,
        }
    }

    #[test]
    fn pop_on_empty_queue_returns_none() {
        let queue = EventQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn interleaved_pushes_and_pops_preserve_push_order() {
        let queue = EventQueue::with_capacity(4);
        let mut popped = Vec::new();

        queue.push(event(1));
        queue.push(event(2));
        popped.push(id_of(queue.pop().unwrap()));
        queue.push(event(3));
        popped.push(id_of(queue.pop().unwrap()));
        queue.push(event(4));
        queue.push(event(5));
        popped.push(id_of(queue.pop().unwrap()));

        assert_eq!(popped, vec!["s-1", "s-2", "s-3"]);
        assert_eq!(queue.len(), 2);
        assert_eq!(id_of(queue.pop().unwrap()), "s-4");
        assert_eq!(id_of(queue.pop().unwrap()), "s-5");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn clones_share_one_queue() {
        let queue = EventQueue::new();
        let producer = queue.clone();
        producer.push(event(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let queue = EventQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.push(event(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 1000);

        // Each producer's events come out in the order that producer pushed them.
        let mut last_seen = [None::<usize>; 4];
        while let Some(e) = queue.pop() {
            let n: usize = id_of(e).trim_start_matches("s-").parse().unwrap();
            let (t, i) = (n / 1000, n % 1000);
            if let Some(prev) = last_seen[t] {
                assert!(i > prev);
            }
            last_seen[t] = Some(i);
        }
    }
}
