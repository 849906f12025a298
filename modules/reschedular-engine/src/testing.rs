// Test doubles for the engine's ports.
//
// - RecordingBroker (Broker): keeps every published message, can fail the first N
// - RecordingDeadLetter (DeadLetterSink): keeps every dropped message
// - TestHarness: MemoryRecordStore + FixedClock + SequentialIds wired into a Reschedular
//
// Plus fixture builders for questionnaires, participants and results.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use reschedular_common::{
    AttemptResult, AttemptStatus, FixedClock, Participant, Questionnaire, ScheduledAttempt,
    SequentialIds,
};
use reschedular_store::MemoryRecordStore;

use crate::broker::{Broker, DeadLetterSink, PublishError};
use crate::deps::Deps;
use crate::engine::Reschedular;
use crate::event::{CompletionEvent, OutboundMessage, RecurrenceEvent};
use crate::queue::EventQueue;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// The instant every harness clock is frozen at.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 7, 18, 10, 0, 0).unwrap()
}

pub fn questionnaire(id: &str, max_attempts: Option<i64>, hours: Option<i64>) -> Questionnaire {
    Questionnaire {
        id: id.into(),
        study_id: "study-1".into(),
        name: "Daily mood".into(),
        max_attempts,
        hours_between_attempts: hours,
    }
}

pub fn participant(id: &str) -> Participant {
    Participant {
        id: id.into(),
        name: format!("Participant {id}"),
    }
}

pub fn attempt_result(
    id: &str,
    questionnaire_id: &str,
    participant_id: &str,
    scheduled_attempt_id: &str,
) -> AttemptResult {
    AttemptResult {
        id: id.into(),
        questionnaire_id: questionnaire_id.into(),
        participant_id: participant_id.into(),
        scheduled_attempt_id: Some(scheduled_attempt_id.into()),
        completed_at: Some(now()),
    }
}

pub fn scheduled_attempt(id: &str, questionnaire_id: &str, participant_id: &str) -> ScheduledAttempt {
    ScheduledAttempt {
        id: id.into(),
        questionnaire_id: questionnaire_id.into(),
        participant_id: participant_id.into(),
        scheduled_at: now(),
        status: AttemptStatus::Pending,
    }
}

pub fn completion(
    scheduled_attempt_id: &str,
    questionnaire_id: &str,
    participant_id: &str,
    remaining_completions: u32,
) -> CompletionEvent {
    CompletionEvent {
        id: scheduled_attempt_id.into(),
        participant_id: participant_id.into(),
        study_id: "study-1".into(),
        questionnaire_id: questionnaire_id.into(),
        completed_at: "2022-07-18T09:30:00Z".into(),
        remaining_completions,
    }
}

pub fn recurrence(
    scheduled_attempt_id: &str,
    questionnaire_id: &str,
    participant_id: &str,
    status: AttemptStatus,
) -> RecurrenceEvent {
    RecurrenceEvent {
        id: scheduled_attempt_id.into(),
        participant_id: participant_id.into(),
        questionnaire_id: questionnaire_id.into(),
        status,
        scheduled_at: None,
    }
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

/// A `Reschedular` over an in-memory store, frozen clock and predictable ids
/// (`slot-1`, `slot-2`, ...).
pub struct TestHarness {
    pub store: Arc<MemoryRecordStore>,
    pub queue: EventQueue,
    pub engine: Reschedular,
}

impl TestHarness {
    pub fn new(store: MemoryRecordStore) -> Self {
        let store = Arc::new(store);
        let queue = EventQueue::new();
        let deps = Deps::new(
            store.clone(),
            Arc::new(FixedClock::new(now())),
            Arc::new(SequentialIds::new("slot")),
            queue.clone(),
        );
        Self {
            store,
            queue,
            engine: Reschedular::new(deps),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingBroker
// ---------------------------------------------------------------------------

/// Records published messages. `failing(n)` rejects the first `n` publishes.
#[derive(Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<OutboundMessage>>,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Message bodies (event names) in publish order.
    pub fn bodies(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.body).collect()
    }

    /// Publish calls, successful or not.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Other("broker unavailable".into()));
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingDeadLetter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingDeadLetter {
    dropped: Mutex<Vec<(OutboundMessage, String)>>,
}

impl RecordingDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dropped messages with the error that finished them off.
    pub fn dropped(&self) -> Vec<(OutboundMessage, String)> {
        self.dropped.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetter {
    async fn record(&self, message: &OutboundMessage, error: &PublishError) {
        self.dropped
            .lock()
            .unwrap()
            .push((message.clone(), error.to_string()));
    }
}
