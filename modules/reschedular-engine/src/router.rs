//! Outcome to follow-up mapping.

use chrono::{DateTime, Utc};

use crate::event::{CompletionEvent, Event, RecurrenceEvent};
use crate::outcome::{HandleError, Outcome};

/// What the engine does after a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Queue this event for delivery.
    Enqueue(Event),
    /// The handler failed; hand the error back to the caller.
    Propagate,
    /// The handler failed in a way the process cannot recover from.
    Fatal,
}

/// Decide the follow-up for a handled event.
///
/// | outcome    | completion              | recurrence                      |
/// |------------|-------------------------|---------------------------------|
/// | scheduled  | recurrence for new slot | the original, with its due time |
/// | terminal   | the original, unchanged | terminal completion at `now`    |
/// | error      | nothing                 | nothing                         |
pub fn route(event: Event, result: &Result<Outcome, HandleError>, now: DateTime<Utc>) -> Route {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => return Route::Fatal,
        Err(_) => return Route::Propagate,
    };

    // Handlers never pair a completion with AlreadyCompleted or a recurrence
    // with AdhocCompletion; those cells reuse their row's terminal rule.
    let follow_up = match (event, outcome) {
        (Event::Completion(_), Outcome::Scheduled { attempt }) => {
            Event::Recurrence(RecurrenceEvent::from(attempt))
        }
        (Event::Recurrence(recurrence), Outcome::Scheduled { .. }) => {
            Event::Recurrence(recurrence)
        }
        (
            Event::Completion(completion),
            Outcome::AdhocCompletion { .. }
            | Outcome::MaxAttemptsReached { .. }
            | Outcome::AlreadyCompleted { .. },
        ) => Event::Completion(completion),
        (
            Event::Recurrence(recurrence),
            Outcome::AdhocCompletion { study_id }
            | Outcome::MaxAttemptsReached { study_id }
            | Outcome::AlreadyCompleted { study_id },
        ) => Event::Completion(CompletionEvent::terminal(
            recurrence.participant_id,
            study_id.clone(),
            recurrence.questionnaire_id,
            now,
        )),
    };

    Route::Enqueue(follow_up)
}
