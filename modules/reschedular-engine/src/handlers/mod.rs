//! Per-variant handlers plus the lookups they share.

mod completion;
mod recurrence;

pub use completion::handle_completion;
pub use recurrence::handle_recurrence;

use anyhow::Context;

use reschedular_common::{AttemptResult, AttemptResults, ScheduledAttempt};
use reschedular_store::{Filter, RecordKind, RecordStoreExt, StoreError, Table};

use crate::deps::Deps;
use crate::event::Event;
use crate::outcome::{HandleError, Outcome};

/// Run the handler for `event`. A successful recurrence fills in the event's
/// due time in place so the router can forward it.
pub async fn handle(event: &mut Event, deps: &Deps) -> Result<Outcome, HandleError> {
    match event {
        Event::Completion(e) => handle_completion(e, deps).await,
        Event::Recurrence(e) => handle_recurrence(e, deps).await,
    }
}

/// Load one record. Every failure reads as "not found" to the caller.
async fn load<T: Table>(deps: &Deps, id: &str) -> Result<T, HandleError> {
    deps.store
        .fetch::<T>(id)
        .await
        .map_err(|source| HandleError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
            source,
        })
}

/// List records, treating "no rows" the same as an empty result.
async fn list_for_pair<T: Table>(
    deps: &Deps,
    questionnaire_id: &str,
    participant_id: &str,
    extra: Option<Filter>,
) -> Result<Vec<T>, HandleError> {
    let mut filters = vec![
        Filter::equals("questionnaire_id", questionnaire_id),
        Filter::equals("participant_id", participant_id),
    ];
    filters.extend(extra);

    match deps.store.list::<T>(&filters).await {
        Ok(records) => Ok(records),
        Err(StoreError::NoRows) => Ok(Vec::new()),
        Err(source) => Err(HandleError::QueryFailed {
            kind: T::KIND,
            questionnaire_id: questionnaire_id.to_string(),
            participant_id: participant_id.to_string(),
            source,
        }),
    }
}

/// Results recorded against one scheduled attempt. Their count is the
/// number of attempts used so far.
async fn attempt_results(
    deps: &Deps,
    questionnaire_id: &str,
    participant_id: &str,
    scheduled_attempt_id: &str,
) -> Result<AttemptResults, HandleError> {
    let results = list_for_pair::<AttemptResult>(
        deps,
        questionnaire_id,
        participant_id,
        Some(Filter::equals("questionnaire_schedule_id", scheduled_attempt_id)),
    )
    .await?;
    Ok(AttemptResults::new(results))
}

/// Persist a new slot. A failed write leaves the engine in an unknown state.
/// The `StoreError` (for example `Duplicate`) stays reachable through
/// `anyhow::Error::downcast_ref`.
async fn persist(deps: &Deps, attempt: &ScheduledAttempt) -> Result<(), HandleError> {
    deps.store
        .insert(attempt)
        .await
        .with_context(|| format!("failed to persist {} {}", RecordKind::ScheduledAttempt, attempt.id))
        .map_err(HandleError::Unexpected)
}
