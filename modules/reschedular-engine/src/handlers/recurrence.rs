use tracing::info;

use reschedular_common::{AttemptStatus, Participant, Questionnaire, ScheduledAttempt};

use super::{attempt_results, load, persist};
use crate::deps::Deps;
use crate::event::RecurrenceEvent;
use crate::outcome::{HandleError, Outcome};

/// A scheduled attempt's window came round: open a new slot unless the
/// attempt was already completed or the limit is used up.
///
/// On success the event is given the slot's due time.
pub async fn handle_recurrence(
    event: &mut RecurrenceEvent,
    deps: &Deps,
) -> Result<Outcome, HandleError> {
    let questionnaire: Questionnaire = load(deps, &event.questionnaire_id).await?;
    let participant: Participant = load(deps, &event.participant_id).await?;

    if event.status == AttemptStatus::Completed {
        info!(attempt_id = %event.id, "Scheduled attempt already completed");
        return Ok(Outcome::AlreadyCompleted {
            study_id: questionnaire.study_id,
        });
    }

    let results = attempt_results(deps, &questionnaire.id, &participant.id, &event.id).await?;
    if !questionnaire.can_attempt(results.count()) {
        info!(
            attempt_id = %event.id,
            attempts = results.count(),
            "Maximum attempts reached"
        );
        return Ok(Outcome::MaxAttemptsReached {
            study_id: questionnaire.study_id,
        });
    }

    // The slot keeps the event's id so results keep counting against it.
    let attempt = ScheduledAttempt::pending(
        event.id.clone(),
        &questionnaire,
        participant.id,
        deps.clock.now(),
    );
    persist(deps, &attempt).await?;

    info!(
        attempt_id = %attempt.id,
        scheduled_at = %attempt.scheduled_at,
        "Scheduled recurrence"
    );
    event.scheduled_at = Some(attempt.scheduled_at);
    Ok(Outcome::Scheduled { attempt })
}
