use tracing::info;

use reschedular_common::{Participant, Questionnaire, ScheduledAttempt};

use super::{attempt_results, list_for_pair, load, persist};
use crate::deps::Deps;
use crate::event::CompletionEvent;
use crate::outcome::{HandleError, Outcome};

/// A participant finished an attempt: schedule the next one if the
/// questionnaire still allows it.
pub async fn handle_completion(
    event: &CompletionEvent,
    deps: &Deps,
) -> Result<Outcome, HandleError> {
    let questionnaire: Questionnaire = load(deps, &event.questionnaire_id).await?;
    let participant: Participant = load(deps, &event.participant_id).await?;

    let slots: Vec<ScheduledAttempt> =
        list_for_pair(deps, &questionnaire.id, &participant.id, None).await?;
    if slots.is_empty() {
        info!(
            questionnaire_id = %questionnaire.id,
            participant_id = %participant.id,
            "No scheduled attempts, treating completion as ad hoc"
        );
        return Ok(Outcome::AdhocCompletion {
            study_id: questionnaire.study_id,
        });
    }

    let results = attempt_results(deps, &questionnaire.id, &participant.id, &event.id).await?;
    if event.is_terminal() || !questionnaire.can_attempt(results.count()) {
        info!(
            questionnaire_id = %questionnaire.id,
            participant_id = %participant.id,
            attempts = results.count(),
            remaining_completions = event.remaining_completions,
            "Maximum attempts reached"
        );
        return Ok(Outcome::MaxAttemptsReached {
            study_id: questionnaire.study_id,
        });
    }

    let completed_at = event.parsed_completed_at().map_err(|e| {
        HandleError::Malformed(format!("CompletedAt {:?}: {e}", event.completed_at))
    })?;

    let attempt = ScheduledAttempt::pending(
        deps.ids.generate_id(),
        &questionnaire,
        participant.id,
        completed_at,
    );
    persist(deps, &attempt).await?;

    info!(
        attempt_id = %attempt.id,
        questionnaire_id = %attempt.questionnaire_id,
        participant_id = %attempt.participant_id,
        scheduled_at = %attempt.scheduled_at,
        "Scheduled next attempt"
    );
    Ok(Outcome::Scheduled { attempt })
}
