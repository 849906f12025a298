//! Handling outcomes and caller-visible failures.

use serde::Serialize;
use thiserror::Error;

use reschedular_common::ScheduledAttempt;
use reschedular_store::{RecordKind, StoreError};

/// How handling an event ended when nothing went wrong.
///
/// `Scheduled` is the success case. The other variants are expected terminal
/// outcomes: the call still succeeds and the router turns them into a
/// follow-up event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Scheduled { attempt: ScheduledAttempt },
    /// A completion with no scheduled attempt behind it.
    AdhocCompletion { study_id: String },
    MaxAttemptsReached { study_id: String },
    AlreadyCompleted { study_id: String },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Scheduled { .. } => "scheduled",
            Outcome::AdhocCompletion { .. } => "adhoc_completion",
            Outcome::MaxAttemptsReached { .. } => "max_attempts_reached",
            Outcome::AlreadyCompleted { .. } => "already_completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Scheduled { .. })
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that abort the inbound call. None of them enqueue a follow-up.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("failed to load {kind} {id}: {source}")]
    NotFound {
        kind: RecordKind,
        id: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "failed to query {kind} records (questionnaire_id: {questionnaire_id}, participant_id: {participant_id}): {source}"
    )]
    QueryFailed {
        kind: RecordKind,
        questionnaire_id: String,
        participant_id: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed event: {0}")]
    Malformed(String),

    /// Anything else. The host must stop rather than keep running.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl HandleError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandleError::Unexpected(_))
    }
}
