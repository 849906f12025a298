//! The inbound entry point.

use tracing::{error, info, warn};

use crate::deps::Deps;
use crate::event::Event;
use crate::handlers;
use crate::outcome::{HandleError, Outcome};
use crate::queue::EventQueue;
use crate::router::{self, Route};
use crate::traits::EventLike;

/// Handles one inbound event at a time: run the handler, route the outcome,
/// queue the follow-up.
///
/// Concurrent calls run independently. Nothing here serializes two calls
/// that race to create a slot for the same questionnaire and participant.
#[derive(Clone)]
pub struct Reschedular {
    deps: Deps,
}

impl Reschedular {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    pub fn queue(&self) -> &EventQueue {
        &self.deps.queue
    }

    /// Handle `event` and queue its follow-up.
    ///
    /// Terminal outcomes are successes; their follow-up is already queued
    /// when this returns. Dropping the future before it completes abandons
    /// the call without queueing anything.
    pub async fn handle(&self, event: Event) -> Result<Outcome, HandleError> {
        let mut event = event;
        let event_type = event.name();
        let participant_id = event.participant_id().to_string();
        let questionnaire_id = event.questionnaire_id().to_string();

        let result = handlers::handle(&mut event, &self.deps).await;

        match router::route(event, &result, self.deps.clock.now()) {
            Route::Enqueue(follow_up) => {
                let outcome = result.as_ref().map_or("", Outcome::as_str);
                info!(
                    event_type,
                    %participant_id,
                    %questionnaire_id,
                    outcome,
                    follow_up = follow_up.name(),
                    "Event handled"
                );
                self.deps.queue.push(follow_up);
            }
            Route::Propagate => {
                if let Err(e) = &result {
                    warn!(event_type, %participant_id, %questionnaire_id, error = %e, "Event handling failed");
                }
            }
            Route::Fatal => {
                if let Err(e) = &result {
                    error!(event_type, %participant_id, %questionnaire_id, error = ?e, "Unrecoverable failure handling event");
                }
            }
        }

        result
    }
}
