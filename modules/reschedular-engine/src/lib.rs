//! Event-driven recurrence engine for questionnaire scheduling.
//!
//! An inbound event runs against the persistence port, its outcome is routed
//! into at most one follow-up event, and the follow-up is queued for the
//! background dispatcher to publish. Completion and recurrence events feed
//! each other through this loop until a terminal completion is emitted.

pub mod broker;
pub mod deps;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod handlers;
pub mod outcome;
pub mod queue;
pub mod router;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use broker::{Broker, DeadLetterSink, HttpBroker, LogBroker, LogDeadLetter, PublishError};
pub use deps::Deps;
pub use dispatcher::{Delivery, Dispatcher, DispatcherConfig, DispatcherHandle, RetryPolicy};
pub use engine::Reschedular;
pub use event::{CompletionEvent, Event, OutboundMessage, RecurrenceEvent, WireAttributes, WireValue};
pub use outcome::{HandleError, Outcome};
pub use queue::EventQueue;
pub use traits::EventLike;
