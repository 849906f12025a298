//! Outbound delivery: the broker port and its backends.

pub mod backend;
pub mod dead_letter;
pub mod http;
pub mod log;

pub use backend::{Broker, PublishError};
pub use dead_letter::{DeadLetterSink, LogDeadLetter};
pub use http::HttpBroker;
pub use log::LogBroker;
