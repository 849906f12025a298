//! Background delivery of queued events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use reschedular_common::file_config::DispatcherSection;

use crate::broker::{Broker, DeadLetterSink, LogDeadLetter};
use crate::event::Event;
use crate::queue::EventQueue;
use crate::traits::EventLike;

/// Bounded retry around a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total publish attempts per event, including the first. Zero counts as one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Publish once; on failure, drop.
    pub fn best_effort() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::best_effort()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&DispatcherSection> for DispatcherConfig {
    fn from(section: &DispatcherSection) -> Self {
        Self {
            poll_interval: section.poll_interval(),
            retry: RetryPolicy {
                max_attempts: section.retry.max_attempts,
                backoff: Duration::from_millis(section.retry.backoff_ms),
            },
        }
    }
}

/// Result of delivering one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    /// Every attempt failed; the event went to the dead-letter sink.
    Dropped { attempts: u32 },
}

/// Drains the event queue into a broker.
pub struct Dispatcher {
    queue: EventQueue,
    broker: Arc<dyn Broker>,
    dead_letter: Arc<dyn DeadLetterSink>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(queue: EventQueue, broker: Arc<dyn Broker>, config: DispatcherConfig) -> Self {
        Self {
            queue,
            broker,
            dead_letter: Arc::new(LogDeadLetter),
            config,
        }
    }

    pub fn with_dead_letter(mut self, dead_letter: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = dead_letter;
        self
    }

    /// Pop one event and deliver it. `None` when the queue was empty.
    pub async fn dispatch_next(&self) -> Option<Delivery> {
        let event = self.queue.pop()?;
        Some(self.deliver(&event).await)
    }

    pub async fn deliver(&self, event: &Event) -> Delivery {
        let message = event.to_message();
        let max_attempts = self.config.retry.attempts();
        let mut attempt = 1;

        loop {
            match self.broker.publish(&message).await {
                Ok(()) => {
                    debug!(event_type = %message.body, attempt, "Event delivered");
                    return Delivery::Delivered { attempts: attempt };
                }
                Err(e) if attempt < max_attempts => {
                    warn!(event_type = %message.body, attempt, error = %e, "Publish failed, retrying");
                    tokio::time::sleep(self.config.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(event_type = %message.body, attempts = attempt, error = %e, "Publish failed, giving up");
                    self.dead_letter.record(&message, &e).await;
                    return Delivery::Dropped { attempts: attempt };
                }
            }
        }
    }

    /// Spawn the delivery loop on the current tokio runtime.
    pub fn start(self) -> DispatcherHandle {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(self.run(signal));
        DispatcherHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_attempts = self.config.retry.attempts(),
            "Dispatcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            if self.dispatch_next().await.is_some() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    // Sender gone means nobody can stop us later either.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let remaining = self.queue.len();
        if remaining > 0 {
            warn!(remaining, "Dispatcher stopped with undelivered events");
        } else {
            info!("Dispatcher stopped");
        }
    }
}

/// Owner's side of a running dispatcher.
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal the loop to stop and wait for its current iteration to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        // Err only if the loop already exited.
        let _ = self.shutdown.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
