use std::sync::Arc;

use reschedular_common::{Clock, IdGenerator};
use reschedular_store::RecordStore;

use crate::queue::EventQueue;

/// Services every handling call needs, passed explicitly.
#[derive(Clone)]
pub struct Deps {
    pub store: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub queue: EventQueue,
}

impl Deps {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        queue: EventQueue,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            queue,
        }
    }
}
