//! Core trait for outbound events.

use crate::event::{OutboundMessage, WireAttributes};

/// Events carry a stable name and know how to flatten themselves into wire
/// attributes for the broker.
pub trait EventLike: Clone + Send + Sync + 'static {
    /// The name used as the inbound `Name` tag and as the outbound message body.
    fn name(&self) -> &'static str;

    /// One attribute per event field, keyed by its stable wire name.
    fn to_wire_attributes(&self) -> WireAttributes;

    fn to_message(&self) -> OutboundMessage {
        OutboundMessage {
            body: self.name().to_string(),
            attributes: self.to_wire_attributes(),
        }
    }
}
