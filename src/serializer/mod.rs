pub use json::JsonSerializer;

use crate::event::Event;
use crate::store::Record;

mod json;

/// Converts events to and from their persisted [`Record`] form.
///
/// Neither the [`crate::Repository`] nor any [`crate::store::EventStore`] know the concrete event
/// types: the serializer is the only place where a logical event name is resolved to a shape.
pub trait Serializer: Send + Sync {
    /// Converts an event into its persisted form.
    fn marshal_event(&self, event: &dyn Event) -> Result<Record, SerializerError>;

    /// Converts a persisted record back into a fresh event instance.
    fn unmarshal_event(&self, record: &Record) -> Result<Box<dyn Event>, SerializerError>;
}

impl<T> Serializer for std::sync::Arc<T>
where
    T: Serializer + ?Sized,
{
    fn marshal_event(&self, event: &dyn Event) -> Result<Record, SerializerError> {
        (**self).marshal_event(event)
    }

    fn unmarshal_event(&self, record: &Record) -> Result<Box<dyn Event>, SerializerError> {
        (**self).unmarshal_event(record)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SerializerError {
    /// The event, or the envelope wrapping it, could not be encoded.
    #[error("unable to encode event {event_type}: {source}")]
    EncodeFailed {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The record payload is not a valid envelope.
    #[error("unable to decode event envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    /// No event shape has been bound to the logical name found in the envelope.
    #[error("unbound event type {0}")]
    UnboundType(String),
    /// The envelope payload does not match the shape bound to its logical name.
    #[error("unable to decode event data into {event_type}: {source}")]
    DecodeFailed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}
