use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Event, TypedEvent};
use crate::serializer::{Serializer, SerializerError};
use crate::store::Record;

type Decoder = fn(Value) -> Result<Box<dyn Event>, serde_json::Error>;

/// The wire envelope persisted as the record payload.
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "t")]
    event_type: String,
    #[serde(rename = "d")]
    data: Value,
}

/// Json [`Serializer`] backed by a registry of logical event names.
///
/// Event types are bound either at construction with [`JsonSerializer::with`], or later on through
/// a shared reference with [`JsonSerializer::bind`]. Binding a name twice replaces the previous
/// shape; bindings are never removed.
#[derive(Default)]
pub struct JsonSerializer {
    event_types: RwLock<HashMap<String, Decoder>>,
}

impl JsonSerializer {
    /// Creates a serializer with no bound event types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the event type `E` and returns the serializer, to chain bindings on construction.
    pub fn with<E: TypedEvent>(self) -> Self {
        self.bind::<E>();
        self
    }

    /// Binds the event type `E` under [`TypedEvent::EVENT_TYPE`]. May be called more than once.
    pub fn bind<E: TypedEvent>(&self) -> &Self {
        self.event_types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(E::EVENT_TYPE.to_string(), decode::<E>);
        self
    }

    /// Checks whether a shape is bound to the given logical name.
    pub fn is_bound(&self, event_type: &str) -> bool {
        self.event_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event_type)
    }

    fn decoder(&self, event_type: &str) -> Option<Decoder> {
        self.event_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .copied()
    }
}

fn decode<E: TypedEvent>(data: Value) -> Result<Box<dyn Event>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<E>(data)?))
}

impl Serializer for JsonSerializer {
    fn marshal_event(&self, event: &dyn Event) -> Result<Record, SerializerError> {
        let event_type = event.event_type();
        let encode_failed = |source| SerializerError::EncodeFailed { event_type, source };

        let envelope = Envelope {
            event_type: event_type.to_string(),
            data: event.to_json().map_err(encode_failed)?,
        };

        Ok(Record {
            version: event.version(),
            data: serde_json::to_vec(&envelope).map_err(encode_failed)?,
        })
    }

    fn unmarshal_event(&self, record: &Record) -> Result<Box<dyn Event>, SerializerError> {
        let envelope: Envelope = serde_json::from_slice(&record.data).map_err(SerializerError::MalformedEnvelope)?;

        let decode = self
            .decoder(&envelope.event_type)
            .ok_or_else(|| SerializerError::UnboundType(envelope.event_type.clone()))?;

        decode(envelope.data).map_err(|source| SerializerError::DecodeFailed {
            event_type: envelope.event_type,
            source,
        })
    }
}

impl std::fmt::Debug for JsonSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let event_types = self.event_types.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("JsonSerializer")
            .field("event_types", &event_types.keys().collect::<Vec<_>>())
            .finish()
    }
}
