use std::any::Any;
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::Version;

/// An immutable fact about a single aggregate.
///
/// Events are produced by a [`crate::CommandHandler`] and folded back into an [`crate::Aggregate`]
/// on load. The logical type name returned by [`Event::event_type`] is what the
/// [`crate::serializer::Serializer`] persists, so it must stay stable across releases even when
/// the Rust type gets renamed.
///
/// Most events should not implement this trait by hand: implementing [`TypedEvent`] is enough.
pub trait Event: Any + Debug + Send + Sync {
    /// Returns the id of the aggregate referenced by the event.
    fn aggregate_id(&self) -> &str;

    /// Returns the version of this event within its aggregate history.
    fn version(&self) -> Version;

    /// Returns when the event occurred.
    fn occurred_on(&self) -> DateTime<Utc>;

    /// Returns the unique logical name of the event.
    fn event_type(&self) -> &'static str;

    /// Encodes the event into its native json representation.
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    /// Returns a reference to the concrete event if it is of type `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Checks whether the concrete event is of type `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// A serde-friendly event carrying an [`EventModel`] and a constant logical name.
///
/// Every `TypedEvent` is an [`Event`], and can be bound to a
/// [`crate::serializer::JsonSerializer`].
///
/// ```rust
/// # use serde::{Deserialize, Serialize};
/// # use eslite::event::{Event, EventModel, TypedEvent};
/// #[derive(Debug, Serialize, Deserialize)]
/// struct TodoCreated {
///     #[serde(flatten)]
///     model: EventModel,
///     desc: String,
/// }
///
/// impl TypedEvent for TodoCreated {
///     const EVENT_TYPE: &'static str = "TodoCreated";
///
///     fn model(&self) -> &EventModel {
///         &self.model
///     }
/// }
///
/// let event = TodoCreated { model: EventModel::new("todo-1", 1), desc: "write docs".into() };
/// assert_eq!(event.event_type(), "TodoCreated");
/// assert_eq!(event.version(), 1);
/// ```
pub trait TypedEvent: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// The logical name the event is persisted under.
    const EVENT_TYPE: &'static str;

    fn model(&self) -> &EventModel;
}

impl<T> Event for T
where
    T: TypedEvent,
{
    fn aggregate_id(&self) -> &str {
        &self.model().id
    }

    fn version(&self) -> Version {
        self.model().version
    }

    fn occurred_on(&self) -> DateTime<Utc> {
        self.model().at
    }

    fn event_type(&self) -> &'static str {
        T::EVENT_TYPE
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Default metadata of an event: which aggregate it belongs to, its version and when it occurred.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventModel {
    pub id: String,
    pub version: Version,
    pub at: DateTime<Utc>,
}

impl EventModel {
    /// Creates the metadata for an event occurring now.
    pub fn new(aggregate_id: impl Into<String>, version: Version) -> Self {
        Self {
            id: aggregate_id.into(),
            version,
            at: Utc::now(),
        }
    }

    /// Creates the metadata for an event occurred at the given instant.
    pub fn at(aggregate_id: impl Into<String>, version: Version, at: DateTime<Utc>) -> Self {
        Self {
            id: aggregate_id.into(),
            version,
            at,
        }
    }
}
