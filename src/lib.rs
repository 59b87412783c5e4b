//! Event sourcing core: aggregates are rebuilt by replaying their ordered history of events, and
//! new events are committed under optimistic concurrency control.
//!
//! Consumers bring their own [`Aggregate`], [`Command`] and [`Event`] types; a [`Repository`]
//! couples them with an [`store::EventStore`] and a [`serializer::Serializer`].

pub use crate::aggregate::{Aggregate, Command, CommandHandler};
pub use crate::event::{Event, EventModel, TypedEvent};
pub use crate::observer::Observer;
pub use crate::repository::{Repository, RepositoryBuilder, RepositoryError};

mod aggregate;
pub mod change_feed;
pub mod event;
mod observer;
mod repository;
pub mod serializer;
pub mod store;
pub mod types;
