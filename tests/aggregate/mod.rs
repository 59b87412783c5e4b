use chrono::{DateTime, Utc};

use eslite::types::Version;
use eslite::{Aggregate, CommandHandler, Event, EventModel};

pub use observer::*;
pub use structs::*;

mod structs;

/// Test aggregate - implements both Aggregate and CommandHandler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Todo {
    pub id: String,
    pub desc: String,
    pub done: bool,
    pub version: Version,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    fn ensure_created(&self) -> Result<(), TodoError> {
        if self.version == 0 {
            Err(TodoError::NotCreated)
        } else {
            Ok(())
        }
    }
}

impl Aggregate for Todo {
    type Error = TodoError;

    fn on(&mut self, event: &dyn Event) -> Result<(), Self::Error> {
        if let Some(created) = event.downcast_ref::<TodoCreated>() {
            self.desc = created.desc.clone();
            self.done = false;
            self.created_at = Some(event.occurred_on());
        } else if event.is::<TodoDone>() {
            self.done = true;
        } else if event.is::<TodoUndone>() {
            self.done = false;
        } else {
            return Err(TodoError::UnhandledEvent(event.event_type()));
        }

        self.id = event.aggregate_id().to_string();
        self.version = event.version();
        self.updated_at = Some(event.occurred_on());
        Ok(())
    }
}

impl CommandHandler for Todo {
    type Command = TodoCommand;

    fn apply(&self, command: &Self::Command) -> Result<Vec<Box<dyn Event>>, Self::Error> {
        let next = self.version + 1;

        let events: Vec<Box<dyn Event>> = match command {
            TodoCommand::Create { id, desc } => {
                if self.version > 0 {
                    return Err(TodoError::AlreadyCreated);
                }
                vec![Box::new(TodoCreated {
                    model: EventModel::new(id.as_str(), next),
                    desc: desc.clone(),
                })]
            }
            TodoCommand::CreateDone { id, desc } => {
                if self.version > 0 {
                    return Err(TodoError::AlreadyCreated);
                }
                vec![
                    Box::new(TodoCreated {
                        model: EventModel::new(id.as_str(), next),
                        desc: desc.clone(),
                    }),
                    Box::new(TodoDone {
                        model: EventModel::new(id.as_str(), next + 1),
                    }),
                ]
            }
            TodoCommand::MarkDone { id } => {
                self.ensure_created()?;
                if self.done {
                    return Err(TodoError::AlreadyDone);
                }
                vec![Box::new(TodoDone {
                    model: EventModel::new(id.as_str(), next),
                })]
            }
            TodoCommand::MarkUndone { id } => {
                self.ensure_created()?;
                if !self.done {
                    return Err(TodoError::NotDone);
                }
                vec![Box::new(TodoUndone {
                    model: EventModel::new(id.as_str(), next),
                })]
            }
            TodoCommand::EmitUnknown { id } => vec![Box::new(TodoUnknown {
                model: EventModel::new(id.as_str(), next),
                invalid_field: "boom".to_string(),
            })],
            TodoCommand::DoUnknown { .. } => return Err(TodoError::UnknownCommand),
        };

        Ok(events)
    }
}
