use serde::{Deserialize, Serialize};

use eslite::serializer::JsonSerializer;
use eslite::{Command, EventModel, TypedEvent};

pub enum TodoCommand {
    Create { id: String, desc: String },
    /// Emits two events at once.
    CreateDone { id: String, desc: String },
    MarkDone { id: String },
    MarkUndone { id: String },
    /// Emits an event the aggregate cannot apply.
    EmitUnknown { id: String },
    /// Rejected by the aggregate.
    DoUnknown { id: String },
}

impl TodoCommand {
    pub fn create(id: &str, desc: &str) -> Self {
        Self::Create {
            id: id.to_string(),
            desc: desc.to_string(),
        }
    }

    pub fn done(id: &str) -> Self {
        Self::MarkDone { id: id.to_string() }
    }

    pub fn undone(id: &str) -> Self {
        Self::MarkUndone { id: id.to_string() }
    }
}

impl Command for TodoCommand {
    fn aggregate_id(&self) -> &str {
        match self {
            Self::Create { id, .. }
            | Self::CreateDone { id, .. }
            | Self::MarkDone { id }
            | Self::MarkUndone { id }
            | Self::EmitUnknown { id }
            | Self::DoUnknown { id } => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoCreated {
    #[serde(flatten)]
    pub model: EventModel,
    pub desc: String,
}

impl TypedEvent for TodoCreated {
    const EVENT_TYPE: &'static str = "TodoCreated";

    fn model(&self) -> &EventModel {
        &self.model
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoDone {
    #[serde(flatten)]
    pub model: EventModel,
}

impl TypedEvent for TodoDone {
    const EVENT_TYPE: &'static str = "TodoDone";

    fn model(&self) -> &EventModel {
        &self.model
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoUndone {
    #[serde(flatten)]
    pub model: EventModel,
}

impl TypedEvent for TodoUndone {
    const EVENT_TYPE: &'static str = "TodoUndone";

    fn model(&self) -> &EventModel {
        &self.model
    }
}

/// Bound to the serializer, but not handled by the aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoUnknown {
    #[serde(flatten)]
    pub model: EventModel,
    pub invalid_field: String,
}

impl TypedEvent for TodoUnknown {
    const EVENT_TYPE: &'static str = "TodoUnknown";

    fn model(&self) -> &EventModel {
        &self.model
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TodoError {
    #[error("unable to handle event {0}")]
    UnhandledEvent(&'static str),
    #[error("todo already created")]
    AlreadyCreated,
    #[error("todo not created yet")]
    NotCreated,
    #[error("todo already done")]
    AlreadyDone,
    #[error("todo not done")]
    NotDone,
    #[error("unknown command")]
    UnknownCommand,
}

pub fn todo_serializer() -> JsonSerializer {
    JsonSerializer::new()
        .with::<TodoCreated>()
        .with::<TodoDone>()
        .with::<TodoUndone>()
        .with::<TodoUnknown>()
}
