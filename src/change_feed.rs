//! Extraction of change records coming from the change stream of the backing table.
//!
//! The core never produces nor consumes these records: this is meant for relays forwarding the
//! committed events downstream.

use serde_json::{Map, Value};

/// The interesting parts of a raw change record, left untyped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeRecord {
    pub approximate_creation_date_time: Option<Value>,
    pub keys: Option<Value>,
    pub new_image: Option<Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum ChangeFeedError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("change record has no dynamodb section")]
    MissingChangeSection,
    #[error("dynamodb section of the change record is not an object")]
    NotAnObject,
}

/// Parses the payload of a streamed change record and extracts its creation time, keys and new
/// image.
pub fn extract(data: &[u8]) -> Result<ChangeRecord, ChangeFeedError> {
    let mut record: Map<String, Value> = serde_json::from_slice(data)?;

    let section = match record.remove("dynamodb") {
        Some(Value::Object(section)) => section,
        Some(_) => return Err(ChangeFeedError::NotAnObject),
        None => return Err(ChangeFeedError::MissingChangeSection),
    };

    let field = |name: &str| section.get(name).cloned();

    Ok(ChangeRecord {
        approximate_creation_date_time: field("ApproximateCreationDateTime"),
        keys: field("Keys"),
        new_image: field("NewImage"),
    })
}
