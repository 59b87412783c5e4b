use serde::Deserialize;
use typed_builder::TypedBuilder;

/// Layout of the table backing a [`super::TransactionalStore`]: one item per (aggregate id,
/// version) pair, holding the serialized record in the payload column.
///
/// ```rust
/// # use eslite::store::transactional::TableConfig;
/// let config = TableConfig::builder()
///     .table_name("todo_events")
///     .partition_key("todo_id")
///     .build();
///
/// assert_eq!(config.sort_key, "version");
/// assert_eq!(config.payload_column, "event_data");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, TypedBuilder)]
pub struct TableConfig {
    /// Name of the table.
    #[builder(setter(into))]
    pub table_name: String,
    /// Column holding the aggregate id.
    #[builder(setter(into))]
    pub partition_key: String,
    /// Column holding the event version.
    #[builder(setter(into), default = default_sort_key())]
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
    /// Column holding the serialized record.
    #[builder(setter(into), default = default_payload_column())]
    #[serde(default = "default_payload_column")]
    pub payload_column: String,
}

fn default_sort_key() -> String {
    "version".to_string()
}

fn default_payload_column() -> String {
    "event_data".to_string()
}
