/// Position of an event within the history of its aggregate. The first event of every aggregate
/// has version 1 and every following event increments it by one.
pub type Version = i64;

/// Type-erased error used at the boundaries where backends and observers plug in.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
