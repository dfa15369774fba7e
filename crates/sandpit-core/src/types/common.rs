use serde::{Deserialize, Serialize};

/// Standard response envelope.
///
/// Every JSON endpoint answers with `{ "error": bool, "data": ... }`; the
/// payload shape varies per endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Error flag set by the service
    pub error: bool,

    /// Endpoint-specific payload
    pub data: T,
}

/// Acknowledgement envelope for mutations that return no payload
/// (stop, delete, add-time)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    /// Error flag set by the service
    pub error: bool,

    /// Human-readable outcome
    #[serde(default)]
    pub message: Option<String>,
}

/// Reference to a submitted analysis task.
///
/// The `task_id` returned here is the identifier for every subsequent
/// status, monitor, and result call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
    /// Unique task identifier
    pub task_id: String,
}
