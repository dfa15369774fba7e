use serde::{Deserialize, Serialize};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for a free VM
    Queued,
    /// Detonating inside the guest
    Running,
    /// Finished successfully; results are available
    Completed,
    /// Aborted or errored
    Failed,
}

impl TaskStatus {
    /// Returns true once the task will not change state again
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Live progress of a running task, carried by stream events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Unique task identifier
    pub task_id: String,

    /// Completion percentage 0-100
    #[serde(default)]
    pub progress: u8,

    /// Seconds until the task finishes
    #[serde(default)]
    pub remaining_secs: i64,

    /// Threats detected so far
    #[serde(default)]
    pub threats: Vec<String>,

    /// System tags assigned so far
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One event on the status stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Progress snapshot
    pub task: TaskProgress,

    /// Set on the final event of the stream
    #[serde(default)]
    pub completed: bool,

    /// Set when the task failed
    #[serde(default)]
    pub error: bool,
}
