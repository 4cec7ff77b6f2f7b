use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Fail,
}

/// Outcome record of one pool task.
///
/// `index` is the caller-supplied ordering key; `None` means the caller did
/// not ask for ordering. A result always carries `data` or `error`, usually
/// both on failure (the input is echoed back for replay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<T> {
    pub index: Option<usize>,
    pub data: Option<T>,
    pub status: TaskStatus,
    pub error: Option<String>,
}

impl<T> TaskResult<T> {
    pub fn success(index: Option<usize>, data: T) -> Self {
        Self {
            index,
            data: Some(data),
            status: TaskStatus::Success,
            error: None,
        }
    }

    pub fn fail(index: Option<usize>, data: Option<T>, error: impl Into<String>) -> Self {
        Self {
            index,
            data,
            status: TaskStatus::Fail,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
