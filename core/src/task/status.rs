use serde::{Deserialize, Serialize};

/// Message stored on a task whose error stringified to nothing.
pub const FALLBACK_ERROR: &str = "Something went wrong.";

/// Skip reason stored on tasks closed by [`TaskList::abort`](super::TaskList::abort).
pub const ABORTED: &str = "Aborted";

/// `skipped` on the wire is either a reason string or a plain flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Skipped {
    Flag(bool),
    Reason(String),
}

impl Skipped {
    pub fn is_skipped(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Reason(_) => true,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Reason(reason) => Some(reason),
            Self::Flag(_) => None,
        }
    }
}

impl From<bool> for Skipped {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for Skipped {
    fn from(reason: &str) -> Self {
        Self::Reason(reason.to_string())
    }
}

impl From<String> for Skipped {
    fn from(reason: String) -> Self {
        Self::Reason(reason)
    }
}

/// Snapshot of one task. This is the only shape a remote renderer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<TaskStatus>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<Skipped>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub collapse: bool,
}

impl TaskStatus {
    pub fn new(id: impl Into<String>, title: impl Into<String>, collapse: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: None,
            subtasks: None,
            pending: None,
            skipped: None,
            complete: None,
            error: None,
            collapse,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.as_ref().is_some_and(Skipped::is_skipped)
    }

    pub fn is_complete(&self) -> bool {
        self.complete == Some(true)
    }

    pub fn is_pending(&self) -> bool {
        self.pending == Some(true) && !self.is_done()
    }

    /// Settled in one of the three terminal states. Error and skip outrank
    /// `pending`/`complete`.
    pub fn is_done(&self) -> bool {
        self.error.is_some() || self.is_skipped() || self.is_complete()
    }
}

/// First error in depth-first document order: a task's own error is found
/// before any of its subtasks' errors.
pub fn first_error(statuses: &[TaskStatus]) -> Option<&str> {
    statuses.iter().find_map(|status| {
        status.error.as_deref().or_else(|| {
            status
                .subtasks
                .as_deref()
                .and_then(first_error)
        })
    })
}

/// Every task is skipped or complete, or the tree already carries an error.
pub fn all_done(statuses: &[TaskStatus]) -> bool {
    first_error(statuses).is_some()
        || statuses
            .iter()
            .all(|status| status.is_skipped() || status.is_complete())
}
