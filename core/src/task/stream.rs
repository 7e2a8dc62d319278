use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::list::{StatusStream, TaskList};
use super::status::{first_error, TaskStatus};

/// One progress snapshot of a mutating call, as relayed to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub tasks: Vec<TaskStatus>,
    /// Lines the tasks asked to report once the call is done.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl TaskUpdate {
    pub fn new(tasks: Vec<TaskStatus>) -> Self {
        Self {
            tasks,
            notes: Vec::new(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        first_error(&self.tasks)
    }
}

/// Ordered progress snapshots of one mutating call. Ends once the
/// underlying list settles.
pub type TaskStream = BoxStream<'static, TaskUpdate>;

pub fn task_stream(statuses: StatusStream) -> TaskStream {
    statuses.map(TaskUpdate::new).boxed()
}

impl<C: Default + Send + 'static> TaskList<C> {
    /// Attach to the list and wrap every status array in a [`TaskUpdate`].
    pub fn into_task_stream(self) -> TaskStream {
        task_stream(self.subscribe())
    }
}

/// Wait for a task stream to end and return its last snapshot.
pub async fn last_update(mut stream: TaskStream) -> TaskUpdate {
    let mut last = TaskUpdate::default();
    while let Some(update) = stream.next().await {
        last = update;
    }
    last
}
