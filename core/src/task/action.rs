use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use super::context::TaskContext;
use super::list::TaskList;
use super::status::Skipped;

pub(crate) type SkipFn<C> = Arc<dyn Fn(&C) -> Option<Skipped> + Send + Sync>;
pub(crate) type EnabledFn<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// What a task does when it runs. Each variant is produced by one of the
/// [`Task`] constructors.
pub enum TaskAction<C> {
    /// Runs synchronously and completes immediately.
    Fire(Arc<dyn Fn(&TaskContext<C>) -> anyhow::Result<()> + Send + Sync>),
    /// Completes when the returned future resolves.
    Future(Arc<dyn Fn(TaskContext<C>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>),
    /// Every item replaces the task's message; the task completes when the
    /// stream ends. An `Err` item fails the task.
    Progress(
        Arc<dyn Fn(TaskContext<C>) -> BoxStream<'static, anyhow::Result<String>> + Send + Sync>,
    ),
    /// The nested list's live statuses become this task's subtasks.
    Subtasks(Arc<dyn Fn(&TaskContext<C>) -> anyhow::Result<TaskList<C>> + Send + Sync>),
}

impl<C> Clone for TaskAction<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Fire(f) => Self::Fire(Arc::clone(f)),
            Self::Future(f) => Self::Future(Arc::clone(f)),
            Self::Progress(f) => Self::Progress(Arc::clone(f)),
            Self::Subtasks(f) => Self::Subtasks(Arc::clone(f)),
        }
    }
}

impl<C> TaskAction<C> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fire(_) => "fire",
            Self::Future(_) => "future",
            Self::Progress(_) => "progress",
            Self::Subtasks(_) => "subtasks",
        }
    }
}

/// A constant task declaration. Running a [`TaskList`] never mutates it.
pub struct Task<C> {
    pub(crate) title: String,
    pub(crate) skip: Option<SkipFn<C>>,
    pub(crate) enabled: Option<EnabledFn<C>>,
    pub(crate) collapse: Option<bool>,
    pub(crate) action: TaskAction<C>,
}

impl<C> Clone for Task<C> {
    fn clone(&self) -> Self {
        Self {
            title: self.title.clone(),
            skip: self.skip.clone(),
            enabled: self.enabled.clone(),
            collapse: self.collapse,
            action: self.action.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("title", &self.title)
            .field("action", &self.action.kind())
            .field("skip", &self.skip.is_some())
            .field("enabled", &self.enabled.is_some())
            .finish()
    }
}

impl<C: Send + 'static> Task<C> {
    fn with_action(title: impl Into<String>, action: TaskAction<C>) -> Self {
        Self {
            title: title.into(),
            skip: None,
            enabled: None,
            collapse: None,
            action,
        }
    }

    pub fn fire<F>(title: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TaskContext<C>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::with_action(title, TaskAction::Fire(Arc::new(f)))
    }

    pub fn future<F, Fut>(title: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::with_action(
            title,
            TaskAction::Future(Arc::new(move |ctx| f(ctx).boxed())),
        )
    }

    pub fn progress<F, S>(title: impl Into<String>, f: F) -> Self
    where
        F: Fn(TaskContext<C>) -> S + Send + Sync + 'static,
        S: Stream<Item = anyhow::Result<String>> + Send + 'static,
    {
        Self::with_action(
            title,
            TaskAction::Progress(Arc::new(move |ctx| f(ctx).boxed())),
        )
    }

    pub fn subtasks<F>(title: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TaskContext<C>) -> anyhow::Result<TaskList<C>> + Send + Sync + 'static,
    {
        Self::with_action(title, TaskAction::Subtasks(Arc::new(f)))
    }

    /// Evaluated against the context when the task is about to start. A
    /// skipped task never enters `pending` and never runs its action.
    pub fn skip_if<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> Option<Skipped> + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(f));
        self
    }

    /// Disabled tasks are dropped from the status array altogether.
    pub fn enabled_if<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Arc::new(f));
        self
    }

    pub fn collapse(mut self, collapse: bool) -> Self {
        self.collapse = Some(collapse);
        self
    }
}

impl<C> Task<C> {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn action(&self) -> &TaskAction<C> {
        &self.action
    }
}
