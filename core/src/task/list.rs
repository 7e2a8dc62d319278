use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{BoxStream, FuturesUnordered};
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use uuid::Uuid;

use crate::cancel::CancelSignal;

use super::action::{Task, TaskAction};
use super::context::TaskContext;
use super::status::{first_error, Skipped, TaskStatus, ABORTED, FALLBACK_ERROR};

/// Live status arrays of one list. The first item is the current state;
/// the stream ends after the settled array.
pub type StatusStream = BoxStream<'static, Vec<TaskStatus>>;

/// Receives every task failure of a list and of the lists nested under it.
pub type ErrorSink = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

type InitFn<C> = Box<dyn FnOnce(&mut C) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: String,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListOutcome {
    pub tasks: Vec<TaskStatus>,
    pub error: Option<String>,
}

impl TaskListOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    tasks: Vec<TaskStatus>,
    settled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Settled,
}

struct Slot<C> {
    status: TaskStatus,
    removed: bool,
    child: Option<TaskList<C>>,
}

struct RunState<C> {
    phase: Phase,
    slots: Vec<Slot<C>>,
    aborted: bool,
    finished: bool,
}

impl<C> RunState<C> {
    fn visible(&self) -> Vec<TaskStatus> {
        self.slots
            .iter()
            .filter(|slot| !slot.removed)
            .map(|slot| slot.status.clone())
            .collect()
    }
}

struct Hooks {
    on_task_error: Option<ErrorSink>,
    on_success: Option<Arc<dyn Fn() + Send + Sync>>,
    on_done: Option<Arc<dyn Fn(bool) + Send + Sync>>,
}

struct Inner<C> {
    tasks: Vec<Task<C>>,
    concurrent: bool,
    fresh_context: bool,
    init: Mutex<Option<InitFn<C>>>,
    abort_on: Option<CancelSignal>,
    hooks: Hooks,
    state: Mutex<RunState<C>>,
    tx: watch::Sender<Snapshot>,
}

/// Runs an ordered set of tasks once, sequentially or concurrently, and
/// broadcasts the status of every task to any number of consumers.
///
/// Nothing runs until the first call to [`subscribe`](Self::subscribe) or
/// [`wait`](Self::wait). Later consumers observe the same run: they get the
/// latest status array immediately and every update after it.
pub struct TaskList<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for TaskList<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for TaskList<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskList")
            .field("tasks", &self.inner.tasks)
            .field("concurrent", &self.inner.concurrent)
            .finish()
    }
}

pub struct TaskListBuilder<C> {
    tasks: Vec<Task<C>>,
    concurrent: bool,
    fresh_context: bool,
    collapse: bool,
    init: Option<InitFn<C>>,
    abort_on: Option<CancelSignal>,
    hooks: Hooks,
}

impl<C: Default + Send + 'static> TaskListBuilder<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            concurrent: false,
            fresh_context: false,
            collapse: true,
            init: None,
            abort_on: None,
            hooks: Hooks {
                on_task_error: None,
                on_success: None,
                on_done: None,
            },
        }
    }

    pub fn task(mut self, task: Task<C>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task<C>>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Ignore the context of an enclosing list and start from `C::default()`.
    pub fn fresh_context(mut self) -> Self {
        self.fresh_context = true;
        self
    }

    /// Default `collapse` flag for statuses of tasks that don't set their own.
    pub fn collapse(mut self, collapse: bool) -> Self {
        self.collapse = collapse;
        self
    }

    /// Merged into the context when the run starts.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }

    /// Abort the list as soon as `signal` fires.
    pub fn abort_on(mut self, signal: CancelSignal) -> Self {
        self.abort_on = Some(signal);
        self
    }

    pub fn on_task_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        self.hooks.on_task_error = Some(Arc::new(f));
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_success = Some(Arc::new(f));
        self
    }

    /// Called exactly once with `failed`, after the list settles or aborts.
    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.hooks.on_done = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> TaskList<C> {
        let slots = self
            .tasks
            .iter()
            .map(|task| Slot {
                status: TaskStatus::new(
                    Uuid::new_v4().to_string(),
                    task.title.clone(),
                    task.collapse.unwrap_or(self.collapse),
                ),
                removed: false,
                child: None,
            })
            .collect::<Vec<_>>();

        let initial = Snapshot {
            tasks: slots.iter().map(|slot| slot.status.clone()).collect(),
            settled: false,
        };
        let (tx, _) = watch::channel(initial);

        TaskList {
            inner: Arc::new(Inner {
                tasks: self.tasks,
                concurrent: self.concurrent,
                fresh_context: self.fresh_context,
                init: Mutex::new(self.init),
                abort_on: self.abort_on,
                hooks: self.hooks,
                state: Mutex::new(RunState {
                    phase: Phase::Idle,
                    slots,
                    aborted: false,
                    finished: false,
                }),
                tx,
            }),
        }
    }
}

impl<C: Default + Send + 'static> Default for TaskListBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Complete,
    Failed(String),
    /// A nested list failed; its failures were already reported upward.
    ChildFailed(String),
}

impl<C: Default + Send + 'static> TaskList<C> {
    pub fn builder() -> TaskListBuilder<C> {
        TaskListBuilder::new()
    }

    /// A sequential list with default options.
    pub fn new(tasks: impl IntoIterator<Item = Task<C>>) -> Self {
        TaskListBuilder::new().tasks(tasks).build()
    }

    /// A concurrent list with default options.
    pub fn concurrent(tasks: impl IntoIterator<Item = Task<C>>) -> Self {
        TaskListBuilder::new().tasks(tasks).concurrent(true).build()
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.is_empty()
    }

    pub fn is_concurrent(&self) -> bool {
        self.inner.concurrent
    }

    /// Current status array, without starting the run.
    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.inner.tx.borrow().tasks.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.tx.borrow().settled
    }

    /// Attach to the status stream, starting the run if this is the first
    /// attachment. The run starts with a fresh context.
    pub fn subscribe(&self) -> StatusStream {
        self.attach(None, None)
    }

    /// Run with `ctx` as the shared context (unless the list asked for a
    /// fresh one) and report every failure to `ancestor` as well as to the
    /// list's own error hook.
    pub fn subscribe_with(
        &self,
        ctx: TaskContext<C>,
        ancestor: Option<ErrorSink>,
    ) -> StatusStream {
        self.attach(Some(ctx), ancestor)
    }

    /// Wait for the list to settle.
    pub async fn wait(&self) -> TaskListOutcome {
        collect_outcome(self.subscribe()).await
    }

    /// Close every task that is still open with `skipped: "Aborted"` and
    /// settle the stream. Running actions are not interrupted; their results
    /// are discarded. Idempotent, and harmless once the list has settled.
    pub fn abort(&self) {
        let children = {
            let mut state = self.lock_state();
            if state.aborted {
                return;
            }
            state.aborted = true;
            if state.finished {
                return;
            }
            for slot in state.slots.iter_mut().filter(|slot| !slot.removed) {
                if !slot.status.is_done() {
                    slot.status.skipped = Some(ABORTED.into());
                    slot.status.pending = Some(false);
                }
            }
            state
                .slots
                .iter()
                .filter_map(|slot| slot.child.clone())
                .collect::<Vec<_>>()
        };

        tracing::debug!(tasks = self.inner.tasks.len(), "task list aborted");
        for child in children {
            child.abort();
        }
        self.finish();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock_state().aborted
    }

    fn attach(&self, ctx: Option<TaskContext<C>>, ancestor: Option<ErrorSink>) -> StatusStream {
        let rx = self.inner.tx.subscribe();
        let start = {
            let mut state = self.lock_state();
            if state.phase == Phase::Idle {
                state.phase = Phase::Running;
                true
            } else {
                false
            }
        };
        if start && self.inner.tasks.is_empty() {
            // Nothing to run: settle before the first read so consumers see a
            // single empty array.
            self.finish();
        } else if start {
            let list = self.clone();
            tokio::spawn(async move { list.run(ctx, ancestor).await });
        }
        status_stream(rx)
    }

    async fn run(self, parent: Option<TaskContext<C>>, ancestor: Option<ErrorSink>) {
        let _settle = SettleOnDrop(self.clone());
        let ctx = match parent {
            Some(ctx) if !self.inner.fresh_context => ctx,
            _ => TaskContext::default(),
        };
        let init = self
            .inner
            .init
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(init) = init {
            if let Err(panic) = catch_panic(|| ctx.update(init)) {
                tracing::warn!(error = %panic, "task list context init panicked");
            }
        }

        let watcher = self.inner.abort_on.clone().map(|signal| {
            let list = self.clone();
            tokio::spawn(async move {
                signal.cancelled().await;
                list.abort();
            })
        });

        let reporter = self.reporter(ancestor);
        let runnable = self.enabled_tasks(&ctx);
        tracing::debug!(
            tasks = runnable.len(),
            concurrent = self.inner.concurrent,
            "task list started"
        );

        if self.inner.concurrent {
            let mut running = runnable
                .iter()
                .map(|&index| self.run_task(index, &ctx, &reporter))
                .collect::<FuturesUnordered<_>>();
            while running.next().await.is_some() {}
        } else {
            let mut failed = false;
            for index in runnable {
                if self.is_aborted() {
                    break;
                }
                if failed {
                    // Remaining tasks are closed as complete without running.
                    self.update_status(index, |status| status.complete = Some(true));
                    continue;
                }
                self.run_task(index, &ctx, &reporter).await;
                failed = self.slot_failed(index);
            }
        }

        if let Some(watcher) = watcher {
            watcher.abort();
        }
    }

    /// Failures of this list and its descendants go to the list's own hook
    /// and then to whoever nested this list.
    fn reporter(&self, ancestor: Option<ErrorSink>) -> ErrorSink {
        let own = self.inner.hooks.on_task_error.clone();
        Arc::new(move |failure: &TaskFailure| {
            if let Some(hook) = &own {
                hook(failure);
            }
            if let Some(ancestor) = &ancestor {
                ancestor(failure);
            }
        })
    }

    fn enabled_tasks(&self, ctx: &TaskContext<C>) -> Vec<usize> {
        let mut runnable = Vec::with_capacity(self.inner.tasks.len());
        let mut removed_any = false;
        for (index, task) in self.inner.tasks.iter().enumerate() {
            // A panicking predicate keeps the task; run_task reports the panic.
            let enabled = task.enabled.as_ref().map_or(true, |enabled| {
                catch_panic(|| ctx.read(|c| enabled(c))).unwrap_or(true)
            });
            if enabled {
                runnable.push(index);
            } else {
                self.lock_state().slots[index].removed = true;
                removed_any = true;
            }
        }
        if removed_any {
            self.publish();
        }
        runnable
    }

    async fn run_task(&self, index: usize, ctx: &TaskContext<C>, reporter: &ErrorSink) {
        let task = &self.inner.tasks[index];
        if self.is_aborted() {
            return;
        }

        let outcome = match self.check_task(index, task, ctx) {
            Ok(true) => self.start_task(index, task, ctx, reporter).await,
            Ok(false) => return,
            Err(panic) => Outcome::Failed(panic),
        };

        match outcome {
            Outcome::Complete => {
                tracing::debug!(task = %task.title, "task complete");
                self.update_status(index, |status| {
                    status.pending = Some(false);
                    status.complete = Some(true);
                });
            }
            Outcome::Failed(error) => {
                tracing::warn!(task = %task.title, error = %error, "task failed");
                if self.record_error(index, &error) {
                    let task_id = self.lock_state().slots[index].status.id.clone();
                    reporter(&TaskFailure {
                        task_id,
                        title: task.title.clone(),
                        error,
                    });
                }
            }
            Outcome::ChildFailed(error) => {
                tracing::debug!(task = %task.title, error = %error, "subtasks failed");
                self.record_error(index, &error);
            }
        }
    }

    /// Evaluate the enabled and skip predicates. `Ok(false)` means the task
    /// was removed or skipped and must not run.
    fn check_task(
        &self,
        index: usize,
        task: &Task<C>,
        ctx: &TaskContext<C>,
    ) -> Result<bool, String> {
        if let Some(enabled) = &task.enabled {
            if !catch_panic(|| ctx.read(|c| enabled(c)))? {
                self.lock_state().slots[index].removed = true;
                self.publish();
                return Ok(false);
            }
        }

        if let Some(skip) = &task.skip {
            let skipped = catch_panic(|| ctx.read(|c| skip(c)))?;
            if let Some(skipped) = skipped.filter(Skipped::is_skipped) {
                tracing::debug!(task = %task.title, "task skipped");
                self.update_status(index, |status| {
                    status.skipped = Some(skipped);
                    status.pending = Some(false);
                });
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn start_task(
        &self,
        index: usize,
        task: &Task<C>,
        ctx: &TaskContext<C>,
        reporter: &ErrorSink,
    ) -> Outcome {
        self.update_status(index, |status| status.pending = Some(true));
        tracing::debug!(task = %task.title, kind = task.action.kind(), "task started");

        match &task.action {
            TaskAction::Fire(f) => match catch_panic(|| f(ctx)) {
                Ok(result) => into_outcome(result),
                Err(panic) => Outcome::Failed(panic),
            },
            TaskAction::Future(f) => {
                let future = match catch_panic(|| f(ctx.clone())) {
                    Ok(future) => future,
                    Err(panic) => return Outcome::Failed(panic),
                };
                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => into_outcome(result),
                    Err(panic) => Outcome::Failed(panic_message(panic)),
                }
            }
            TaskAction::Progress(f) => match catch_panic(|| f(ctx.clone())) {
                Ok(messages) => self.drive_progress(index, messages).await,
                Err(panic) => Outcome::Failed(panic),
            },
            TaskAction::Subtasks(f) => match catch_panic(|| f(ctx)) {
                Ok(Ok(child)) => self.drive_child(index, child, ctx, reporter).await,
                Ok(Err(err)) => Outcome::Failed(error_message(&err)),
                Err(panic) => Outcome::Failed(panic),
            },
        }
    }

    async fn drive_progress(
        &self,
        index: usize,
        mut messages: BoxStream<'static, anyhow::Result<String>>,
    ) -> Outcome {
        loop {
            match AssertUnwindSafe(messages.next()).catch_unwind().await {
                Ok(Some(Ok(message))) => {
                    self.update_status(index, |status| status.message = Some(message));
                }
                Ok(Some(Err(err))) => return Outcome::Failed(error_message(&err)),
                Ok(None) => return Outcome::Complete,
                Err(panic) => return Outcome::Failed(panic_message(panic)),
            }
        }
    }

    async fn drive_child(
        &self,
        index: usize,
        child: TaskList<C>,
        ctx: &TaskContext<C>,
        reporter: &ErrorSink,
    ) -> Outcome {
        self.lock_state().slots[index].child = Some(child.clone());
        // An abort that landed while the child was being built still reaches it.
        if self.is_aborted() {
            child.abort();
        }

        let mut updates = child.subscribe_with(ctx.clone(), Some(Arc::clone(reporter)));
        let mut last = Vec::new();
        while let Some(tasks) = updates.next().await {
            self.update_status(index, |status| status.subtasks = Some(tasks.clone()));
            last = tasks;
        }

        match first_error(&last) {
            Some(error) => Outcome::ChildFailed(error.to_string()),
            None => Outcome::Complete,
        }
    }

    fn slot_failed(&self, index: usize) -> bool {
        self.lock_state().slots[index].status.error.is_some()
    }

    /// Store `error` unless the task already settled (e.g. by abort).
    fn record_error(&self, index: usize, error: &str) -> bool {
        let mut recorded = false;
        self.update_status(index, |status| {
            status.pending = Some(false);
            status.error = Some(error.to_string());
            recorded = true;
        });
        recorded
    }

    /// Settled statuses are frozen; late writes from discarded actions are dropped.
    fn update_status(&self, index: usize, f: impl FnOnce(&mut TaskStatus)) {
        {
            let mut state = self.lock_state();
            let slot = &mut state.slots[index];
            if slot.removed || slot.status.is_done() {
                return;
            }
            f(&mut slot.status);
        }
        self.publish();
    }

    /// Snapshots are sent while the state lock is held so a late publish
    /// can never replace the settled array.
    fn publish(&self) {
        let state = self.lock_state();
        self.inner.tx.send_replace(Snapshot {
            tasks: state.visible(),
            settled: state.finished,
        });
    }

    fn finish(&self) {
        let (failed, count) = {
            let mut state = self.lock_state();
            if state.finished {
                return;
            }
            state.finished = true;
            state.phase = Phase::Settled;
            let tasks = state.visible();
            let summary = (first_error(&tasks).is_some(), tasks.len());
            self.inner.tx.send_replace(Snapshot {
                tasks,
                settled: true,
            });
            summary
        };

        tracing::debug!(failed, tasks = count, "task list settled");

        if !failed {
            if let Some(hook) = &self.inner.hooks.on_success {
                hook();
            }
        }
        if let Some(hook) = &self.inner.hooks.on_done {
            hook(failed);
        }
    }

    /// Close every open task with `error`. Used when the run itself died.
    fn fail_open(&self, error: &str) {
        let mut state = self.lock_state();
        for slot in state.slots.iter_mut().filter(|slot| !slot.removed) {
            if !slot.status.is_done() {
                slot.status.pending = Some(false);
                slot.status.error = Some(error.to_string());
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState<C>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles the list when its run ends, including when the run task unwinds.
struct SettleOnDrop<C: Default + Send + 'static>(TaskList<C>);

impl<C: Default + Send + 'static> Drop for SettleOnDrop<C> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.fail_open(FALLBACK_ERROR);
        }
        self.0.finish();
    }
}

/// Drain a status stream and summarize its settled array.
pub async fn collect_outcome(mut stream: StatusStream) -> TaskListOutcome {
    let mut last = Vec::new();
    while let Some(tasks) = stream.next().await {
        last = tasks;
    }
    let error = first_error(&last).map(str::to_string);
    TaskListOutcome { tasks: last, error }
}

fn status_stream(mut rx: watch::Receiver<Snapshot>) -> StatusStream {
    async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            yield snapshot.tasks;
            if snapshot.settled || rx.changed().await.is_err() {
                break;
            }
        }
    }
    .boxed()
}

fn into_outcome(result: anyhow::Result<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Complete,
        Err(err) => Outcome::Failed(error_message(&err)),
    }
}

fn error_message(err: &anyhow::Error) -> String {
    non_empty(format!("{err:#}"))
}

fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    non_empty(message)
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message
    }
}
