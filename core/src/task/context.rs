use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The value shared by every task and nested subtask of one run.
///
/// The lock is only ever held inside [`read`](Self::read) and
/// [`update`](Self::update), never across an await point. Concurrent tasks
/// that write the same fields have to coordinate themselves.
pub struct TaskContext<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> TaskContext<C> {
    pub fn new(value: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.lock())
    }

    /// Both handles point at the same value.
    pub fn same_as(&self, other: &TaskContext<C>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, C> {
        // A panicking task is reported as a task error; its writes stay visible.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clone> TaskContext<C> {
    pub fn snapshot(&self) -> C {
        self.lock().clone()
    }
}

impl<C: Default> Default for TaskContext<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C> Clone for TaskContext<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for TaskContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskContext").field(&*self.lock()).finish()
    }
}
