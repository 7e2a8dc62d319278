#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chainkit_core::api::{TaskFailure, TaskListBuilder, TaskStatus};

/// Shared context used by the engine tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ctx {
    pub value: u32,
    pub seen: Vec<String>,
    pub flag: bool,
}

/// Records every hook call of one list.
#[derive(Debug, Clone, Default)]
pub struct HookLog {
    pub success: Arc<AtomicUsize>,
    pub done: Arc<Mutex<Vec<bool>>>,
    pub errors: Arc<Mutex<Vec<TaskFailure>>>,
}

impl HookLog {
    pub fn attach<C: Default + Send + 'static>(
        &self,
        builder: TaskListBuilder<C>,
    ) -> TaskListBuilder<C> {
        let success = Arc::clone(&self.success);
        let done = Arc::clone(&self.done);
        let errors = Arc::clone(&self.errors);
        builder
            .on_success(move || {
                success.fetch_add(1, Ordering::SeqCst);
            })
            .on_done(move |failed| done.lock().unwrap().push(failed))
            .on_task_error(move |failure| errors.lock().unwrap().push(failure.clone()))
    }

    pub fn success_calls(&self) -> usize {
        self.success.load(Ordering::SeqCst)
    }

    pub fn done_calls(&self) -> Vec<bool> {
        self.done.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.error.clone())
            .collect()
    }
}

/// Route engine logs to the test harness. `RUST_LOG=debug` shows them.
pub fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn titles(tasks: &[TaskStatus]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}
