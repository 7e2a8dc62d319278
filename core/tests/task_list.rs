mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chainkit_core::api::{CancelSignal, Skipped, Task, TaskContext, TaskList, TaskStatus};
use common::{count, counter, init_logs, titles, Ctx, HookLog};
use futures::StreamExt;
use pretty_assertions::assert_eq;

fn ok(title: &str) -> Task<Ctx> {
    Task::fire(title, |_| Ok(()))
}

fn boom(title: &str) -> Task<Ctx> {
    Task::fire(title, |_| anyhow::bail!("boom"))
}

fn status<'a>(tasks: &'a [TaskStatus], title: &str) -> &'a TaskStatus {
    tasks
        .iter()
        .find(|t| t.title == title)
        .unwrap_or_else(|| panic!("no task titled {title}"))
}

#[tokio::test]
async fn sequential_failure_closes_the_rest_without_running_them() {
    init_logs();
    let ran_c = counter();
    let hooks = HookLog::default();
    let c = {
        let ran_c = Arc::clone(&ran_c);
        Task::fire("C", move |_| {
            ran_c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let list = hooks
        .attach(TaskList::builder().tasks([ok("A"), boom("B"), c]))
        .build();

    let outcome = list.wait().await;

    assert_eq!(outcome.error.as_deref(), Some("boom"));
    assert_eq!(status(&outcome.tasks, "A").complete, Some(true));
    assert_eq!(status(&outcome.tasks, "B").error.as_deref(), Some("boom"));
    assert_eq!(status(&outcome.tasks, "C").complete, Some(true));
    assert_eq!(count(&ran_c), 0);
    assert_eq!(hooks.success_calls(), 0);
    assert_eq!(hooks.done_calls(), vec![true]);
    assert_eq!(hooks.errors(), vec!["boom".to_string()]);
}

#[tokio::test]
async fn concurrent_failure_does_not_stop_siblings() {
    let ran_c = counter();
    let hooks = HookLog::default();
    let c = {
        let ran_c = Arc::clone(&ran_c);
        Task::future("C", move |_| {
            let ran_c = Arc::clone(&ran_c);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ran_c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };
    let list = hooks
        .attach(
            TaskList::builder()
                .tasks([ok("A"), boom("B"), c])
                .concurrent(true),
        )
        .build();

    let outcome = list.wait().await;

    assert!(outcome.failed());
    assert_eq!(count(&ran_c), 1);
    assert_eq!(status(&outcome.tasks, "C").complete, Some(true));
    assert_eq!(hooks.done_calls(), vec![true]);
}

#[tokio::test]
async fn skipped_task_never_runs_and_does_not_fail_the_list() {
    let ran = counter();
    let hooks = HookLog::default();
    let skipped = {
        let ran = Arc::clone(&ran);
        Task::fire("Write genesis", move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .skip_if(|_| Some("Already exists".into()))
    };
    let list = hooks
        .attach(TaskList::builder().tasks([skipped, ok("Boot node")]))
        .build();

    let outcome = list.wait().await;

    let genesis = status(&outcome.tasks, "Write genesis");
    assert_eq!(genesis.skipped, Some(Skipped::Reason("Already exists".into())));
    assert_eq!(genesis.pending, Some(false));
    assert_eq!(genesis.complete, None);
    assert_eq!(count(&ran), 0);
    assert!(!outcome.failed());
    assert_eq!(hooks.success_calls(), 1);
    assert_eq!(hooks.done_calls(), vec![false]);
}

#[tokio::test]
async fn false_skip_flag_runs_the_task() {
    let list = TaskList::new([ok("A").skip_if(|_| Some(Skipped::Flag(false)))]);
    let outcome = list.wait().await;
    assert_eq!(outcome.tasks[0].complete, Some(true));
    assert_eq!(outcome.tasks[0].skipped, None);
}

#[tokio::test]
async fn abort_before_attach_skips_everything() {
    let ran = counter();
    let hooks = HookLog::default();
    let a = {
        let ran = Arc::clone(&ran);
        Task::fire("A", move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let list = hooks
        .attach(TaskList::builder().tasks([a, ok("B")]))
        .build();

    list.abort();
    let outcome = list.wait().await;

    for task in &outcome.tasks {
        assert_eq!(task.skipped, Some(Skipped::Reason("Aborted".into())));
        assert_eq!(task.pending, Some(false));
    }
    assert_eq!(count(&ran), 0);
    assert_eq!(hooks.done_calls().len(), 1);

    // A second abort is a no-op.
    list.abort();
    assert_eq!(hooks.done_calls().len(), 1);
}

#[tokio::test]
async fn abort_while_running_settles_open_tasks() {
    init_logs();
    let hooks = HookLog::default();
    let slow = Task::future("Boot node", |_| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    });
    let list = hooks
        .attach(TaskList::builder().tasks([ok("Allocate ports"), slow, ok("Fund")]))
        .build();

    let mut stream = list.subscribe();
    while let Some(tasks) = stream.next().await {
        if status(&tasks, "Boot node").is_pending() {
            break;
        }
    }
    list.abort();

    let mut last = Vec::new();
    while let Some(tasks) = stream.next().await {
        last = tasks;
    }
    assert_eq!(status(&last, "Allocate ports").complete, Some(true));
    assert_eq!(
        status(&last, "Boot node").skipped,
        Some(Skipped::Reason("Aborted".into()))
    );
    assert_eq!(
        status(&last, "Fund").skipped,
        Some(Skipped::Reason("Aborted".into()))
    );
    assert!(list.is_settled());
    assert_eq!(hooks.done_calls().len(), 1);
}

#[tokio::test]
async fn abort_signal_aborts_the_list() {
    let cancel = CancelSignal::new();
    let list: TaskList<Ctx> = TaskList::builder()
        .task(Task::future("wait", |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }))
        .abort_on(cancel.clone())
        .build();

    let waiting = tokio::spawn({
        let list = list.clone();
        async move { list.wait().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let settled = tokio::time::timeout(Duration::from_secs(5), waiting).await;
    let outcome = tokio_test::assert_ok!(settled).unwrap();
    assert_eq!(outcome.tasks[0].skipped, Some(Skipped::Reason("Aborted".into())));
    assert!(list.is_aborted());
}

#[tokio::test]
async fn empty_list_settles_immediately() {
    let hooks = HookLog::default();
    let list: TaskList<Ctx> = hooks.attach(TaskList::builder()).build();

    let arrays = list.subscribe().collect::<Vec<_>>().await;

    assert_eq!(arrays, vec![Vec::<TaskStatus>::new()]);
    assert_eq!(hooks.success_calls(), 1);
    assert_eq!(hooks.done_calls(), vec![false]);
}

#[tokio::test]
async fn run_starts_on_first_attach_and_only_once() {
    let runs = counter();
    let task = {
        let runs = Arc::clone(&runs);
        Task::fire("A", move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let list: TaskList<Ctx> = TaskList::new([task]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count(&runs), 0);
    assert_eq!(list.statuses()[0].pending, None);

    let first = list.wait().await;
    let second = list.wait().await;

    assert_eq!(count(&runs), 1);
    assert_eq!(first, second);

    // Late subscribers get the settled array once.
    let replay = list.subscribe().collect::<Vec<_>>().await;
    assert_eq!(replay, vec![first.tasks]);
}

#[tokio::test]
async fn tasks_share_one_context() {
    let list = TaskList::builder()
        .with_context(|c: &mut Ctx| c.value = 41)
        .task(Task::fire("bump", |ctx: &TaskContext<Ctx>| {
            ctx.update(|c| c.value += 1);
            Ok(())
        }))
        .task(Task::fire("check", |ctx: &TaskContext<Ctx>| {
            let value = ctx.read(|c| c.value);
            anyhow::ensure!(value == 42, "expected 42, got {value}");
            Ok(())
        }))
        .build();

    let outcome = list.wait().await;
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn subtasks_inherit_the_parent_context_unless_fresh() {
    let ctx = TaskContext::new(Ctx {
        value: 7,
        ..Default::default()
    });

    let list = TaskList::new([
        Task::subtasks("shared", |_| {
            Ok(TaskList::builder()
                .with_context(|c: &mut Ctx| c.flag = true)
                .task(Task::fire("record", |ctx: &TaskContext<Ctx>| {
                    ctx.update(|c| {
                        let seen = format!("shared:{}", c.value);
                        c.seen.push(seen);
                    });
                    Ok(())
                }))
                .build())
        }),
        Task::subtasks("fresh", |_| {
            Ok(TaskList::builder()
                .fresh_context()
                .task(Task::fire("record", |ctx: &TaskContext<Ctx>| {
                    ctx.update(|c| c.value = 99);
                    Ok(())
                }))
                .build())
        }),
    ]);

    let outcome = settled_statuses(list.subscribe_with(ctx.clone(), None)).await;
    assert!(outcome.iter().all(TaskStatus::is_complete));

    let snapshot = ctx.snapshot();
    assert_eq!(snapshot.value, 7);
    assert_eq!(snapshot.seen, vec!["shared:7".to_string()]);
    assert!(snapshot.flag);
}

async fn settled_statuses(stream: chainkit_core::task::StatusStream) -> Vec<TaskStatus> {
    chainkit_core::task::collect_outcome(stream).await.tasks
}

#[tokio::test]
async fn nested_failure_reaches_every_ancestor_once() {
    init_logs();
    let outer = HookLog::default();
    let inner = HookLog::default();
    let inner_for_task = inner.clone();

    let list = outer
        .attach(TaskList::builder().task(Task::subtasks("Creating network", move |_| {
            Ok(inner_for_task
                .attach(TaskList::builder().tasks([ok("Allocate ports"), boom("Write genesis")]))
                .build())
        })))
        .build();

    let outcome = list.wait().await;

    assert_eq!(outcome.error.as_deref(), Some("boom"));
    let parent = &outcome.tasks[0];
    assert_eq!(parent.error.as_deref(), Some("boom"));
    let subtasks = parent.subtasks.as_deref().unwrap_or_default();
    assert_eq!(titles(subtasks), vec!["Allocate ports", "Write genesis"]);
    assert_eq!(subtasks[1].error.as_deref(), Some("boom"));

    assert_eq!(inner.errors(), vec!["boom".to_string()]);
    assert_eq!(outer.errors(), vec!["boom".to_string()]);
    assert_eq!(inner.done_calls(), vec![true]);
    assert_eq!(outer.done_calls(), vec![true]);
}

#[tokio::test]
async fn disabled_tasks_are_removed() {
    let list = TaskList::builder()
        .with_context(|c: &mut Ctx| c.flag = false)
        .tasks([
            ok("Stop node").enabled_if(|c: &Ctx| c.flag),
            ok("Remove chain data"),
        ])
        .build();

    let outcome = list.wait().await;
    assert_eq!(titles(&outcome.tasks), vec!["Remove chain data"]);
    assert!(outcome.tasks[0].is_complete());
}

#[tokio::test]
async fn task_disabled_mid_run_is_removed_for_good() {
    let list = TaskList::builder()
        .with_context(|c: &mut Ctx| c.flag = true)
        .tasks([
            Task::fire("Stop node", |ctx: &TaskContext<Ctx>| {
                ctx.update(|c| c.flag = false);
                Ok(())
            }),
            ok("Remove chain data").enabled_if(|c: &Ctx| c.flag),
            Task::fire("Restore flag", |ctx: &TaskContext<Ctx>| {
                ctx.update(|c| c.flag = true);
                Ok(())
            }),
        ])
        .build();

    let mut stream = list.subscribe();
    let first = stream.next().await.unwrap();
    assert_eq!(first.len(), 3);
    let mut last = first;
    while let Some(tasks) = stream.next().await {
        last = tasks;
    }

    assert_eq!(titles(&last), vec!["Stop node", "Restore flag"]);
    assert!(last.iter().all(TaskStatus::is_complete));
    assert_eq!(titles(&list.statuses()), vec!["Stop node", "Restore flag"]);
}

#[tokio::test]
async fn progress_messages_update_the_task() {
    let list: TaskList<Ctx> = TaskList::new([Task::progress("Boot node", |_| {
        futures::stream::iter([
            Ok("Loading genesis".to_string()),
            Ok("Listening on 127.0.0.1:8545".to_string()),
        ])
    })]);

    let outcome = list.wait().await;
    let boot = &outcome.tasks[0];
    assert_eq!(boot.message.as_deref(), Some("Listening on 127.0.0.1:8545"));
    assert_eq!(boot.complete, Some(true));
    assert_eq!(boot.pending, Some(false));
}

#[tokio::test]
async fn progress_error_fails_the_task() {
    let list: TaskList<Ctx> = TaskList::new([Task::progress("Boot node", |_| {
        futures::stream::iter([
            Ok("Loading genesis".to_string()),
            Err(anyhow::anyhow!("port in use")),
        ])
    })]);

    let outcome = list.wait().await;
    assert_eq!(outcome.tasks[0].error.as_deref(), Some("port in use"));
}

#[tokio::test]
async fn empty_error_message_falls_back() {
    let list: TaskList<Ctx> = TaskList::new([Task::fire("A", |_| Err(anyhow::anyhow!("")))]);
    let outcome = list.wait().await;
    assert_eq!(outcome.error.as_deref(), Some("Something went wrong."));
}

#[tokio::test]
async fn panicking_task_becomes_a_task_error() {
    let list: TaskList<Ctx> = TaskList::new([
        Task::fire("A", |_| panic!("kaboom")),
        ok("B"),
    ]);
    let outcome = list.wait().await;
    assert_eq!(outcome.tasks[0].error.as_deref(), Some("kaboom"));
    assert_eq!(outcome.tasks[1].complete, Some(true));
}

async fn settle(list: &TaskList<Ctx>) -> chainkit_core::task::TaskListOutcome {
    let outcome = tokio::time::timeout(Duration::from_secs(5), list.wait()).await;
    tokio_test::assert_ok!(outcome)
}

#[tokio::test]
async fn panicking_subtask_builder_fails_the_task() {
    let list: TaskList<Ctx> = TaskList::new([
        Task::subtasks("Set up network local", |_| panic!("builder exploded")),
        ok("Fund default wallet"),
    ]);

    let outcome = settle(&list).await;
    assert_eq!(outcome.error.as_deref(), Some("builder exploded"));
    assert_eq!(outcome.tasks[1].complete, Some(true));
    assert!(list.is_settled());
}

#[tokio::test]
async fn panicking_future_and_progress_builders_fail_their_tasks() {
    let list: TaskList<Ctx> = TaskList::concurrent([
        Task::future("Write genesis", |_| -> futures::future::Ready<anyhow::Result<()>> {
            panic!("no genesis")
        }),
        Task::progress("Boot node", |_| -> futures::stream::Empty<anyhow::Result<String>> {
            panic!("no node")
        }),
    ]);

    let outcome = settle(&list).await;
    assert_eq!(status(&outcome.tasks, "Write genesis").error.as_deref(), Some("no genesis"));
    assert_eq!(status(&outcome.tasks, "Boot node").error.as_deref(), Some("no node"));
}

#[tokio::test]
async fn panicking_predicates_fail_the_task() {
    let hooks = HookLog::default();
    let list = hooks
        .attach(TaskList::builder().concurrent(true).tasks([
            ok("Allocate ports").skip_if(|_: &Ctx| -> Option<Skipped> { panic!("bad skip") }),
            ok("Check RPC endpoint").enabled_if(|_: &Ctx| -> bool { panic!("bad gate") }),
            ok("Boot node"),
        ]))
        .build();

    let outcome = settle(&list).await;
    assert_eq!(status(&outcome.tasks, "Allocate ports").error.as_deref(), Some("bad skip"));
    assert_eq!(status(&outcome.tasks, "Check RPC endpoint").error.as_deref(), Some("bad gate"));
    assert!(status(&outcome.tasks, "Boot node").is_complete());
    assert_eq!(hooks.errors().len(), 2);
    assert_eq!(hooks.done_calls(), vec![true]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn abort_from_another_thread_always_settles() {
    for round in 0..2_000 {
        let list: TaskList<Ctx> = TaskList::new([Task::progress("Boot node", |_| {
            futures::stream::iter((0..20).map(|i| Ok(format!("block {i}"))))
        })]);
        let _updates = list.subscribe();

        let aborter = list.clone();
        std::thread::spawn(move || aborter.abort()).join().unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), list.wait()).await;
        assert!(outcome.is_ok(), "round {round} never settled");
        assert!(list.is_settled(), "round {round} lost its settled snapshot");
    }
}

#[tokio::test]
async fn concurrent_tasks_settle_independently() {
    let list: TaskList<Ctx> = TaskList::concurrent([
        Task::future("slow", |_| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(())
        }),
        ok("fast"),
    ]);

    let mut stream = list.subscribe();
    let mut saw_fast_first = false;
    let mut last = Vec::new();
    while let Some(tasks) = stream.next().await {
        if status(&tasks, "fast").is_complete() && !status(&tasks, "slow").is_done() {
            saw_fast_first = true;
        }
        last = tasks;
    }
    assert!(saw_fast_first);
    assert!(last.iter().all(TaskStatus::is_complete));
}
