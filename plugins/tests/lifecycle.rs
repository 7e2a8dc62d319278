use std::sync::Arc;
use std::time::Duration;

use chainkit_core::api::{
    last_update, CancelSignal, CommandInvocation, CommandResult, CrudVerb, Plugin, PluginManager,
    ResourceError, ResourceManagement, ResourceRequest, ResourceState, ResourceStore, Skipped,
    TaskStatus, TaskUpdate,
};
use chainkit_plugins::devnet::{self, DevnetPlugin};
use chainkit_plugins::wallet::{self, WalletPlugin, FUNDING_AMOUNT};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    wallets: Arc<WalletPlugin>,
    manager: PluginManager,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let devnet = Arc::new(DevnetPlugin::with_step_delay(
        dir.path().join("devnet"),
        Duration::ZERO,
    ));
    let wallets = Arc::new(WalletPlugin::new(dir.path().join("wallet")).unwrap());
    let store = ResourceStore::open(&dir.path().join("resources.json")).unwrap();
    let plugins: Vec<Arc<dyn Plugin>> = vec![devnet, wallets.clone()];
    let manager = PluginManager::new(plugins, Arc::new(store)).unwrap();
    Harness {
        _dir: dir,
        wallets,
        manager,
    }
}

fn network(name: &str) -> ResourceRequest {
    ResourceRequest::new(devnet::PLUGIN, devnet::NETWORK).with_name(name)
}

fn wallet_on(name: &str, network: &str) -> ResourceRequest {
    ResourceRequest::new(wallet::PLUGIN, wallet::WALLET)
        .with_name(name)
        .with_options(serde_json::json!({ "network": network }))
}

fn find<'a>(tasks: &'a [TaskStatus], title: &str) -> Option<&'a TaskStatus> {
    tasks.iter().find_map(|t| {
        if t.title == title {
            Some(t)
        } else {
            t.subtasks.as_deref().and_then(|s| find(s, title))
        }
    })
}

async fn run(stream: Result<chainkit_core::api::TaskStream, ResourceError>) -> TaskUpdate {
    last_update(tokio_test::assert_ok!(stream)).await
}

#[tokio::test]
async fn create_network_boots_it_and_skips_funding_without_a_wallet() {
    let h = harness();

    let update = run(h.manager.create_resource(network("local")).await).await;

    assert_eq!(update.error(), None);
    assert_eq!(update.notes, vec!["RPC port 8545".to_string()]);
    let fund = find(&update.tasks, "Fund default wallet").unwrap();
    assert_eq!(fund.skipped, Some(Skipped::Reason("No wallet selected".into())));
    let boot = find(&update.tasks, "Boot node").unwrap();
    assert!(boot.is_complete());

    let resource = h
        .manager
        .get_resource(network("local"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resource.state, ResourceState::Started);

    let rpc = h
        .manager
        .request("rpc-url", network("local"))
        .await
        .unwrap();
    assert_eq!(rpc["rpcUrl"], "http://127.0.0.1:8545");
}

#[tokio::test]
async fn create_rejects_a_taken_name() {
    let h = harness();
    run(h.manager.create_resource(network("local")).await).await;

    let err = h
        .manager
        .create_resource(network("local"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ResourceError::AlreadyExists { .. }), "{err}");
}

#[tokio::test]
async fn network_with_a_wallet_cannot_be_deleted() {
    let h = harness();
    run(h.manager.create_resource(network("local")).await).await;
    let update = run(h.manager.create_resource(wallet_on("alice", "local")).await).await;
    assert_eq!(update.error(), None);

    let err = h
        .manager
        .delete_resource(network("local"))
        .await
        .err()
        .unwrap();
    match err {
        ResourceError::HasDependents { dependents, .. } => {
            assert_eq!(dependents, "wallet/wallet/alice")
        }
        other => panic!("unexpected error: {other}"),
    }

    let wallet = ResourceRequest::new(wallet::PLUGIN, wallet::WALLET).with_name("alice");
    let update = run(h.manager.delete_resource(wallet).await).await;
    assert_eq!(update.error(), None);

    let update = run(h.manager.delete_resource(network("local")).await).await;
    assert_eq!(update.error(), None);
    assert!(find(&update.tasks, "Stop node").unwrap().is_complete());
    assert!(h
        .manager
        .get_resource(network("local"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn stop_and_start_track_state() {
    let h = harness();
    run(h.manager.create_resource(network("local")).await).await;

    let update = run(h.manager.stop_resource(network("local")).await).await;
    assert_eq!(update.error(), None);
    let state = h.manager.get_resource(network("local")).await.unwrap().unwrap().state;
    assert_eq!(state, ResourceState::Stopped);

    let update = run(h.manager.stop_resource(network("local")).await).await;
    let stop = find(&update.tasks, "Stop node").unwrap();
    assert_eq!(stop.skipped, Some(Skipped::Reason("Already stopped".into())));

    run(h.manager.start_resource(network("local")).await).await;
    let state = h.manager.get_resource(network("local")).await.unwrap().unwrap().state;
    assert_eq!(state, ResourceState::Started);
}

#[tokio::test]
async fn selected_wallet_is_funded_on_new_networks() {
    let h = harness();
    run(h.manager.create_resource(network("local")).await).await;
    run(h.manager.create_resource(wallet_on("alice", "local")).await).await;

    let invocation =
        CommandInvocation::crud(CrudVerb::Create, wallet::PLUGIN, wallet::WALLET, Some("alice"));
    for hook in h.manager.command_hooks() {
        hook.post(&invocation, &CommandResult::ok(), &h.manager)
            .await
            .unwrap();
    }
    assert_eq!(h.wallets.ledger().selected().as_deref(), Some("alice"));

    let update = run(h.manager.create_resource(network("staging")).await).await;
    assert!(find(&update.tasks, "Fund default wallet").unwrap().is_complete());
    assert_eq!(h.wallets.ledger().balance("alice", "staging"), FUNDING_AMOUNT);

    let balance = h
        .manager
        .request(
            "balance",
            ResourceRequest::new(wallet::PLUGIN, wallet::WALLET).with_name("staging"),
        )
        .await
        .unwrap();
    assert_eq!(balance["balance"], FUNDING_AMOUNT);
}

#[tokio::test]
async fn list_follows_changes_until_cancelled() {
    let h = harness();
    let cancel = CancelSignal::new();
    let mut stream = h
        .manager
        .list_resources(
            ResourceRequest::new(devnet::PLUGIN, devnet::NETWORK).with_cancel(cancel.clone()),
        )
        .await
        .unwrap();

    assert_eq!(stream.next().await.unwrap(), Vec::new());
    run(h.manager.create_resource(network("local")).await).await;

    let mut names = Vec::new();
    while let Some(resources) = stream.next().await {
        names = resources.iter().map(|r| r.name.clone()).collect::<Vec<_>>();
        if !names.is_empty() {
            break;
        }
    }
    assert_eq!(names, vec!["local".to_string()]);

    cancel.cancel();
    while stream.next().await.is_some() {}
}

#[tokio::test]
async fn unknown_plugin_and_kind_are_errors() {
    let h = harness();
    let err = h
        .manager
        .create_resource(ResourceRequest::new("nope", "network").with_name("x"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ResourceError::PluginNotFound(_)), "{err}");

    let err = h.manager.resolve_kind(None, "validator").err().unwrap();
    assert!(matches!(err, ResourceError::KindNotFound { .. }), "{err}");
}

#[tokio::test]
async fn duplicate_plugins_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(DevnetPlugin::new(dir.path())),
        Arc::new(DevnetPlugin::new(dir.path())),
    ];
    let err = PluginManager::new(plugins, Arc::new(ResourceStore::in_memory()))
        .err()
        .unwrap();
    assert!(matches!(err, ResourceError::DuplicatePlugin(name) if name == "devnet"));
}

#[tokio::test]
async fn resources_survive_a_new_process() {
    let dir = tempfile::tempdir().unwrap();
    let open = || {
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(DevnetPlugin::with_step_delay(
                dir.path().join("devnet"),
                Duration::ZERO,
            )),
            Arc::new(WalletPlugin::new(dir.path().join("wallet")).unwrap()),
        ];
        let store = ResourceStore::open(&dir.path().join("resources.json")).unwrap();
        PluginManager::new(plugins, Arc::new(store)).unwrap()
    };

    let first = open();
    run(first.create_resource(network("local")).await).await;
    run(first.create_resource(wallet_on("alice", "local")).await).await;
    first.shutdown().await;

    let second = open();
    assert_eq!(second.load().await, 2);
    let err = second
        .delete_resource(network("local"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ResourceError::HasDependents { .. }), "{err}");
}

#[tokio::test]
async fn cancel_aborts_a_running_create() {
    let dir = tempfile::tempdir().unwrap();
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(DevnetPlugin::with_step_delay(
        dir.path(),
        Duration::from_secs(3600),
    ))];
    let manager = PluginManager::new(plugins, Arc::new(ResourceStore::in_memory())).unwrap();

    let cancel = CancelSignal::new();
    let stream = manager
        .create_resource(network("local").with_cancel(cancel.clone()))
        .await
        .unwrap();
    let waiting = tokio::spawn(last_update(stream));
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let update = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("create settles after cancel")
        .unwrap();
    let registering = find(&update.tasks, "Registering network local").unwrap();
    assert_eq!(registering.skipped, Some(Skipped::Reason("Aborted".into())));
    assert!(manager
        .get_resource(network("local"))
        .await
        .unwrap()
        .is_none());
}
