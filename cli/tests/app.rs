use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainkit_cli::app::App;
use chainkit_cli::commands::cli::Args;
use chainkit_core::api::{
    AppConfig, CancelSignal, CliError, Plugin, PluginManager, ResourceError, ResourceStore,
};
use chainkit_plugins::devnet::DevnetPlugin;
use chainkit_plugins::wallet::WalletPlugin;
use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Cli {
    _dir: TempDir,
    app: App,
    out: Arc<Mutex<String>>,
}

impl Cli {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(DevnetPlugin::with_step_delay(
                dir.path().join("devnet"),
                Duration::ZERO,
            )),
            Arc::new(WalletPlugin::new(dir.path().join("wallet")).unwrap()),
        ];
        let manager =
            PluginManager::new(plugins, Arc::new(ResourceStore::in_memory())).unwrap();

        let out = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&out);
        let app = App::new(manager, AppConfig::default())
            .with_output(Arc::new(move |text: &str| sink.lock().unwrap().push_str(text)));
        Self {
            _dir: dir,
            app,
            out,
        }
    }

    async fn run(&self, argv: &[&str]) -> Result<i32, CliError> {
        self.run_until(argv, CancelSignal::new()).await
    }

    async fn run_until(&self, argv: &[&str], cancel: CancelSignal) -> Result<i32, CliError> {
        let args = Args::try_parse_from(std::iter::once("chainkit").chain(argv.iter().copied()))
            .unwrap();
        self.app.run(&args, cancel).await
    }

    fn take_output(&self) -> String {
        std::mem::take(&mut *self.out.lock().unwrap())
    }
}

#[tokio::test]
async fn create_prints_the_collapsed_tree_and_the_done_line() {
    let cli = Cli::new();

    assert_eq!(cli.run(&["create", "network", "local"]).await.unwrap(), 0);
    assert_eq!(
        cli.take_output(),
        "✔ Set up network local\n\
         ↓ Fund default wallet [skipped: No wallet selected]\n\
         Created network local\n\
         \x20 RPC port 8545\n"
    );

    assert_eq!(cli.run(&["get", "network"]).await.unwrap(), 0);
    assert_eq!(cli.take_output(), "NAME   STATE\nlocal  started\n");
}

#[tokio::test]
async fn expand_keeps_subtasks() {
    let cli = Cli::new();
    cli.run(&["--expand", "create", "network", "local"])
        .await
        .unwrap();
    let out = cli.take_output();
    assert!(out.contains("    ✔ Boot node\n"), "{out}");
}

#[tokio::test]
async fn new_wallet_is_selected_and_funded() {
    let cli = Cli::new();
    cli.run(&["create", "network", "local"]).await.unwrap();
    cli.run(&["create", "wallet", "alice", "-o", "network=local"])
        .await
        .unwrap();
    cli.take_output();

    cli.run(&["create", "network", "staging"]).await.unwrap();
    let out = cli.take_output();
    assert!(out.contains("✔ Fund default wallet\n"), "{out}");
    assert!(out.ends_with("  alice holds 100 on staging\n"), "{out}");

    let err = tokio_test::assert_err!(cli.run(&["delete", "network", "local"]).await);
    assert!(
        matches!(err, CliError::Resource(ResourceError::HasDependents { .. })),
        "{err}"
    );
    assert_eq!(err.exit_code(), 20);
}

#[tokio::test]
async fn start_reports_the_rpc_endpoint() {
    let cli = Cli::new();
    cli.run(&["create", "network", "local"]).await.unwrap();
    cli.run(&["stop", "network", "local"]).await.unwrap();
    cli.take_output();

    assert_eq!(cli.run(&["start", "network", "local"]).await.unwrap(), 0);
    let out = cli.take_output();
    assert!(
        out.ends_with("Started network local\n  RPC available at http://127.0.0.1:8545\n"),
        "{out}"
    );
}

#[tokio::test]
async fn cancelled_watch_exits_as_cancelled() {
    let cli = Cli::new();
    let cancel = CancelSignal::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.cancel();
    });

    let err = tokio_test::assert_err!(
        cli.run_until(&["get", "network", "--watch"], cancel).await
    );
    assert!(matches!(err, CliError::Cancelled), "{err}");
    assert_eq!(err.exit_code(), 130);
    assert!(cli.take_output().starts_with("No networks found.\n"));
}

#[tokio::test]
async fn unknown_create_option_is_rejected() {
    let cli = Cli::new();
    let err = tokio_test::assert_err!(
        cli.run(&["create", "network", "local", "-o", "colour=blue"])
            .await
    );
    assert!(matches!(err, CliError::Command(_)), "{err}");
}

#[tokio::test]
async fn unknown_kind_exits_with_not_found() {
    let cli = Cli::new();
    let err = tokio_test::assert_err!(cli.run(&["get", "validator"]).await);
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn describe_shows_adapter_details() {
    let cli = Cli::new();
    cli.run(&["create", "network", "local", "7777"]).await.unwrap();
    cli.take_output();

    cli.run(&["describe", "network", "local"]).await.unwrap();
    let out = cli.take_output();
    assert!(out.starts_with("Network: local\n"), "{out}");
    assert!(out.contains("    chainId: 7777\n"), "{out}");
    assert!(out.contains("    rpcUrl: http://127.0.0.1:8545\n"), "{out}");
}

#[tokio::test]
async fn reset_requires_confirmation() {
    let cli = Cli::new();
    cli.run(&["create", "network", "local"]).await.unwrap();
    cli.take_output();

    let err = cli.run(&["reset"]).await.unwrap_err();
    assert!(matches!(err, CliError::Command(_)), "{err}");

    assert_eq!(cli.run(&["reset", "--yes"]).await.unwrap(), 0);
    assert_eq!(cli.take_output(), "All resources were reset.\n");

    cli.run(&["get", "network"]).await.unwrap();
    assert_eq!(cli.take_output(), "No networks found.\n");
}
