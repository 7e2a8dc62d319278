//! Wallets: key files, a selected wallet, and simulated balances.

mod adapter;
mod hooks;
mod ledger;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chainkit_core::api::{
    CommandHook, CommandOption, CreateHook, Plugin, ResourceContext, ResourceError,
    ResourceRequest, ResourceType, TaskList,
};

pub use adapter::{WalletAdapter, WalletMaster, WalletRecord};
pub use hooks::{fund_task, FundOnNetworkCreate, SelectNewWallet, FUNDING_AMOUNT};
pub use ledger::WalletLedger;

pub const PLUGIN: &str = "wallet";
pub const WALLET: &str = "wallet";

pub struct WalletPlugin {
    data_dir: PathBuf,
    ledger: Arc<WalletLedger>,
    wallet: Arc<ResourceType>,
}

impl WalletPlugin {
    pub fn new(data_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.into();
        let ledger = Arc::new(WalletLedger::open(&data_dir.join("ledger.json"))?);
        let master = Arc::new(WalletMaster::new(data_dir.clone(), Arc::clone(&ledger)));
        let wallet = ResourceType::new(PLUGIN, WALLET, master).with_create_option(
            CommandOption::value("network", "Network the wallet is used on", None),
        );

        Ok(Self {
            data_dir,
            ledger,
            wallet: Arc::new(wallet),
        })
    }

    pub fn ledger(&self) -> &Arc<WalletLedger> {
        &self.ledger
    }

    fn unknown(&self, method: &str) -> ResourceError {
        ResourceError::UnknownMethod {
            plugin: PLUGIN.to_string(),
            method: method.to_string(),
        }
    }
}

#[async_trait]
impl Plugin for WalletPlugin {
    fn name(&self) -> &str {
        PLUGIN
    }

    fn resource_types(&self) -> Vec<Arc<ResourceType>> {
        vec![Arc::clone(&self.wallet)]
    }

    fn dependencies(&self) -> Vec<String> {
        vec![crate::devnet::PLUGIN.to_string()]
    }

    fn create_hooks(&self) -> Vec<Arc<dyn CreateHook>> {
        vec![Arc::new(FundOnNetworkCreate::new(Arc::clone(&self.ledger)))]
    }

    fn command_hooks(&self) -> Vec<Arc<dyn CommandHook>> {
        vec![Arc::new(SelectNewWallet::new(Arc::clone(&self.ledger)))]
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.ledger.reset()?;
        let dir = adapter::wallets_dir(&self.data_dir);
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// `fund`: credit the selected wallet on the network named by the request.
    fn execute_task_list(
        &self,
        method: &str,
        request: &ResourceRequest,
    ) -> Result<TaskList<ResourceContext>, ResourceError> {
        match method {
            "fund" => {
                let network = request.require_name("fund")?.to_string();
                Ok(TaskList::new([fund_task(Arc::clone(&self.ledger), network)]))
            }
            _ => Err(self.unknown(method)),
        }
    }

    /// `selected`: the selected wallet. `balance`: the selected wallet's
    /// balance on the network named by the request.
    async fn request(
        &self,
        method: &str,
        request: &ResourceRequest,
    ) -> Result<serde_json::Value, ResourceError> {
        match method {
            "selected" => Ok(serde_json::json!({ "selected": self.ledger.selected() })),
            "balance" => {
                let network = request.require_name("balance")?;
                let wallet = self
                    .ledger
                    .selected()
                    .ok_or_else(|| ResourceError::not_found(WALLET, "<selected>"))?;
                Ok(serde_json::json!({
                    "wallet": wallet,
                    "network": network,
                    "balance": self.ledger.balance(&wallet, network),
                }))
            }
            _ => Err(self.unknown(method)),
        }
    }
}
