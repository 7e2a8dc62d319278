use std::sync::Arc;

use async_trait::async_trait;
use chainkit_core::api::{
    CommandHook, CommandInvocation, CommandResult, CreateHook, CreateRequest, CrudVerb,
    ResourceContext, ResourceManagement, Skipped, Task, TaskContext, TaskList,
};

use super::ledger::WalletLedger;
use super::WALLET;
use crate::devnet;

pub const FUNDING_AMOUNT: u64 = 100;

/// Credits the selected wallet on `network`. Skipped when no wallet is
/// selected.
pub fn fund_task(ledger: Arc<WalletLedger>, network: String) -> Task<ResourceContext> {
    let selection = Arc::clone(&ledger);
    Task::fire("Fund default wallet", move |ctx: &TaskContext<ResourceContext>| {
        let wallet = ledger
            .selected()
            .ok_or_else(|| anyhow::anyhow!("no wallet is selected"))?;
        let balance = ledger.credit(&wallet, &network, FUNDING_AMOUNT)?;
        tracing::info!(wallet = %wallet, network = %network, balance, "wallet funded");
        ctx.update(|c| {
            c.notes
                .push(format!("{wallet} holds {balance} on {network}"))
        });
        Ok(())
    })
    .skip_if(move |_| {
        selection
            .selected()
            .is_none()
            .then(|| Skipped::from("No wallet selected"))
    })
}

/// Funds the selected wallet on every network created while this plugin is
/// loaded.
pub struct FundOnNetworkCreate {
    ledger: Arc<WalletLedger>,
}

impl FundOnNetworkCreate {
    pub fn new(ledger: Arc<WalletLedger>) -> Self {
        Self { ledger }
    }
}

impl CreateHook for FundOnNetworkCreate {
    fn name(&self) -> &str {
        "wallet.fund-on-network-create"
    }

    fn applies_to(&self, request: &CreateRequest) -> bool {
        request.plugin == devnet::PLUGIN && request.kind == devnet::NETWORK
    }

    fn augment(
        &self,
        request: &CreateRequest,
        list: TaskList<ResourceContext>,
    ) -> TaskList<ResourceContext> {
        TaskList::new([
            Task::subtasks(format!("Set up network {}", request.name), move |_| {
                Ok(list.clone())
            }),
            fund_task(Arc::clone(&self.ledger), request.name.clone()),
        ])
    }
}

/// Makes a freshly created wallet the selected one.
pub struct SelectNewWallet {
    ledger: Arc<WalletLedger>,
}

impl SelectNewWallet {
    pub fn new(ledger: Arc<WalletLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl CommandHook for SelectNewWallet {
    fn name(&self) -> &str {
        "wallet.select-new-wallet"
    }

    async fn post(
        &self,
        invocation: &CommandInvocation,
        result: &CommandResult,
        _api: &dyn ResourceManagement,
    ) -> anyhow::Result<()> {
        if !result.success || !invocation.is(CrudVerb::Create, WALLET) {
            return Ok(());
        }
        if let Some(name) = &invocation.name {
            self.ledger.select(name)?;
            tracing::info!(wallet = %name, "wallet selected");
        }
        Ok(())
    }
}
