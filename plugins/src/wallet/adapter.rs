use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chainkit_core::api::{
    BaseResource, CreateRequest, MasterResourceAdapter, ResourceAdapter, ResourceCell,
    ResourceContext, ResourceKey, ResourceState, Skipped, Task, TaskContext, TaskList,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::ledger::WalletLedger;
use super::{PLUGIN, WALLET};
use crate::devnet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: String,
    pub network: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    fn generate(network: Option<String>) -> Self {
        let hex = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self {
            address: format!("0x{}", &hex[..40]),
            network,
            created_at: Utc::now(),
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read key file {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse key file {}", path.display()))
    }

    async fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?)
            .await
            .with_context(|| format!("write key file {}", path.display()))
    }
}

pub fn wallets_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("wallets")
}

pub fn key_file(data_dir: &Path, name: &str) -> PathBuf {
    wallets_dir(data_dir).join(format!("{name}.json"))
}

/// A key file on disk. "Started" means unlocked.
pub struct WalletAdapter {
    cell: ResourceCell,
    record: WalletRecord,
    path: PathBuf,
    ledger: Arc<WalletLedger>,
}

impl WalletAdapter {
    pub fn record(&self) -> &WalletRecord {
        &self.record
    }

    fn set_state_task(
        &self,
        title: &str,
        target: ResourceState,
        already: &'static str,
    ) -> Task<ResourceContext> {
        let cell = self.cell.clone();
        let current = self.cell.clone();
        Task::fire(title, move |_| {
            cell.set_state(target);
            Ok(())
        })
        .skip_if(move |_| (current.get().state == target).then(|| Skipped::from(already)))
    }
}

#[async_trait]
impl ResourceAdapter for WalletAdapter {
    fn resource(&self) -> BaseResource {
        self.cell.get()
    }

    fn delete(&self) -> TaskList<ResourceContext> {
        let path = self.path.clone();
        let ledger = Arc::clone(&self.ledger);
        let name = self.cell.get().name;
        TaskList::new([
            Task::future("Remove key file", move |_| {
                let path = path.clone();
                async move {
                    if tokio::fs::try_exists(&path).await? {
                        tokio::fs::remove_file(&path).await?;
                    }
                    Ok(())
                }
            }),
            Task::fire("Forget balances", move |_| ledger.forget(&name)),
        ])
    }

    fn start(&self) -> TaskList<ResourceContext> {
        TaskList::new([self.set_state_task(
            "Unlock wallet",
            ResourceState::Started,
            "Already unlocked",
        )])
    }

    fn stop(&self) -> TaskList<ResourceContext> {
        TaskList::new([self.set_state_task(
            "Lock wallet",
            ResourceState::Stopped,
            "Already locked",
        )])
    }

    fn watch(&self) -> watch::Receiver<BaseResource> {
        self.cell.subscribe()
    }

    fn debug_info(&self) -> serde_json::Value {
        let name = self.cell.get().name;
        let mut info = serde_json::json!({
            "address": self.record.address,
            "createdAt": self.record.created_at,
            "selected": self.ledger.selected().as_deref() == Some(name.as_str()),
        });
        if let Some(network) = &self.record.network {
            info["network"] = serde_json::json!(network);
            info["balance"] = serde_json::json!(self.ledger.balance(&name, network));
        }
        info
    }
}

pub struct WalletMaster {
    data_dir: PathBuf,
    ledger: Arc<WalletLedger>,
}

impl WalletMaster {
    pub fn new(data_dir: PathBuf, ledger: Arc<WalletLedger>) -> Self {
        Self { data_dir, ledger }
    }
}

fn wallet_adapter(
    data_dir: &Path,
    ledger: &Arc<WalletLedger>,
    resource: BaseResource,
    record: WalletRecord,
) -> WalletAdapter {
    WalletAdapter {
        path: key_file(data_dir, &resource.name),
        cell: ResourceCell::new(resource),
        record,
        ledger: Arc::clone(ledger),
    }
}

#[async_trait]
impl MasterResourceAdapter for WalletMaster {
    async fn init_resource_adapter(
        &self,
        resource: BaseResource,
    ) -> anyhow::Result<Arc<dyn ResourceAdapter>> {
        let record = WalletRecord::read(&key_file(&self.data_dir, &resource.name))?;
        Ok(Arc::new(wallet_adapter(
            &self.data_dir,
            &self.ledger,
            resource,
            record,
        )))
    }

    fn create(&self, request: &CreateRequest) -> anyhow::Result<TaskList<ResourceContext>> {
        let path = key_file(&self.data_dir, &request.name);
        let network = request.option_str("network").map(str::to_string);
        let generated: Arc<Mutex<Option<WalletRecord>>> = Arc::new(Mutex::new(None));

        let generate = {
            let generated = Arc::clone(&generated);
            let network = network.clone();
            let existing = path.clone();
            Task::fire("Generate keys", move |_| {
                if let Ok(mut slot) = generated.lock() {
                    *slot = Some(WalletRecord::generate(network.clone()));
                }
                Ok(())
            })
            .skip_if(move |_| existing.exists().then(|| Skipped::from("Already exists")))
        };

        let link = {
            let linked = network.clone();
            Task::fire("Link network", move |ctx: &TaskContext<ResourceContext>| {
                if let Some(network) = &linked {
                    ctx.update(|c| {
                        c.dependencies
                            .push(ResourceKey::new(devnet::PLUGIN, devnet::NETWORK, network))
                    });
                }
                Ok(())
            })
            .enabled_if(move |_| network.is_some())
        };

        let save = {
            let data_dir = self.data_dir.clone();
            let ledger = Arc::clone(&self.ledger);
            Task::future("Save key file", move |ctx: TaskContext<ResourceContext>| {
                let record = generated.lock().ok().and_then(|slot| slot.clone());
                let path = path.clone();
                let data_dir = data_dir.clone();
                let ledger = Arc::clone(&ledger);
                async move {
                    if let Some(record) = &record {
                        record.write(&path).await?;
                    }
                    let record = WalletRecord::read(&path)?;
                    let name = ctx.read(|c| c.request.name.clone());
                    let resource = BaseResource::new(PLUGIN, WALLET, &name);
                    let adapter: Arc<dyn ResourceAdapter> =
                        Arc::new(wallet_adapter(&data_dir, &ledger, resource, record));
                    ctx.update(|c| c.adapter = Some(adapter));
                    Ok(())
                }
            })
        };

        Ok(TaskList::new([generate, link, save]))
    }
}
