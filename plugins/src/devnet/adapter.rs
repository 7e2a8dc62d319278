use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainkit_core::api::{
    BaseResource, CreateRequest, MasterResourceAdapter, ResourceAdapter, ResourceCell,
    ResourceContext, ResourceState, Skipped, Task, TaskContext, TaskList,
};
use chrono::Utc;
use tokio::sync::watch;

use super::genesis::{genesis_path, network_dir, next_free_port, used_ports, Genesis};
use super::{NETWORK, PLUGIN};

pub const DEFAULT_CHAIN_ID: u64 = 1337;
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 2;

/// Simulated local chain node. The node "runs" as long as the resource is
/// started; nothing is actually spawned.
pub struct NetworkAdapter {
    cell: ResourceCell,
    genesis: Genesis,
    dir: PathBuf,
    step_delay: Duration,
}

impl NetworkAdapter {
    fn new(resource: BaseResource, genesis: Genesis, dir: PathBuf, step_delay: Duration) -> Self {
        Self {
            cell: ResourceCell::new(resource),
            genesis,
            dir,
            step_delay,
        }
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    fn launch_task(&self) -> Task<ResourceContext> {
        let cell = self.cell.clone();
        let running = self.cell.clone();
        let delay = self.step_delay;
        Task::future("Launch node", move |_| {
            let cell = cell.clone();
            async move {
                tokio::time::sleep(delay).await;
                cell.set_state(ResourceState::Started);
                Ok(())
            }
        })
        .skip_if(move |_| {
            running
                .get()
                .is_started()
                .then(|| Skipped::from("Already started"))
        })
    }

    fn halt_task(&self) -> Task<ResourceContext> {
        let cell = self.cell.clone();
        let halted = self.cell.clone();
        let delay = self.step_delay;
        Task::future("Stop node", move |_| {
            let cell = cell.clone();
            async move {
                tokio::time::sleep(delay).await;
                cell.set_state(ResourceState::Stopped);
                Ok(())
            }
        })
        .skip_if(move |_| {
            (!halted.get().is_started()).then(|| Skipped::from("Already stopped"))
        })
    }
}

#[async_trait]
impl ResourceAdapter for NetworkAdapter {
    fn resource(&self) -> BaseResource {
        self.cell.get()
    }

    fn delete(&self) -> TaskList<ResourceContext> {
        let running = self.cell.clone();
        let dir = self.dir.clone();
        TaskList::new([
            self.halt_task().enabled_if(move |_| running.get().is_started()),
            Task::future("Remove chain data", move |_| {
                let dir = dir.clone();
                async move {
                    if tokio::fs::try_exists(&dir).await? {
                        tokio::fs::remove_dir_all(&dir).await?;
                    }
                    Ok(())
                }
            }),
        ])
    }

    fn start(&self) -> TaskList<ResourceContext> {
        let rpc_url = self.genesis.rpc_url();
        TaskList::new([
            self.launch_task(),
            Task::fire("Check RPC endpoint", move |ctx: &TaskContext<ResourceContext>| {
                ctx.update(|c| c.notes.push(format!("RPC available at {rpc_url}")));
                Ok(())
            }),
        ])
    }

    fn stop(&self) -> TaskList<ResourceContext> {
        TaskList::new([self.halt_task()])
    }

    fn watch(&self) -> watch::Receiver<BaseResource> {
        self.cell.subscribe()
    }

    fn debug_info(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": self.genesis.chain_id,
            "rpcUrl": self.genesis.rpc_url(),
            "blockTimeSecs": self.genesis.block_time_secs,
            "createdAt": self.genesis.created_at,
            "dataDir": self.dir.display().to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct Draft {
    rpc_port: Option<u16>,
}

pub struct NetworkMaster {
    data_dir: PathBuf,
    step_delay: Duration,
}

impl NetworkMaster {
    pub fn new(data_dir: PathBuf, step_delay: Duration) -> Self {
        Self {
            data_dir,
            step_delay,
        }
    }
}

fn parse_chain_id(request: &CreateRequest) -> anyhow::Result<u64> {
    match request.args.first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid chain id '{raw}'")),
        None => Ok(DEFAULT_CHAIN_ID),
    }
}

fn parse_block_time(request: &CreateRequest) -> anyhow::Result<u64> {
    match request.option_str("block-time") {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid block time '{raw}'")),
        None => Ok(DEFAULT_BLOCK_TIME_SECS),
    }
}

#[async_trait]
impl MasterResourceAdapter for NetworkMaster {
    async fn init_resource_adapter(
        &self,
        resource: BaseResource,
    ) -> anyhow::Result<Arc<dyn ResourceAdapter>> {
        let genesis = Genesis::read(&genesis_path(&self.data_dir, &resource.name)).await?;
        let dir = network_dir(&self.data_dir, &resource.name);
        Ok(Arc::new(NetworkAdapter::new(
            resource,
            genesis,
            dir,
            self.step_delay,
        )))
    }

    fn create(&self, request: &CreateRequest) -> anyhow::Result<TaskList<ResourceContext>> {
        let chain_id = parse_chain_id(request)?;
        let block_time_secs = parse_block_time(request)?;
        let genesis_file = genesis_path(&self.data_dir, &request.name);
        let draft = Arc::new(Mutex::new(Draft::default()));

        let exists = {
            let genesis_file = genesis_file.clone();
            move |_: &ResourceContext| genesis_file.exists().then(|| Skipped::from("Already exists"))
        };

        let allocate = {
            let draft = Arc::clone(&draft);
            let data_dir = self.data_dir.clone();
            Task::fire("Allocate ports", move |ctx: &TaskContext<ResourceContext>| {
                let port = next_free_port(&used_ports(&data_dir))?;
                if let Ok(mut draft) = draft.lock() {
                    draft.rpc_port = Some(port);
                }
                ctx.update(|c| c.notes.push(format!("RPC port {port}")));
                Ok(())
            })
            .skip_if(exists.clone())
        };

        let write_genesis = {
            let draft = Arc::clone(&draft);
            let path = genesis_file.clone();
            Task::future("Write genesis", move |_| {
                let port = draft.lock().ok().and_then(|d| d.rpc_port);
                let path = path.clone();
                async move {
                    let rpc_port =
                        port.ok_or_else(|| anyhow::anyhow!("no RPC port was allocated"))?;
                    Genesis {
                        chain_id,
                        rpc_port,
                        block_time_secs,
                        created_at: Utc::now(),
                    }
                    .write(&path)
                    .await
                }
            })
            .skip_if(exists)
        };

        let boot = {
            let path = genesis_file;
            let dir = network_dir(&self.data_dir, &request.name);
            let delay = self.step_delay;
            Task::progress("Boot node", move |ctx: TaskContext<ResourceContext>| {
                let path = path.clone();
                let dir = dir.clone();
                async_stream::try_stream! {
                    yield "Loading genesis".to_string();
                    let genesis = Genesis::read(&path).await?;
                    let name = ctx.read(|c| c.request.name.clone());

                    tokio::time::sleep(delay).await;
                    yield format!("Listening on {}", genesis.rpc_url());

                    tokio::time::sleep(delay).await;
                    let chain_id = genesis.chain_id;
                    let node = NetworkAdapter::new(
                        BaseResource::new(PLUGIN, NETWORK, &name),
                        genesis,
                        dir,
                        delay,
                    );
                    node.cell.set_state(ResourceState::Started);
                    let adapter: Arc<dyn ResourceAdapter> = Arc::new(node);
                    ctx.update(|c| c.adapter = Some(adapter));
                    yield format!("Chain {chain_id} is producing blocks");
                }
            })
        };

        Ok(TaskList::new([allocate, write_genesis, boot]))
    }
}
