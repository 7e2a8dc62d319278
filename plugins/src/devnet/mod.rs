//! Local development networks.

mod adapter;
mod genesis;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainkit_core::api::{
    CommandOption, Plugin, ResourceError, ResourceRequest, ResourceState, ResourceType,
};

pub use adapter::{NetworkAdapter, NetworkMaster, DEFAULT_BLOCK_TIME_SECS, DEFAULT_CHAIN_ID};
pub use genesis::Genesis;

pub const PLUGIN: &str = "devnet";
pub const NETWORK: &str = "network";

const STEP_DELAY: Duration = Duration::from_millis(150);

pub struct DevnetPlugin {
    data_dir: PathBuf,
    network: Arc<ResourceType>,
}

impl DevnetPlugin {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_step_delay(data_dir, STEP_DELAY)
    }

    /// `step_delay` paces the simulated node; tests pass zero.
    pub fn with_step_delay(data_dir: impl Into<PathBuf>, step_delay: Duration) -> Self {
        let data_dir = data_dir.into();
        let master = Arc::new(NetworkMaster::new(data_dir.clone(), step_delay));
        let network = ResourceType::new(PLUGIN, NETWORK, master)
            .with_create_args(&["chain-id"])
            .with_create_option(CommandOption::value(
                "block-time",
                "Seconds between blocks",
                Some("2"),
            ))
            .with_filter(|resources, options| {
                let wanted = match options.get("state").and_then(serde_json::Value::as_str) {
                    Some("started") => ResourceState::Started,
                    Some("stopped") => ResourceState::Stopped,
                    _ => return resources,
                };
                resources.into_iter().filter(|r| r.state == wanted).collect()
            });

        Self {
            data_dir,
            network: Arc::new(network),
        }
    }
}

#[async_trait]
impl Plugin for DevnetPlugin {
    fn name(&self) -> &str {
        PLUGIN
    }

    fn resource_types(&self) -> Vec<Arc<ResourceType>> {
        vec![Arc::clone(&self.network)]
    }

    async fn reset(&self) -> anyhow::Result<()> {
        let dir = genesis::networks_dir(&self.data_dir);
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// `rpc-url`: where the named network listens.
    async fn request(
        &self,
        method: &str,
        request: &ResourceRequest,
    ) -> Result<serde_json::Value, ResourceError> {
        match method {
            "rpc-url" => {
                let name = request.require_name("rpc-url")?;
                let path = genesis::genesis_path(&self.data_dir, name);
                if !path.exists() {
                    return Err(ResourceError::not_found(NETWORK, name));
                }
                let genesis = Genesis::read(&path).await?;
                Ok(serde_json::json!({ "rpcUrl": genesis.rpc_url() }))
            }
            _ => Err(ResourceError::UnknownMethod {
                plugin: PLUGIN.to_string(),
                method: method.to_string(),
            }),
        }
    }
}
