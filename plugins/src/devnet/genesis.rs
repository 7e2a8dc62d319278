use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GENESIS_FILE: &str = "genesis.json";
pub const BASE_RPC_PORT: u16 = 8545;

/// On-disk description of one local network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub chain_id: u64,
    pub rpc_port: u16,
    pub block_time_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl Genesis {
    pub fn rpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.rpc_port)
    }

    pub async fn read(path: &Path) -> anyhow::Result<Self> {
        let s = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub async fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?)
            .await
            .with_context(|| format!("write {}", path.display()))
    }
}

pub fn networks_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("networks")
}

pub fn network_dir(data_dir: &Path, name: &str) -> PathBuf {
    networks_dir(data_dir).join(name)
}

pub fn genesis_path(data_dir: &Path, name: &str) -> PathBuf {
    network_dir(data_dir, name).join(GENESIS_FILE)
}

/// Ports already claimed by the networks under `data_dir`.
pub fn used_ports(data_dir: &Path) -> Vec<u16> {
    let Ok(entries) = std::fs::read_dir(networks_dir(data_dir)) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read_to_string(entry.path().join(GENESIS_FILE)).ok())
        .filter_map(|s| serde_json::from_str::<Genesis>(&s).ok())
        .map(|g| g.rpc_port)
        .collect()
}

/// Lowest free port at or above [`BASE_RPC_PORT`].
pub fn next_free_port(used: &[u16]) -> anyhow::Result<u16> {
    (BASE_RPC_PORT..=u16::MAX)
        .find(|port| !used.contains(port))
        .ok_or_else(|| anyhow::anyhow!("no free RPC port left"))
}
