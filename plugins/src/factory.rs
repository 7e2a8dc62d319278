use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use chainkit_core::api::{AppConfig, Plugin};

use crate::devnet::{self, DevnetPlugin};
use crate::wallet::{self, WalletPlugin};

/// Every built-in plugin enabled in `cfg`, in the configured order. Unknown
/// names are skipped with a warning.
pub fn build_plugins(cfg: &AppConfig, data_dir: &Path) -> Result<Vec<Arc<dyn Plugin>>> {
    let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
    for name in &cfg.plugins.enabled {
        match name.as_str() {
            devnet::PLUGIN => plugins.push(Arc::new(DevnetPlugin::new(data_dir.join("devnet")))),
            wallet::PLUGIN => plugins.push(Arc::new(WalletPlugin::new(data_dir.join("wallet"))?)),
            other => tracing::warn!(plugin = %other, "unknown plugin in config, skipping"),
        }
    }
    Ok(plugins)
}
