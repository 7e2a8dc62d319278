use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default chainkit data directory: ~/.chainkit
pub fn get_chainkit_data_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".chainkit"))
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let home = get_chainkit_data_dir()?;
    let mut cfg = load_from(&home.join("config.toml"), Path::new("chainkit.toml"))?;
    apply_env_overrides(&mut cfg);

    let data_dir = match cfg.data_dir() {
        Some(dir) => dir,
        None => {
            cfg.data_dir = Some(home.to_string_lossy().to_string());
            home
        }
    };

    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    Ok(cfg)
}

/// `user` wins over `local`; neither existing yields the defaults.
pub fn load_from(user: &Path, local: &Path) -> anyhow::Result<AppConfig> {
    let path = if user.exists() {
        user
    } else if local.exists() {
        local
    } else {
        return Ok(AppConfig::default());
    };

    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("CHAINKIT_HOME") {
        if !v.trim().is_empty() {
            cfg.data_dir = Some(v);
        }
    }

    if let Ok(v) = std::env::var("CHAINKIT_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }

    if let Ok(v) = std::env::var("CHAINKIT_PLUGINS") {
        let enabled = v
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if !enabled.is_empty() {
            cfg.plugins.enabled = enabled;
        }
    }
}
