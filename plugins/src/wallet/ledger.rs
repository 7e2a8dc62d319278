use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    selected: Option<String>,
    /// `wallet@network` -> balance
    #[serde(default)]
    balances: BTreeMap<String, u64>,
}

/// The selected wallet and simulated balances, written through to disk on
/// every change.
#[derive(Debug)]
pub struct WalletLedger {
    path: PathBuf,
    state: Mutex<LedgerFile>,
}

fn balance_key(wallet: &str, network: &str) -> String {
    format!("{wallet}@{network}")
}

impl WalletLedger {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let state = if path.exists() {
            let s = std::fs::read_to_string(path)
                .with_context(|| format!("read wallet ledger {}", path.display()))?;
            serde_json::from_str(&s)
                .with_context(|| format!("parse wallet ledger {}", path.display()))?
        } else {
            LedgerFile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn selected(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    pub fn select(&self, wallet: &str) -> anyhow::Result<()> {
        self.update(|state| state.selected = Some(wallet.to_string()))
    }

    /// Drop `wallet` from the ledger, deselecting it if needed.
    pub fn forget(&self, wallet: &str) -> anyhow::Result<()> {
        let prefix = format!("{wallet}@");
        self.update(|state| {
            if state.selected.as_deref() == Some(wallet) {
                state.selected = None;
            }
            state.balances.retain(|key, _| !key.starts_with(&prefix));
        })
    }

    /// Add `amount` and return the new balance.
    pub fn credit(&self, wallet: &str, network: &str, amount: u64) -> anyhow::Result<u64> {
        let key = balance_key(wallet, network);
        let mut balance = 0;
        self.update(|state| {
            let entry = state.balances.entry(key).or_insert(0);
            *entry = entry.saturating_add(amount);
            balance = *entry;
        })?;
        Ok(balance)
    }

    pub fn balance(&self, wallet: &str, network: &str) -> u64 {
        self.lock()
            .balances
            .get(&balance_key(wallet, network))
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        self.update(|state| *state = LedgerFile::default())
    }

    fn update(&self, f: impl FnOnce(&mut LedgerFile)) -> anyhow::Result<()> {
        let snapshot = {
            let mut state = self.lock();
            f(&mut state);
            state.clone()
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("write wallet ledger {}", self.path.display()))
    }

    fn lock(&self) -> MutexGuard<'_, LedgerFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
