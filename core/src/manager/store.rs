//! Resource records kept between processes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::{BaseResource, ResourceKey};

#[derive(Debug, Default)]
struct Records {
    resources: BTreeMap<ResourceKey, BaseResource>,
    /// resource -> resources it depends on
    depends_on: BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    resources: Vec<BaseResource>,
    #[serde(default)]
    dependencies: Vec<DependencyRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyRecord {
    resource: ResourceKey,
    depends_on: Vec<ResourceKey>,
}

/// JSON file of every known resource and the dependencies between them.
/// Adapters are not stored; they are rebuilt from the records with
/// `MasterResourceAdapter::init_resource_adapter`.
#[derive(Debug)]
pub struct ResourceStore {
    path: Option<PathBuf>,
    records: Mutex<Records>,
}

impl ResourceStore {
    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(Records::default()),
        }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut records = Records::default();
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .with_context(|| format!("read resource store {}", path.display()))?;
            if !s.trim().is_empty() {
                let file: StoreFile = serde_json::from_str(&s)
                    .with_context(|| format!("parse resource store {}", path.display()))?;
                records.resources = file
                    .resources
                    .into_iter()
                    .map(|r| (r.key(), r))
                    .collect();
                records.depends_on = file
                    .dependencies
                    .into_iter()
                    .map(|d| (d.resource, d.depends_on.into_iter().collect()))
                    .collect();
            }
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            records: Mutex::new(records),
        })
    }

    pub fn resources(&self) -> Vec<BaseResource> {
        self.lock().resources.values().cloned().collect()
    }

    pub fn upsert(&self, resource: &BaseResource) {
        {
            let mut records = self.lock();
            if records.resources.get(&resource.key()) == Some(resource) {
                return;
            }
            records.resources.insert(resource.key(), resource.clone());
        }
        self.flush();
    }

    /// Forget a resource together with the dependencies it declared.
    pub fn remove(&self, key: &ResourceKey) {
        {
            let mut records = self.lock();
            records.resources.remove(key);
            records.depends_on.remove(key);
        }
        self.flush();
    }

    pub fn add_dependencies(&self, resource: &ResourceKey, depends_on: &[ResourceKey]) {
        if depends_on.is_empty() {
            return;
        }
        self.lock()
            .depends_on
            .entry(resource.clone())
            .or_default()
            .extend(depends_on.iter().cloned());
        self.flush();
    }

    /// Resources that declared a dependency on `key`.
    pub fn dependents_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        self.lock()
            .depends_on
            .iter()
            .filter(|(_, deps)| deps.contains(key))
            .map(|(dependent, _)| dependent.clone())
            .collect()
    }

    pub fn clear(&self) {
        {
            let mut records = self.lock();
            records.resources.clear();
            records.depends_on.clear();
        }
        self.flush();
    }

    fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let file = {
            let records = self.lock();
            StoreFile {
                saved_at: Utc::now(),
                resources: records.resources.values().cloned().collect(),
                dependencies: records
                    .depends_on
                    .iter()
                    .map(|(resource, deps)| DependencyRecord {
                        resource: resource.clone(),
                        depends_on: deps.iter().cloned().collect(),
                    })
                    .collect(),
            }
        };
        if let Err(e) = write_file(path, &file) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist resources");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_file(path: &Path, file: &StoreFile) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(file)?)?;
    Ok(())
}
