use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::anyhow;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cancel::CancelSignal;
use crate::crud::CrudVerb;
use crate::error::ResourceError;
use crate::plugin::CreateHook;
use crate::resource::{BaseResource, ResourceAdapter, ResourceContext, ResourceType};
use crate::task::{Task, TaskContext, TaskList, TaskStream, TaskUpdate};

use super::api::{ResourceRequest, ResourceStream};
use super::store::ResourceStore;

struct Registered {
    adapter: Arc<dyn ResourceAdapter>,
    forwarder: JoinHandle<()>,
}

/// Owns the live adapters of one resource kind.
///
/// Every registered adapter gets a forwarding task that mirrors its state
/// changes into the store and the kind's list broadcast.
pub struct ResourceManager {
    resource_type: Arc<ResourceType>,
    create_hooks: Arc<Vec<Arc<dyn CreateHook>>>,
    store: Arc<ResourceStore>,
    adapters: Mutex<BTreeMap<String, Registered>>,
    list_tx: watch::Sender<Vec<BaseResource>>,
}

impl ResourceManager {
    pub fn new(
        resource_type: Arc<ResourceType>,
        create_hooks: Arc<Vec<Arc<dyn CreateHook>>>,
        store: Arc<ResourceStore>,
    ) -> Arc<Self> {
        let (list_tx, _) = watch::channel(Vec::new());
        Arc::new(Self {
            resource_type,
            create_hooks,
            store,
            adapters: Mutex::new(BTreeMap::new()),
            list_tx,
        })
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.resource_type
    }

    /// Current resources, ordered by name.
    pub fn resources(&self) -> Vec<BaseResource> {
        self.lock()
            .values()
            .map(|registered| registered.adapter.resource())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<BaseResource> {
        self.lock().get(name).map(|r| r.adapter.resource())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn adapter(&self, name: &str) -> Result<Arc<dyn ResourceAdapter>, ResourceError> {
        self.lock()
            .get(name)
            .map(|r| Arc::clone(&r.adapter))
            .ok_or_else(|| ResourceError::not_found(self.resource_type.kind(), name))
    }

    /// Current list first, then one item per change until `cancel` fires.
    pub fn list(&self, cancel: CancelSignal) -> ResourceStream {
        let mut rx = self.list_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let resources = rx.borrow_and_update().clone();
                yield resources;
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    /// Rebuild the adapter of a resource that existed before this process.
    pub async fn adopt(self: &Arc<Self>, resource: BaseResource) -> Result<(), ResourceError> {
        if self.contains(&resource.name) {
            return Err(self.already_exists(&resource.name));
        }
        let adapter = self
            .resource_type
            .master()
            .init_resource_adapter(resource)
            .await?;
        self.register(adapter)?;
        Ok(())
    }

    /// Start tracking `adapter`.
    pub fn register(
        self: &Arc<Self>,
        adapter: Arc<dyn ResourceAdapter>,
    ) -> Result<BaseResource, ResourceError> {
        let resource = adapter.resource();
        {
            let mut adapters = self.lock();
            if adapters.contains_key(&resource.name) {
                return Err(self.already_exists(&resource.name));
            }
            let forwarder = self.spawn_forwarder(adapter.watch());
            adapters.insert(
                resource.name.clone(),
                Registered { adapter, forwarder },
            );
        }

        self.store.upsert(&resource);
        self.publish();
        tracing::debug!(resource = %resource.key(), "resource registered");
        Ok(resource)
    }

    fn spawn_forwarder(self: &Arc<Self>, mut rx: watch::Receiver<BaseResource>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let resource = rx.borrow_and_update().clone();
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.store.upsert(&resource);
                manager.publish();
            }
        })
    }

    fn unregister(&self, name: &str) -> Option<Arc<dyn ResourceAdapter>> {
        let registered = self.lock().remove(name)?;
        registered.forwarder.abort();
        let key = registered.adapter.resource().key();
        self.store.remove(&key);
        self.publish();
        tracing::debug!(resource = %key, "resource unregistered");
        Some(registered.adapter)
    }

    /// Write the adapter's current view through to the store and listeners.
    fn sync(&self, name: &str) {
        if let Some(resource) = self.get(name) {
            self.store.upsert(&resource);
        }
        self.publish();
    }

    fn publish(&self) {
        self.list_tx.send_replace(self.resources());
    }

    pub async fn create(
        self: &Arc<Self>,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        let create = request.to_create_request()?;
        if self.contains(&create.name) {
            return Err(self.already_exists(&create.name));
        }

        let build = self.resource_type.master().create(&create)?;
        let command = self.resource_type.crud_command(CrudVerb::Create);
        let manager = Arc::clone(self);
        let base = TaskList::builder()
            .task(Task::subtasks(command.progress_title(&create.name), move |_| {
                Ok(build.clone())
            }))
            .task(Task::fire(
                format!("Registering {} {}", self.resource_type.kind(), create.name),
                move |ctx| manager.register_created(ctx),
            ))
            .build();

        let list = self
            .create_hooks
            .iter()
            .filter(|hook| hook.applies_to(&create))
            .fold(base, |list, hook| {
                tracing::debug!(hook = hook.name(), kind = %create.kind, "applying create hook");
                hook.augment(&create, list)
            });

        let ctx = ResourceContext {
            request: create,
            ..Default::default()
        };
        Ok(relay(list, ctx, request.cancel))
    }

    fn register_created(self: &Arc<Self>, ctx: &TaskContext<ResourceContext>) -> anyhow::Result<()> {
        let (adapter, dependencies) = ctx.read(|c| (c.adapter.clone(), c.dependencies.clone()));
        let adapter = adapter.ok_or_else(|| {
            anyhow!(
                "creating the {} did not produce a resource",
                self.resource_type.kind()
            )
        })?;
        let resource = self.register(adapter)?;
        self.store.add_dependencies(&resource.key(), &dependencies);
        ctx.update(|c| c.resource = Some(resource));
        Ok(())
    }

    pub async fn delete(
        self: &Arc<Self>,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        let name = request.require_name("delete")?.to_string();
        let adapter = self.adapter(&name)?;

        let dependents = self.store.dependents_of(&adapter.resource().key());
        if !dependents.is_empty() {
            return Err(ResourceError::HasDependents {
                kind: self.resource_type.kind().to_string(),
                name,
                dependents: dependents
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let teardown = adapter.delete();
        let command = self.resource_type.crud_command(CrudVerb::Delete);
        let manager = Arc::clone(self);
        let removed = name.clone();
        let list = TaskList::builder()
            .task(Task::subtasks(command.progress_title(&name), move |_| {
                Ok(teardown.clone())
            }))
            .task(Task::future(
                format!("Removing {} {name}", self.resource_type.kind()),
                move |_| {
                    let manager = Arc::clone(&manager);
                    let name = removed.clone();
                    async move {
                        if let Some(adapter) = manager.unregister(&name) {
                            adapter.destroy().await?;
                        }
                        Ok(())
                    }
                },
            ))
            .build();

        Ok(relay(list, self.seed(&request)?, request.cancel))
    }

    pub async fn start(
        self: &Arc<Self>,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        self.transition(CrudVerb::Start, request)
    }

    pub async fn stop(
        self: &Arc<Self>,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        self.transition(CrudVerb::Stop, request)
    }

    fn transition(
        self: &Arc<Self>,
        verb: CrudVerb,
        request: ResourceRequest,
    ) -> Result<TaskStream, ResourceError> {
        let name = request.require_name(verb.as_str())?.to_string();
        let adapter = self.adapter(&name)?;
        let inner = match verb {
            CrudVerb::Start => adapter.start(),
            _ => adapter.stop(),
        };

        let command = self.resource_type.crud_command(verb);
        let manager = Arc::clone(self);
        let synced = name.clone();
        let list = TaskList::builder()
            .task(Task::subtasks(command.progress_title(&name), move |_| {
                Ok(inner.clone())
            }))
            .on_done(move |_| manager.sync(&synced))
            .build();

        Ok(relay(list, self.seed(&request)?, request.cancel))
    }

    /// Destroy every adapter. Records stay in the store for the next process.
    pub async fn shutdown(&self) {
        let registered = std::mem::take(&mut *self.lock());
        for (name, registered) in registered {
            registered.forwarder.abort();
            if let Err(e) = registered.adapter.destroy().await {
                tracing::warn!(
                    kind = %self.resource_type.kind(),
                    name = %name,
                    error = %e,
                    "failed to destroy adapter"
                );
            }
        }
        self.list_tx.send_replace(Vec::new());
    }

    /// Destroy every adapter and forget every record of this kind.
    pub async fn reset(&self) {
        let keys = self
            .resources()
            .iter()
            .map(BaseResource::key)
            .collect::<Vec<_>>();
        self.shutdown().await;
        for key in keys {
            self.store.remove(&key);
        }
    }

    fn seed(&self, request: &ResourceRequest) -> Result<ResourceContext, ResourceError> {
        Ok(ResourceContext {
            request: request.to_create_request()?,
            resource: request.name.as_deref().and_then(|name| self.get(name)),
            ..Default::default()
        })
    }

    fn already_exists(&self, name: &str) -> ResourceError {
        ResourceError::AlreadyExists {
            kind: self.resource_type.kind().to_string(),
            name: name.to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Registered>> {
        self.adapters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start `list` with `ctx` and relay its progress, along with the notes its
/// tasks left in the context. Firing `cancel` aborts the list (and the lists
/// nested in it).
pub(crate) fn relay(
    list: TaskList<ResourceContext>,
    ctx: ResourceContext,
    cancel: CancelSignal,
) -> TaskStream {
    let ctx = TaskContext::new(ctx);
    let notes = ctx.clone();
    let stream = list
        .subscribe_with(ctx, None)
        .map(move |tasks| TaskUpdate {
            tasks,
            notes: notes.read(|c| c.notes.clone()),
        })
        .boxed();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => list.abort(),
            _ = list.wait() => {}
        }
    });
    stream
}
