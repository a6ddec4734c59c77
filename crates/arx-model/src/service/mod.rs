//! The model service: archival entities mapped onto versioned storage.
//!
//! # Design Rules
//!
//! - Every artifact lives at the path [`crate::paths`] derives from its
//!   scope; nothing is looked up by scanning.
//! - The AIP envelope (`aip.json`) is the index of descriptive metadata and
//!   representations. Every read-modify-write of it runs under the AIP's
//!   lock, and a failed envelope write undoes the binary write before it.
//! - Writes scoped to an AIP or representation require that scope to exist.
//! - Listings under an existing scope with nothing in it are empty; listings
//!   under a missing scope fail with `NotFound`.
//! - Replacing a whole tree from a source goes through a staging area and
//!   a rename swap, so the live tree is never missing.
//! - Notifications are published after the storage change succeeded, and
//!   only when the caller asked for them.

mod aip;
mod descriptive;
mod files;
mod jobs;
mod log;
mod other;
mod preservation;
mod representation;
mod users;

use std::sync::Arc;

use arx_store::{
    ContentPayload, Listing, Resource, ResourceListing, StorageError, StoragePath, StorageResult, StorageService,
};
use tracing::{debug, error, info, warn};

use crate::action_log::ActionLog;
use crate::aip::Aip;
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::identity::UserDirectory;
use crate::locks::AipLocks;
use crate::notify::{ModelEvent, ModelObserver, NotificationBus};
use crate::paths::{self, aip_metadata_path, aip_path, representation_path};
use crate::validation::{DescriptiveMetadataValidator, SchemaRegistry};

/// What [`ModelService::ensure_topology`] found and did.
#[derive(Debug, Default)]
pub struct TopologyReport {
    pub created: Vec<StoragePath>,
    pub existing: Vec<StoragePath>,
    pub failed: Vec<(StoragePath, StorageError)>,
}

impl TopologyReport {
    /// `true` if every required container and directory is in place.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: StoragePath, outcome: StorageResult<()>) {
        match outcome {
            Ok(()) => {
                info!(path = %path, "created");
                self.created.push(path);
            }
            Err(StorageError::AlreadyExists(_)) => self.existing.push(path),
            Err(e) => {
                error!(path = %path, error = %e, "could not create");
                self.failed.push((path, e));
            }
        }
    }
}

/// Archival operations over a [`StorageService`].
pub struct ModelService {
    storage: Arc<dyn StorageService>,
    bus: NotificationBus,
    users: Option<Arc<dyn UserDirectory>>,
    validator: Arc<dyn DescriptiveMetadataValidator>,
    config: ModelConfig,
    locks: AipLocks,
    action_log: Option<ActionLog>,
}

impl ModelService {
    /// Construction performs no I/O; call [`ensure_topology`] once at
    /// startup.
    ///
    /// [`ensure_topology`]: ModelService::ensure_topology
    pub fn new(storage: Arc<dyn StorageService>, config: ModelConfig) -> Self {
        let action_log = config
            .log_directory
            .as_ref()
            .map(|dir| ActionLog::new(dir.clone(), Arc::clone(&storage)));
        Self {
            storage,
            bus: NotificationBus::new(),
            users: None,
            validator: Arc::new(SchemaRegistry::new()),
            config,
            locks: AipLocks::new(),
            action_log,
        }
    }

    pub fn with_user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DescriptiveMetadataValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Append through `action_log`. Services writing to one log directory
    /// should share clones of a single [`ActionLog`].
    pub fn with_action_log(mut self, action_log: ActionLog) -> Self {
        self.action_log = Some(action_log);
        self
    }

    pub fn action_log(&self) -> Option<&ActionLog> {
        self.action_log.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Shorthand for `bus().subscribe(..)`.
    pub fn subscribe(&self, name: &str, observer: Arc<dyn ModelObserver>) {
        self.bus.subscribe(name, observer);
    }

    /// Create every container and fixed directory the model relies on.
    ///
    /// Existing ones are left alone. Failures are logged and reported, not
    /// raised, so a partially available backend still starts.
    pub fn ensure_topology(&self) -> TopologyReport {
        let mut report = TopologyReport::default();
        let containers = paths::CONTAINERS
            .iter()
            .copied()
            .chain(std::iter::once(self.config.staging_container.as_str()));
        for name in containers {
            match StoragePath::container(name) {
                Ok(path) => {
                    let outcome = self.storage.create_container(&path).map(drop);
                    report.record(path, outcome);
                }
                Err(e) => error!(container = name, error = %e, "invalid container name"),
            }
        }
        match paths::agents_path() {
            Ok(path) => {
                let outcome = self.storage.create_directory(&path).map(drop);
                report.record(path, outcome);
            }
            Err(e) => error!(error = %e, "invalid agents path"),
        }
        report
    }

    // -- Internals ----------------------------------------------------------

    fn publish(&self, notify: bool, event: ModelEvent) {
        if notify {
            self.bus.publish(&event);
        }
    }

    /// Run `f` holding the lock of `aip_id`.
    fn locked<R>(&self, aip_id: &str, f: impl FnOnce() -> ModelResult<R>) -> ModelResult<R> {
        self.locks.with_lock(aip_id, f)
    }

    fn load_aip(&self, aip_id: &str) -> ModelResult<Aip> {
        load_aip(self.storage.as_ref(), aip_id)
    }

    /// Persist the envelope of `aip`, creating it if missing.
    fn write_envelope(&self, aip: &Aip) -> ModelResult<()> {
        let bytes = aip
            .to_envelope()
            .map_err(|e| ModelError::wrap(format!("serializing AIP {}", aip.id), e))?;
        self.storage
            .update_binary_content(&aip_metadata_path(&aip.id)?, &ContentPayload::from(bytes), false, true)?;
        Ok(())
    }

    fn require_aip(&self, aip_id: &str) -> ModelResult<()> {
        self.storage.get_directory(&aip_path(aip_id)?)?;
        Ok(())
    }

    fn require_representation(&self, aip_id: &str, representation_id: &str) -> ModelResult<()> {
        self.storage.get_directory(&representation_path(aip_id, representation_id)?)?;
        Ok(())
    }

    /// Require the AIP and, if given, the representation.
    fn require_scope(&self, aip_id: Option<&str>, representation_id: Option<&str>) -> ModelResult<()> {
        match (aip_id, representation_id) {
            (Some(aip), Some(rep)) => self.require_representation(aip, rep),
            (Some(aip), None) => self.require_aip(aip),
            (None, _) => Ok(()),
        }
    }

    /// Best-effort removal after a failed multi-step write.
    fn undo(&self, path: &StoragePath) {
        if let Err(e) = self.storage.delete_resource(path) {
            warn!(path = %path, error = %e, "could not undo partial write");
        }
    }

    /// Put the binary at `path` back to `version_id` and drop that version.
    ///
    /// Used when a write that followed the snapshot could not be completed.
    /// If the revert itself fails the snapshot is kept so the content stays
    /// recoverable.
    fn restore_version(&self, path: &StoragePath, version_id: &str) {
        match self.storage.revert_binary_version(path, version_id) {
            Ok(_) => self.discard_version(path, version_id),
            Err(e) => error!(path = %path, version_id, error = %e, "could not restore content after failed write"),
        }
    }

    fn discard_version(&self, path: &StoragePath, version_id: &str) {
        if let Err(e) = self.storage.delete_binary_version(path, version_id) {
            warn!(path = %path, version_id, error = %e, "could not drop snapshot");
        }
    }

    /// Replace the tree at `live` with a copy of `source_path` from
    /// `source`.
    ///
    /// The copy lands in the staging container first. Only once it is
    /// complete is the live tree renamed aside and the staged one renamed
    /// into place; a failed swap puts the old tree back. The old tree stays
    /// aside until the returned [`Swap`] is committed or aborted.
    fn swap_in(&self, source: &dyn StorageService, source_path: &StoragePath, live: &StoragePath) -> ModelResult<Swap> {
        let staging = StoragePath::container(&self.config.staging_container)?;
        match self.storage.create_container(&staging) {
            Ok(_) | Err(StorageError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let staged = staging.child(&uuid::Uuid::new_v4().to_string())?;
        let aside = staging.child(&uuid::Uuid::new_v4().to_string())?;

        self.storage.copy_from(source, source_path, &staged)?;
        debug!(staged = %staged, live = %live, "staged replacement tree");

        if let Err(e) = self.storage.rename(live, &aside) {
            self.undo(&staged);
            return Err(e.into());
        }
        if let Err(e) = self.storage.rename(&staged, live) {
            if let Err(restore) = self.storage.rename(&aside, live) {
                error!(live = %live, aside = %aside, error = %restore, "could not restore previous tree");
            }
            self.undo(&staged);
            return Err(e.into());
        }
        Ok(Swap {
            live: live.clone(),
            aside,
        })
    }

    /// Drop the replaced tree.
    fn commit_swap(&self, swap: Swap) {
        if let Err(e) = self.storage.delete_resource(&swap.aside) {
            warn!(path = %swap.aside, error = %e, "could not remove replaced tree");
        }
    }

    /// Remove the new tree and move the replaced one back into place.
    fn abort_swap(&self, swap: Swap) {
        self.undo(&swap.live);
        match self.storage.rename(&swap.aside, &swap.live) {
            Ok(()) => debug!(live = %swap.live, "restored previous tree"),
            Err(e) => error!(live = %swap.live, aside = %swap.aside, error = %e, "could not restore previous tree"),
        }
    }
}

/// A completed tree swap whose previous tree is still kept aside.
#[must_use]
struct Swap {
    live: StoragePath,
    aside: StoragePath,
}

impl std::fmt::Debug for ModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("users", &self.users.is_some())
            .field("action_log", &self.action_log)
            .finish()
    }
}

/// Read and parse the envelope of `aip_id`.
pub(crate) fn load_aip(storage: &dyn StorageService, aip_id: &str) -> ModelResult<Aip> {
    let binary = storage.get_binary(&aip_metadata_path(aip_id)?)?;
    let bytes = binary
        .content
        .read_all()
        .map_err(|e| ModelError::wrap(format!("reading envelope of AIP {aip_id}"), e))?;
    Aip::from_envelope(aip_id, &bytes).map_err(|e| ModelError::wrap(format!("parsing envelope of AIP {aip_id}"), e))
}

/// List `dir`, or return an empty listing if `dir` is absent but `scope`
/// exists.
///
/// The listing is attempted first; existence of `scope` is only checked
/// when it fails with `NotFound`.
pub(crate) fn list_or_empty(
    storage: &dyn StorageService,
    dir: &StoragePath,
    scope: &StoragePath,
    recursive: bool,
) -> ModelResult<ResourceListing> {
    let listed = if dir.is_container() {
        storage.list_resources_under_container(dir, recursive)
    } else {
        storage.list_resources_under_directory(dir, recursive)
    };
    match listed {
        Ok(listing) => Ok(listing),
        Err(StorageError::NotFound(_)) => {
            storage.get_resource(scope)?;
            Ok(Listing::empty())
        }
        Err(e) => Err(e.into()),
    }
}

/// Keep binaries (and errors), dropping directories.
pub(crate) fn binaries_only(listing: ResourceListing) -> ResourceListing {
    listing.filter(|item| !matches!(item, Ok(resource) if resource.is_directory()))
}

/// A listing yielding a single error.
pub(crate) fn failed<T: Send + 'static>(e: ModelError) -> Listing<ModelResult<T>> {
    Listing::new(std::iter::once(Err(e)))
}

/// Map a resource listing through `parse`.
pub(crate) fn parse_listing<T, F>(listing: ResourceListing, parse: F) -> Listing<ModelResult<T>>
where
    T: Send + 'static,
    F: Fn(&Resource) -> ModelResult<T> + Send + 'static,
{
    listing.map(move |item| item.map_err(ModelError::from).and_then(|resource| parse(&resource)))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use arx_store::{
        Binary, BinaryVersion, Container, ContainerListing, ContentPayload, Directory, InMemoryStorage, Resource,
        ResourceListing, StorageError, StoragePath, StorageResult, StorageService, VersionListing,
    };

    use super::ModelService;
    use crate::aip::Aip;
    use crate::config::ModelConfig;
    use crate::notify::EventRecorder;

    pub struct Fixture {
        pub storage: Arc<InMemoryStorage>,
        pub service: ModelService,
        pub events: Arc<EventRecorder>,
    }

    pub fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let service = ModelService::new(storage.clone(), ModelConfig::default());
        assert!(service.ensure_topology().is_complete());
        let events = EventRecorder::new();
        service.subscribe("recorder", events.clone());
        Fixture {
            storage,
            service,
            events,
        }
    }

    /// An AIP tree ready for import, in its own `src` container.
    pub fn source_tree(source: &dyn StorageService, name: &str) -> StoragePath {
        let container = StoragePath::container("src").unwrap();
        let _ = source.create_container(&container);
        let dir = container.child(name).unwrap();
        let mut aip = Aip::new(name, None, true, Default::default());
        aip.upsert_descriptive_metadata("dc.json", "dc");
        source
            .create_binary(
                &dir.join(&["metadata", "descriptive", "dc.json"]).unwrap(),
                &r#"{"title":"imported"}"#.into(),
                false,
            )
            .unwrap();
        source
            .create_binary(&dir.child("aip.json").unwrap(), &aip.to_envelope().unwrap().into(), false)
            .unwrap();
        dir
    }

    /// In-memory storage whose envelope writes fail once `arm` is called.
    #[derive(Default)]
    pub struct EnvelopeFailingStorage {
        pub inner: InMemoryStorage,
        armed: AtomicBool,
    }

    impl EnvelopeFailingStorage {
        pub fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl StorageService for EnvelopeFailingStorage {
        fn create_container(&self, path: &StoragePath) -> StorageResult<Container> {
            self.inner.create_container(path)
        }

        fn get_container(&self, path: &StoragePath) -> StorageResult<Container> {
            self.inner.get_container(path)
        }

        fn delete_container(&self, path: &StoragePath) -> StorageResult<()> {
            self.inner.delete_container(path)
        }

        fn list_containers(&self) -> StorageResult<ContainerListing> {
            self.inner.list_containers()
        }

        fn list_resources_under_container(&self, path: &StoragePath, recursive: bool) -> StorageResult<ResourceListing> {
            self.inner.list_resources_under_container(path, recursive)
        }

        fn create_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
            self.inner.create_directory(path)
        }

        fn get_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
            self.inner.get_directory(path)
        }

        fn list_resources_under_directory(&self, path: &StoragePath, recursive: bool) -> StorageResult<ResourceListing> {
            self.inner.list_resources_under_directory(path, recursive)
        }

        fn create_binary(&self, path: &StoragePath, payload: &ContentPayload, as_reference: bool) -> StorageResult<Binary> {
            self.inner.create_binary(path, payload, as_reference)
        }

        fn get_binary(&self, path: &StoragePath) -> StorageResult<Binary> {
            self.inner.get_binary(path)
        }

        fn update_binary_content(
            &self,
            path: &StoragePath,
            payload: &ContentPayload,
            as_reference: bool,
            create_if_not_exists: bool,
        ) -> StorageResult<Binary> {
            if self.armed.load(Ordering::SeqCst) && path.name() == "aip.json" {
                return Err(StorageError::generic(format!("write to {path} refused")));
            }
            self.inner.update_binary_content(path, payload, as_reference, create_if_not_exists)
        }

        fn delete_resource(&self, path: &StoragePath) -> StorageResult<()> {
            self.inner.delete_resource(path)
        }

        fn get_resource(&self, path: &StoragePath) -> StorageResult<Resource> {
            self.inner.get_resource(path)
        }

        fn rename(&self, source: &StoragePath, target: &StoragePath) -> StorageResult<()> {
            self.inner.rename(source, target)
        }

        fn create_binary_version(&self, path: &StoragePath, message: Option<&str>) -> StorageResult<BinaryVersion> {
            self.inner.create_binary_version(path, message)
        }

        fn list_binary_versions(&self, path: &StoragePath) -> StorageResult<VersionListing> {
            self.inner.list_binary_versions(path)
        }

        fn get_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<BinaryVersion> {
            self.inner.get_binary_version(path, version_id)
        }

        fn revert_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<Binary> {
            self.inner.revert_binary_version(path, version_id)
        }

        fn delete_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<()> {
            self.inner.delete_binary_version(path, version_id)
        }
    }

    /// A service over [`EnvelopeFailingStorage`], with topology in place.
    pub fn failing_fixture() -> (Arc<EnvelopeFailingStorage>, ModelService, Arc<EventRecorder>) {
        let storage = Arc::new(EnvelopeFailingStorage::default());
        let service = ModelService::new(storage.clone(), ModelConfig::default());
        assert!(service.ensure_topology().is_complete());
        let events = EventRecorder::new();
        service.subscribe("recorder", events.clone());
        (storage, service, events)
    }

    impl Fixture {
        pub fn aip(&self) -> Aip {
            self.service.create_aip(None, true, Default::default(), false).unwrap()
        }

        pub fn path(&self, s: &str) -> StoragePath {
            StoragePath::parse(s).unwrap()
        }
    }
}
