use std::sync::Arc;

use arx_store::{Listing, StorageService};
use tracing::info;

use super::{load_aip, ModelService};
use crate::aip::{Aip, AipPermissions};
use crate::error::{ModelError, ModelResult};
use crate::notify::ModelEvent;
use crate::paths::{aip_container, aip_path};
use crate::validation::validate_aip_tree;

impl ModelService {
    /// Every AIP in the repository, parsed lazily from its envelope.
    pub fn list_aips(&self) -> ModelResult<Listing<ModelResult<Aip>>> {
        let storage: Arc<dyn StorageService> = Arc::clone(&self.storage);
        let listing = self.storage.list_resources_under_container(&aip_container()?, false)?;
        Ok(listing.map(move |item| match item {
            Ok(resource) if resource.is_directory() => load_aip(storage.as_ref(), resource.path().name()),
            Ok(resource) => Err(ModelError::RequestNotValid(format!(
                "unexpected {} in AIP container: {}",
                resource.kind_name(),
                resource.path()
            ))),
            Err(e) => Err(e.into()),
        }))
    }

    pub fn retrieve_aip(&self, aip_id: &str) -> ModelResult<Aip> {
        self.load_aip(aip_id)
    }

    /// Create an empty AIP under a fresh random id.
    pub fn create_aip(
        &self,
        parent_id: Option<&str>,
        active: bool,
        permissions: AipPermissions,
        notify: bool,
    ) -> ModelResult<Aip> {
        let dir = self.storage.create_random_directory(&aip_container()?)?;
        let aip = Aip::new(dir.path.name(), parent_id.map(Into::into), active, permissions);
        if let Err(e) = self.write_envelope(&aip) {
            self.undo(&dir.path);
            return Err(e);
        }
        info!(aip_id = %aip.id, "created AIP");
        self.publish(notify, ModelEvent::AipCreated(aip.clone()));
        Ok(aip)
    }

    /// Import a pre-built AIP tree from `source`.
    ///
    /// The tree is validated first and nothing is written unless the report
    /// is clean. Without `aip_id` a random id is used; an `aip_id` that is
    /// already taken fails with `AlreadyExists`.
    pub fn create_aip_from(
        &self,
        aip_id: Option<&str>,
        source: &dyn StorageService,
        source_path: &arx_store::StoragePath,
        notify: bool,
    ) -> ModelResult<Aip> {
        let report = validate_aip_tree(
            source,
            source_path,
            self.validator.as_ref(),
            self.config.fail_if_no_descriptive_metadata_schema,
        );
        if !report.is_valid() {
            return Err(report.into());
        }

        let id = aip_id.map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
        let target = aip_path(&id)?;
        self.locked(&id, || {
            self.storage.copy_from(source, source_path, &target)?;
            Ok(())
        })?;

        let aip = self.load_aip(&id)?;
        info!(aip_id = %aip.id, source = %source_path, "imported AIP");
        self.publish(notify, ModelEvent::AipCreated(aip.clone()));
        Ok(aip)
    }

    /// Persist `aip`'s envelope as given.
    pub fn update_aip(&self, aip: &Aip, notify: bool) -> ModelResult<Aip> {
        self.locked(&aip.id, || {
            self.require_aip(&aip.id)?;
            self.write_envelope(aip)
        })?;
        self.publish(notify, ModelEvent::AipUpdated(aip.clone()));
        Ok(aip.clone())
    }

    /// Replace an AIP's whole tree with one imported from `source`.
    ///
    /// The live AIP stays readable until the validated replacement is fully
    /// staged, and is put back if the swap fails.
    pub fn update_aip_from(
        &self,
        aip_id: &str,
        source: &dyn StorageService,
        source_path: &arx_store::StoragePath,
        notify: bool,
    ) -> ModelResult<Aip> {
        let report = validate_aip_tree(
            source,
            source_path,
            self.validator.as_ref(),
            self.config.fail_if_no_descriptive_metadata_schema,
        );
        if !report.is_valid() {
            return Err(report.into());
        }

        let live = aip_path(aip_id)?;
        let aip = self.locked(aip_id, || {
            self.require_aip(aip_id)?;
            let swap = self.swap_in(source, source_path, &live)?;
            match self.load_aip(aip_id) {
                Ok(aip) => {
                    self.commit_swap(swap);
                    Ok(aip)
                }
                Err(e) => {
                    self.abort_swap(swap);
                    Err(e)
                }
            }
        })?;
        info!(aip_id, source = %source_path, "replaced AIP");
        self.publish(notify, ModelEvent::AipUpdated(aip.clone()));
        Ok(aip)
    }

    /// Delete an AIP and everything in it.
    pub fn delete_aip(&self, aip_id: &str, notify: bool) -> ModelResult<()> {
        self.locked(aip_id, || Ok(self.storage.delete_resource(&aip_path(aip_id)?)?))?;
        info!(aip_id, "deleted AIP");
        self.publish(
            notify,
            ModelEvent::AipDeleted {
                aip_id: aip_id.to_string(),
            },
        );
        Ok(())
    }

    /// Publish a creation event for an AIP written behind the service's back.
    pub fn notify_aip_created(&self, aip_id: &str) -> ModelResult<()> {
        let aip = self.load_aip(aip_id)?;
        self.publish(true, ModelEvent::AipCreated(aip));
        Ok(())
    }

    pub fn notify_aip_updated(&self, aip_id: &str) -> ModelResult<()> {
        let aip = self.load_aip(aip_id)?;
        self.publish(true, ModelEvent::AipUpdated(aip));
        Ok(())
    }

    /// AIPs whose `parent_id` is `parent_id`, in listing order.
    pub fn list_child_aips(&self, parent_id: &str) -> ModelResult<Listing<ModelResult<Aip>>> {
        let parent = parent_id.to_string();
        Ok(self
            .list_aips()?
            .filter(move |item| !matches!(item, Ok(aip) if aip.parent_id.as_deref() != Some(parent.as_str()))))
    }
}
