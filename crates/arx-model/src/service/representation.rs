use arx_store::{StoragePath, StorageService};
use tracing::info;

use super::ModelService;
use crate::aip::Representation;
use crate::error::{ModelError, ModelResult};
use crate::notify::ModelEvent;
use crate::paths::{representation_data_path, representation_path};
use crate::validation::validate_representation_tree;

impl ModelService {
    pub fn retrieve_representation(&self, aip_id: &str, representation_id: &str) -> ModelResult<Representation> {
        self.load_aip(aip_id)?
            .representation(representation_id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(format!("representation {representation_id} of AIP {aip_id}")))
    }

    /// Declare an empty representation and create its `data` directory.
    pub fn create_representation(
        &self,
        aip_id: &str,
        representation_id: &str,
        original: bool,
        notify: bool,
    ) -> ModelResult<Representation> {
        let data = representation_data_path(aip_id, representation_id)?;
        let root = representation_path(aip_id, representation_id)?;
        let representation = self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            if aip.representation(representation_id).is_some() {
                return Err(ModelError::AlreadyExists(root.to_string()));
            }
            self.storage.create_directory(&data)?;
            let representation = Representation::new(representation_id, aip_id, original);
            aip.representations.push(representation.clone());
            if let Err(e) = self.write_envelope(&aip) {
                self.undo(&root);
                return Err(e);
            }
            Ok(representation)
        })?;
        info!(aip_id, representation_id, "created representation");
        self.publish(notify, ModelEvent::RepresentationCreated(representation.clone()));
        Ok(representation)
    }

    /// Import a representation tree from `source`.
    pub fn create_representation_from(
        &self,
        aip_id: &str,
        representation_id: &str,
        original: bool,
        source: &dyn StorageService,
        source_path: &StoragePath,
        notify: bool,
    ) -> ModelResult<Representation> {
        let report = validate_representation_tree(source, source_path);
        if !report.is_valid() {
            return Err(report.into());
        }
        let root = representation_path(aip_id, representation_id)?;
        let representation = self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            if aip.representation(representation_id).is_some() {
                return Err(ModelError::AlreadyExists(root.to_string()));
            }
            self.storage.copy_from(source, source_path, &root)?;
            let representation = Representation::new(representation_id, aip_id, original);
            aip.representations.push(representation.clone());
            if let Err(e) = self.write_envelope(&aip) {
                self.undo(&root);
                return Err(e);
            }
            Ok(representation)
        })?;
        info!(aip_id, representation_id, source = %source_path, "imported representation");
        self.publish(notify, ModelEvent::RepresentationCreated(representation.clone()));
        Ok(representation)
    }

    /// Replace a representation's tree with one imported from `source`.
    pub fn update_representation_from(
        &self,
        aip_id: &str,
        representation_id: &str,
        original: bool,
        source: &dyn StorageService,
        source_path: &StoragePath,
        notify: bool,
    ) -> ModelResult<Representation> {
        let report = validate_representation_tree(source, source_path);
        if !report.is_valid() {
            return Err(report.into());
        }
        let root = representation_path(aip_id, representation_id)?;
        let representation = self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            let Some(entry) = aip.representations.iter_mut().find(|r| r.id == representation_id) else {
                return Err(ModelError::NotFound(root.to_string()));
            };
            entry.original = original;
            let representation = entry.clone();
            let swap = self.swap_in(source, source_path, &root)?;
            if let Err(e) = self.write_envelope(&aip) {
                self.abort_swap(swap);
                return Err(e);
            }
            self.commit_swap(swap);
            Ok(representation)
        })?;
        info!(aip_id, representation_id, source = %source_path, "replaced representation");
        self.publish(notify, ModelEvent::RepresentationUpdated(representation.clone()));
        Ok(representation)
    }

    /// Delete a representation tree and drop it from the envelope.
    pub fn delete_representation(&self, aip_id: &str, representation_id: &str, notify: bool) -> ModelResult<()> {
        let root = representation_path(aip_id, representation_id)?;
        self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            self.storage.delete_resource(&root)?;
            aip.remove_representation(representation_id);
            self.write_envelope(&aip)
        })?;
        info!(aip_id, representation_id, "deleted representation");
        self.publish(
            notify,
            ModelEvent::RepresentationDeleted {
                aip_id: aip_id.to_string(),
                representation_id: representation_id.to_string(),
            },
        );
        Ok(())
    }
}
