use arx_store::{Binary, BinaryVersion, ContentPayload, VersionListing};
use tracing::{info, warn};

use super::ModelService;
use crate::aip::DescriptiveMetadata;
use crate::error::{ModelError, ModelResult};
use crate::notify::ModelEvent;
use crate::paths::descriptive_metadata_path;

impl ModelService {
    /// The envelope entry of a descriptive metadata document.
    pub fn retrieve_descriptive_metadata(&self, aip_id: &str, descriptive_metadata_id: &str) -> ModelResult<DescriptiveMetadata> {
        self.load_aip(aip_id)?
            .descriptive_metadata(descriptive_metadata_id)
            .cloned()
            .ok_or_else(|| {
                ModelError::NotFound(format!("descriptive metadata {descriptive_metadata_id} of AIP {aip_id}"))
            })
    }

    pub fn retrieve_descriptive_metadata_binary(&self, aip_id: &str, descriptive_metadata_id: &str) -> ModelResult<Binary> {
        Ok(self
            .storage
            .get_binary(&descriptive_metadata_path(aip_id, descriptive_metadata_id)?)?)
    }

    /// Store a new descriptive metadata document and list it in the
    /// envelope.
    pub fn create_descriptive_metadata(
        &self,
        aip_id: &str,
        descriptive_metadata_id: &str,
        payload: &ContentPayload,
        metadata_type: &str,
        notify: bool,
    ) -> ModelResult<DescriptiveMetadata> {
        let path = descriptive_metadata_path(aip_id, descriptive_metadata_id)?;
        let entry = self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            self.storage.create_binary(&path, payload, false)?;
            let entry = aip.upsert_descriptive_metadata(descriptive_metadata_id, metadata_type);
            if let Err(e) = self.write_envelope(&aip) {
                self.undo(&path);
                return Err(e);
            }
            Ok(entry)
        })?;
        info!(aip_id, descriptive_metadata_id, metadata_type, "created descriptive metadata");
        self.publish(notify, ModelEvent::DescriptiveMetadataCreated(entry.clone()));
        Ok(entry)
    }

    /// Replace a descriptive metadata document, keeping the previous content
    /// as a version labelled `message`.
    pub fn update_descriptive_metadata(
        &self,
        aip_id: &str,
        descriptive_metadata_id: &str,
        payload: &ContentPayload,
        metadata_type: &str,
        message: Option<&str>,
        notify: bool,
    ) -> ModelResult<DescriptiveMetadata> {
        let path = descriptive_metadata_path(aip_id, descriptive_metadata_id)?;
        let entry = self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            let snapshot = self.storage.create_binary_version(&path, message)?;
            if let Err(e) = self.storage.update_binary_content(&path, payload, false, false) {
                self.discard_version(&path, &snapshot.id);
                return Err(e.into());
            }
            let entry = aip.upsert_descriptive_metadata(descriptive_metadata_id, metadata_type);
            if let Err(e) = self.write_envelope(&aip) {
                self.restore_version(&path, &snapshot.id);
                return Err(e);
            }
            Ok(entry)
        })?;
        info!(aip_id, descriptive_metadata_id, "updated descriptive metadata");
        self.publish(notify, ModelEvent::DescriptiveMetadataUpdated(entry.clone()));
        Ok(entry)
    }

    /// Delete a descriptive metadata document and drop it from the envelope.
    pub fn delete_descriptive_metadata(&self, aip_id: &str, descriptive_metadata_id: &str, notify: bool) -> ModelResult<()> {
        let path = descriptive_metadata_path(aip_id, descriptive_metadata_id)?;
        self.locked(aip_id, || {
            let mut aip = self.load_aip(aip_id)?;
            self.storage.delete_resource(&path)?;
            aip.remove_descriptive_metadata(descriptive_metadata_id);
            self.write_envelope(&aip)
        })?;
        info!(aip_id, descriptive_metadata_id, "deleted descriptive metadata");
        self.publish(
            notify,
            ModelEvent::DescriptiveMetadataDeleted {
                aip_id: aip_id.to_string(),
                descriptive_metadata_id: descriptive_metadata_id.to_string(),
            },
        );
        Ok(())
    }

    /// Versions of a descriptive metadata document, oldest first.
    pub fn list_descriptive_metadata_versions(
        &self,
        aip_id: &str,
        descriptive_metadata_id: &str,
    ) -> ModelResult<VersionListing> {
        Ok(self
            .storage
            .list_binary_versions(&descriptive_metadata_path(aip_id, descriptive_metadata_id)?)?)
    }

    /// Restore the content of `version_id`.
    ///
    /// The current content is first kept as a new version labelled
    /// `message`, which is returned, so a revert can itself be reverted.
    pub fn revert_descriptive_metadata_version(
        &self,
        aip_id: &str,
        descriptive_metadata_id: &str,
        version_id: &str,
        message: Option<&str>,
        notify: bool,
    ) -> ModelResult<BinaryVersion> {
        let path = descriptive_metadata_path(aip_id, descriptive_metadata_id)?;
        let snapshot = self.locked(aip_id, || {
            self.storage.get_binary_version(&path, version_id)?;
            let snapshot = self.storage.create_binary_version(&path, message)?;
            self.storage.revert_binary_version(&path, version_id)?;
            Ok(snapshot)
        })?;
        info!(aip_id, descriptive_metadata_id, version_id, "reverted descriptive metadata");
        if notify {
            match self.retrieve_descriptive_metadata(aip_id, descriptive_metadata_id) {
                Ok(entry) => self.publish(true, ModelEvent::DescriptiveMetadataUpdated(entry)),
                Err(e) => warn!(aip_id, descriptive_metadata_id, error = %e, "reverted document is not in the envelope"),
            }
        }
        Ok(snapshot)
    }
}
