use arx_store::{Binary, ContentPayload, Listing};
use tracing::debug;

use super::{list_or_empty, parse_listing, ModelService};
use crate::error::ModelResult;
use crate::file::File;
use crate::notify::ModelEvent;
use crate::parse::file_from_resource;
use crate::paths::{file_path, representation_data_path, representation_path};

impl ModelService {
    /// A file or folder of a representation.
    pub fn retrieve_file<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
    ) -> ModelResult<File> {
        let resource = self
            .storage
            .get_resource(&file_path(aip_id, representation_id, directory_path, file_id)?)?;
        file_from_resource(&resource)
    }

    /// Content of a file.
    pub fn retrieve_file_binary<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
    ) -> ModelResult<Binary> {
        Ok(self
            .storage
            .get_binary(&file_path(aip_id, representation_id, directory_path, file_id)?)?)
    }

    pub fn create_file<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
        payload: &ContentPayload,
        notify: bool,
    ) -> ModelResult<File> {
        self.require_representation(aip_id, representation_id)?;
        let path = file_path(aip_id, representation_id, directory_path, file_id)?;
        self.storage.create_binary(&path, payload, false)?;
        debug!(path = %path, "created file");
        let file = File::new(aip_id, representation_id, directory_path, file_id, false);
        self.publish(notify, ModelEvent::FileCreated(file.clone()));
        Ok(file)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_file<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
        payload: &ContentPayload,
        create_if_not_exists: bool,
        notify: bool,
    ) -> ModelResult<File> {
        self.require_representation(aip_id, representation_id)?;
        let path = file_path(aip_id, representation_id, directory_path, file_id)?;
        self.storage
            .update_binary_content(&path, payload, false, create_if_not_exists)?;
        debug!(path = %path, "updated file");
        let file = File::new(aip_id, representation_id, directory_path, file_id, false);
        self.publish(notify, ModelEvent::FileUpdated(file.clone()));
        Ok(file)
    }

    pub fn delete_file<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
        notify: bool,
    ) -> ModelResult<()> {
        let path = file_path(aip_id, representation_id, directory_path, file_id)?;
        self.storage.delete_resource(&path)?;
        debug!(path = %path, "deleted file");
        self.publish(
            notify,
            ModelEvent::FileDeleted {
                aip_id: aip_id.to_string(),
                representation_id: representation_id.to_string(),
                directory_path: directory_path.iter().map(|s| s.as_ref().to_string()).collect(),
                file_id: file_id.to_string(),
            },
        );
        Ok(())
    }

    /// Files and folders of a representation.
    ///
    /// Empty if the representation exists but has no `data` directory;
    /// `NotFound` if the representation itself is missing.
    pub fn list_files_under(
        &self,
        aip_id: &str,
        representation_id: &str,
        recursive: bool,
    ) -> ModelResult<Listing<ModelResult<File>>> {
        let listing = list_or_empty(
            self.storage.as_ref(),
            &representation_data_path(aip_id, representation_id)?,
            &representation_path(aip_id, representation_id)?,
            recursive,
        )?;
        Ok(parse_listing(listing, file_from_resource))
    }

    /// Files and folders under a folder of a representation. A missing
    /// folder is `NotFound`.
    pub fn list_files_under_directory<S: AsRef<str>>(
        &self,
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        recursive: bool,
    ) -> ModelResult<Listing<ModelResult<File>>> {
        let dir = representation_data_path(aip_id, representation_id)?.join(directory_path)?;
        let listing = self.storage.list_resources_under_directory(&dir, recursive)?;
        Ok(parse_listing(listing, file_from_resource))
    }
}
