use arx_types::StoragePath;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::listing::{ContainerListing, ResourceListing, VersionListing};
use crate::payload::ContentPayload;
use crate::resource::{Binary, BinaryVersion, Container, Directory, Resource};
use crate::transfer;

/// Attempts made by [`StorageService::create_random_directory`] before
/// giving up on name collisions.
pub const RANDOM_NAME_ATTEMPTS: usize = 16;

/// Versioned hierarchical storage.
///
/// All implementations must satisfy these invariants:
/// - Kind-checked accessors distinguish three outcomes: the resource is
///   absent (`NotFound`), present but of another kind (`RequestNotValid`),
///   or present and of the requested kind.
/// - Creating over an existing resource fails with `AlreadyExists`.
/// - Deletes are recursive and take every descendant's version history with
///   them.
/// - Nested creation requires the container to exist; missing intermediate
///   directories are created on the way.
/// - Backend failures are classified into [`StorageError`]; raw backend
///   errors never escape.
pub trait StorageService: Send + Sync {
    // -- Containers ---------------------------------------------------------

    fn create_container(&self, path: &StoragePath) -> StorageResult<Container>;

    fn get_container(&self, path: &StoragePath) -> StorageResult<Container>;

    /// Delete a container and everything inside it.
    fn delete_container(&self, path: &StoragePath) -> StorageResult<()>;

    fn list_containers(&self) -> StorageResult<ContainerListing>;

    /// List the children of a container, or all of its descendants when
    /// `recursive` is set.
    fn list_resources_under_container(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing>;

    // -- Directories --------------------------------------------------------

    fn create_directory(&self, path: &StoragePath) -> StorageResult<Directory>;

    /// Create a directory with a fresh random name under `parent`.
    ///
    /// Name collisions are detected by the backend through `AlreadyExists`
    /// and retried with a new name.
    fn create_random_directory(&self, parent: &StoragePath) -> StorageResult<Directory> {
        for _ in 0..RANDOM_NAME_ATTEMPTS {
            let path = parent.child(&uuid::Uuid::new_v4().to_string())?;
            match self.create_directory(&path) {
                Err(StorageError::AlreadyExists(_)) => {
                    debug!(path = %path, "random directory name collided, retrying");
                }
                other => return other,
            }
        }
        Err(StorageError::generic(format!(
            "could not allocate a random directory under {parent} after {RANDOM_NAME_ATTEMPTS} attempts"
        )))
    }

    fn get_directory(&self, path: &StoragePath) -> StorageResult<Directory>;

    fn list_resources_under_directory(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing>;

    // -- Binaries -----------------------------------------------------------

    /// Create a binary. With `as_reference` the store links to the payload's
    /// file instead of copying it in; backends without reference support
    /// fail with `Generic`.
    fn create_binary(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
    ) -> StorageResult<Binary>;

    fn get_binary(&self, path: &StoragePath) -> StorageResult<Binary>;

    /// Replace a binary's content. Version history is kept.
    ///
    /// An absent binary fails with `NotFound` unless `create_if_not_exists`
    /// is set, in which case this behaves like [`create_binary`].
    ///
    /// [`create_binary`]: StorageService::create_binary
    fn update_binary_content(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
        create_if_not_exists: bool,
    ) -> StorageResult<Binary>;

    /// Delete any resource. Directories and containers go recursively.
    fn delete_resource(&self, path: &StoragePath) -> StorageResult<()>;

    // -- Generic access -----------------------------------------------------

    /// Fetch whatever lives at `path`.
    fn get_resource(&self, path: &StoragePath) -> StorageResult<Resource>;

    fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        match self.get_resource(path) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // -- Relocation ---------------------------------------------------------

    /// Move a resource within this storage.
    ///
    /// The default copies then deletes; backends that can relocate in one
    /// step override it.
    fn rename(&self, source: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        transfer::move_between(self, source, self, target)
    }

    /// Copy `source_path` from `source` (any backend) to `target_path` here.
    fn copy_from(
        &self,
        source: &dyn StorageService,
        source_path: &StoragePath,
        target_path: &StoragePath,
    ) -> StorageResult<()> {
        transfer::copy(source, source_path, self, target_path)
    }

    /// Move `source_path` from `source` (any backend) to `target_path` here.
    fn move_from(
        &self,
        source: &dyn StorageService,
        source_path: &StoragePath,
        target_path: &StoragePath,
    ) -> StorageResult<()> {
        transfer::move_between(source, source_path, self, target_path)
    }

    // -- Versions -----------------------------------------------------------

    /// Snapshot the binary's current content. Every call yields a distinct
    /// version, whatever the message.
    fn create_binary_version(
        &self,
        path: &StoragePath,
        message: Option<&str>,
    ) -> StorageResult<BinaryVersion>;

    /// Versions of a binary, oldest first.
    fn list_binary_versions(&self, path: &StoragePath) -> StorageResult<VersionListing>;

    fn get_binary_version(&self, path: &StoragePath, version_id: &str)
        -> StorageResult<BinaryVersion>;

    /// Restore the content of `version_id`. The history itself is untouched.
    fn revert_binary_version(&self, path: &StoragePath, version_id: &str)
        -> StorageResult<Binary>;

    fn delete_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<()>;
}
