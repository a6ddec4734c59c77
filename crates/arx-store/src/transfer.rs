//! Copy and move between storage services, same or different backends.
//!
//! A copy walks the source tree level by level and recreates it on the
//! target. If anything fails after the target root was created, the partial
//! target is deleted again so no half-copied subtree stays visible. A move
//! is a copy followed by deleting the source, and the source is only
//! touched once the copy fully succeeded. Version histories are not
//! transferred.

use arx_types::StoragePath;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::resource::Resource;
use crate::traits::StorageService;

/// Recursively copy `source_path` from `source` to `target_path` on `target`.
pub fn copy<S, T>(
    source: &S,
    source_path: &StoragePath,
    target: &T,
    target_path: &StoragePath,
) -> StorageResult<()>
where
    S: StorageService + ?Sized,
    T: StorageService + ?Sized,
{
    if std::ptr::addr_eq(source as *const S, target as *const T) && target_path.starts_with(source_path) {
        return Err(StorageError::RequestNotValid(format!(
            "cannot copy {source_path} into itself at {target_path}"
        )));
    }

    let resource = source.get_resource(source_path)?;
    if target.exists(target_path)? {
        return Err(StorageError::AlreadyExists(target_path.clone()));
    }

    debug!(source = %source_path, target = %target_path, "copying");
    if let Resource::Binary(binary) = &resource {
        target.create_binary(target_path, &binary.content, binary.is_reference)?;
        return Ok(());
    }

    create_tree_root(target, target_path)?;
    if let Err(err) = copy_children(source, source_path, target, target_path) {
        rollback(target, target_path);
        return Err(err);
    }
    Ok(())
}

/// Copy, then delete the source once the copy succeeded.
pub fn move_between<S, T>(
    source: &S,
    source_path: &StoragePath,
    target: &T,
    target_path: &StoragePath,
) -> StorageResult<()>
where
    S: StorageService + ?Sized,
    T: StorageService + ?Sized,
{
    copy(source, source_path, target, target_path)?;
    remove(source, source_path)
}

/// Delete a path whatever its kind.
pub fn remove<S: StorageService + ?Sized>(storage: &S, path: &StoragePath) -> StorageResult<()> {
    if path.is_container() {
        storage.delete_container(path)
    } else {
        storage.delete_resource(path)
    }
}

fn create_tree_root<T: StorageService + ?Sized>(target: &T, path: &StoragePath) -> StorageResult<()> {
    if path.is_container() {
        target.create_container(path).map(|_| ())
    } else {
        target.create_directory(path).map(|_| ())
    }
}

fn copy_children<S, T>(
    source: &S,
    source_dir: &StoragePath,
    target: &T,
    target_dir: &StoragePath,
) -> StorageResult<()>
where
    S: StorageService + ?Sized,
    T: StorageService + ?Sized,
{
    let listing = if source_dir.is_container() {
        source.list_resources_under_container(source_dir, false)?
    } else {
        source.list_resources_under_directory(source_dir, false)?
    };
    // Drain the level first so the source handle is released before
    // descending.
    let children = listing.try_collect()?;

    for child in children {
        let child_target = target_dir.child(child.path().name())?;
        match child {
            Resource::Binary(binary) => {
                target.create_binary(&child_target, &binary.content, binary.is_reference)?;
            }
            Resource::Directory(dir) => {
                target.create_directory(&child_target)?;
                copy_children(source, &dir.path, target, &child_target)?;
            }
            Resource::Container(c) => {
                return Err(StorageError::generic(format!(
                    "container {} listed below {source_dir}",
                    c.path
                )));
            }
        }
    }
    Ok(())
}

fn rollback<T: StorageService + ?Sized>(target: &T, path: &StoragePath) {
    match remove(target, path) {
        Ok(()) => debug!(path = %path, "rolled back partial copy"),
        Err(StorageError::NotFound(_)) => {}
        Err(err) => warn!(path = %path, error = %err, "failed to roll back partial copy"),
    }
}
