//! Filesystem storage backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<container>/<dir>/.../<binary>         live tree
//! <root>/.history/<container>/.../<binary>/     version history of a binary
//!     <versionId>.bin                            snapshot content
//!     <versionId>.json                           snapshot record
//! ```
//!
//! Segment names never start with `.`, so the history tree and temporary
//! files (written next to their target and atomically persisted) can never
//! collide with stored resources, and listings skip them.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use arx_types::{names, StoragePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::digest;
use crate::error::{StorageError, StorageResult};
use crate::listing::{ContainerListing, Listing, ResourceListing, VersionListing};
use crate::payload::ContentPayload;
use crate::resource::{Binary, BinaryVersion, Container, Directory, Resource};
use crate::traits::StorageService;

const HISTORY_DIR: &str = ".history";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Container,
    Directory,
    Binary,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Container => "container",
            Kind::Directory => "directory",
            Kind::Binary => "binary",
        }
    }
}

/// Sidecar stored next to each snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionRecord {
    id: String,
    message: Option<String>,
    created: DateTime<Utc>,
}

/// Storage backend mapping paths one-to-one onto a directory tree.
///
/// Binaries are written to a temporary file in the target directory and
/// persisted with an atomic rename, so readers never observe partial
/// content. Listings hold a live directory walk that is released on close.
/// Reference binaries are not supported.
#[derive(Debug)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::backend(format!("creating storage root {}", root.display()), e)
        })?;
        debug!(root = %root.display(), "opened filesystem storage");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fs_path(&self, path: &StoragePath) -> PathBuf {
        resolve(&self.root, path)
    }

    fn history_dir(&self, path: &StoragePath) -> PathBuf {
        resolve(&self.root.join(HISTORY_DIR), path)
    }

    fn expect_kind(&self, path: &StoragePath, expected: Kind) -> StorageResult<()> {
        let actual = stat(&self.root, path)?;
        if actual == expected {
            Ok(())
        } else {
            Err(StorageError::wrong_kind(path, expected.name(), actual.name()))
        }
    }

    /// Check the container exists and create missing intermediate
    /// directories for `path`.
    fn ensure_parents(&self, path: &StoragePath) -> StorageResult<()> {
        let container = StoragePath::container(path.container_name())?;
        self.expect_kind(&container, Kind::Container)?;

        let segments = path.segments();
        let mut dir = self.fs_path(&container);
        for depth in 1..segments.len().saturating_sub(1) {
            dir.push(&segments[depth]);
            match fs::metadata(&dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    let ancestor = StoragePath::from_segments(segments[..=depth].to_vec())?;
                    return Err(StorageError::wrong_kind(&ancestor, "directory", "binary"));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => match fs::create_dir(&dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                    Err(e) => return Err(StorageError::io(path, e)),
                },
                Err(e) => return Err(StorageError::io(path, e)),
            }
        }
        Ok(())
    }

    fn reject_reference(path: &StoragePath, as_reference: bool) -> StorageResult<()> {
        if as_reference {
            return Err(StorageError::generic(format!(
                "filesystem storage does not support reference binaries ({path})"
            )));
        }
        if path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is a container path, not a binary path"
            )));
        }
        Ok(())
    }

    /// Stream `payload` into a temp file next to `path`.
    fn stage(&self, path: &StoragePath, payload: &ContentPayload) -> StorageResult<NamedTempFile> {
        let target = self.fs_path(path);
        let parent = target
            .parent()
            .ok_or_else(|| StorageError::generic(format!("{path} has no parent directory")))?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StorageError::io(path, e))?;
        payload
            .write_to(tmp.as_file_mut())
            .map_err(|e| StorageError::backend(format!("writing content for {path}"), e))?;
        Ok(tmp)
    }

    fn write_new(&self, path: &StoragePath, payload: &ContentPayload) -> StorageResult<Binary> {
        self.ensure_parents(path)?;
        match stat(&self.root, path) {
            Ok(_) => return Err(StorageError::AlreadyExists(path.clone())),
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        let tmp = self.stage(path, payload)?;
        tmp.persist_noclobber(self.fs_path(path))
            .map_err(|e| StorageError::io(path, e.error))?;
        load_binary(&self.root, path)
    }

    fn remove_tree(&self, path: &StoragePath, kind: Kind) -> StorageResult<()> {
        let target = self.fs_path(path);
        let result = match kind {
            Kind::Binary => fs::remove_file(&target),
            Kind::Container | Kind::Directory => fs::remove_dir_all(&target),
        };
        result.map_err(|e| StorageError::io(path, e))?;

        match fs::remove_dir_all(self.history_dir(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path, error = %e, "failed to remove version history"),
        }
        debug!(path = %path, kind = kind.name(), "deleted");
        Ok(())
    }

    fn read_record(&self, path: &StoragePath, version_id: &str) -> StorageResult<VersionRecord> {
        names::validate_segment(version_id)?;
        let file = self.history_dir(path).join(format!("{version_id}.json"));
        let data = fs::read(&file).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                StorageError::NotFound(format!("version {version_id} of {path}"))
            }
            _ => StorageError::backend(format!("reading version {version_id} of {path}"), e),
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            StorageError::backend(format!("parsing version {version_id} of {path}"), e)
        })
    }

    fn list_resources(&self, path: &StoragePath, recursive: bool) -> ResourceListing {
        let dir = self.fs_path(path);
        let root = self.root.clone();
        let base = path.clone();

        let mut walker = WalkDir::new(&dir).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }
        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        Listing::new(entries.map(move |entry| {
            let entry =
                entry.map_err(|e| StorageError::backend(format!("listing {base}"), e))?;
            let path = storage_path_of(&root, entry.path())?;
            if entry.file_type().is_dir() {
                Ok(Resource::Directory(Directory::new(path)))
            } else {
                load_binary(&root, &path).map(Resource::Binary)
            }
        }))
    }
}

fn resolve(root: &Path, path: &StoragePath) -> PathBuf {
    let mut out = root.to_path_buf();
    for segment in path.segments() {
        out.push(segment);
    }
    out
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map_or(true, |s| s.starts_with('.'))
}

fn storage_path_of(root: &Path, fs_path: &Path) -> StorageResult<StoragePath> {
    let relative = fs_path.strip_prefix(root).map_err(|_| {
        StorageError::generic(format!("{} is outside the storage root", fs_path.display()))
    })?;
    let segments = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().map(str::to_string).ok_or_else(|| {
                StorageError::generic(format!("non UTF-8 name under {}", fs_path.display()))
            })
        })
        .collect::<StorageResult<Vec<_>>>()?;
    Ok(StoragePath::from_segments(segments)?)
}

/// Determine the kind of resource at `path`.
fn stat(root: &Path, path: &StoragePath) -> StorageResult<Kind> {
    match fs::metadata(resolve(root, path)) {
        Ok(meta) if meta.is_dir() => Ok(if path.is_container() {
            Kind::Container
        } else {
            Kind::Directory
        }),
        Ok(meta) if meta.is_file() && !path.is_container() => Ok(Kind::Binary),
        Ok(_) => Err(StorageError::generic(format!(
            "unsupported file type at {path}"
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::not_found(path)),
        Err(e) => {
            // A binary standing where a directory is expected surfaces as
            // ENOTDIR; treat it as absence of the deeper path.
            let blocked = std::iter::successors(path.parent(), StoragePath::parent)
                .any(|ancestor| resolve(root, &ancestor).is_file());
            if blocked {
                Err(StorageError::not_found(path))
            } else {
                Err(StorageError::io(path, e))
            }
        }
    }
}

fn load_binary(root: &Path, path: &StoragePath) -> StorageResult<Binary> {
    let file = resolve(root, path);
    let reader = File::open(&file).map_err(|e| StorageError::io(path, e))?;
    let (size_in_bytes, content_digest) =
        digest::digest_reader(reader).map_err(|e| StorageError::io(path, e))?;
    Ok(Binary {
        path: path.clone(),
        content: ContentPayload::File(file),
        size_in_bytes,
        content_digest,
        is_reference: false,
    })
}

fn load_version(history: &Path, path: &StoragePath, record: VersionRecord) -> StorageResult<BinaryVersion> {
    let file = history.join(format!("{}.bin", record.id));
    let reader = File::open(&file).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(format!("version {} of {path}", record.id)),
        _ => StorageError::backend(format!("reading version {} of {path}", record.id), e),
    })?;
    let (size_in_bytes, content_digest) = digest::digest_reader(reader)
        .map_err(|e| StorageError::backend(format!("reading version {} of {path}", record.id), e))?;
    Ok(BinaryVersion {
        id: record.id,
        message: record.message,
        created: record.created,
        binary: Binary {
            path: path.clone(),
            content: ContentPayload::File(file),
            size_in_bytes,
            content_digest,
            is_reference: false,
        },
    })
}

impl StorageService for FileSystemStorage {
    fn create_container(&self, path: &StoragePath) -> StorageResult<Container> {
        if !path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is not a container path"
            )));
        }
        fs::create_dir(self.fs_path(path)).map_err(|e| StorageError::io(path, e))?;
        debug!(path = %path, "created container");
        Ok(Container::new(path.clone()))
    }

    fn get_container(&self, path: &StoragePath) -> StorageResult<Container> {
        self.expect_kind(path, Kind::Container)?;
        Ok(Container::new(path.clone()))
    }

    fn delete_container(&self, path: &StoragePath) -> StorageResult<()> {
        self.expect_kind(path, Kind::Container)?;
        self.remove_tree(path, Kind::Container)
    }

    fn list_containers(&self) -> StorageResult<ContainerListing> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            StorageError::backend(format!("listing {}", self.root.display()), e)
        })?;
        let root = self.root.clone();
        Ok(Listing::new(entries.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(StorageError::backend(
                        format!("listing {}", root.display()),
                        e,
                    )))
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(
                    name = %name.to_string_lossy(),
                    root = %root.display(),
                    "skipping container directory with a non UTF-8 name"
                );
                return None;
            };
            if name.starts_with('.') || !entry.path().is_dir() {
                return None;
            }
            Some(
                StoragePath::container(name)
                    .map(Container::new)
                    .map_err(StorageError::from),
            )
        })))
    }

    fn list_resources_under_container(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing> {
        self.expect_kind(path, Kind::Container)?;
        Ok(self.list_resources(path, recursive))
    }

    fn create_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
        if path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is a container path, not a directory path"
            )));
        }
        self.ensure_parents(path)?;
        fs::create_dir(self.fs_path(path)).map_err(|e| StorageError::io(path, e))?;
        Ok(Directory::new(path.clone()))
    }

    fn get_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
        self.expect_kind(path, Kind::Directory)?;
        Ok(Directory::new(path.clone()))
    }

    fn list_resources_under_directory(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing> {
        self.expect_kind(path, Kind::Directory)?;
        Ok(self.list_resources(path, recursive))
    }

    fn create_binary(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
    ) -> StorageResult<Binary> {
        Self::reject_reference(path, as_reference)?;
        let binary = self.write_new(path, payload)?;
        debug!(path = %path, size = binary.size_in_bytes, "created binary");
        Ok(binary)
    }

    fn get_binary(&self, path: &StoragePath) -> StorageResult<Binary> {
        self.expect_kind(path, Kind::Binary)?;
        load_binary(&self.root, path)
    }

    fn update_binary_content(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
        create_if_not_exists: bool,
    ) -> StorageResult<Binary> {
        Self::reject_reference(path, as_reference)?;
        match stat(&self.root, path) {
            Ok(Kind::Binary) => {
                let tmp = self.stage(path, payload)?;
                tmp.persist(self.fs_path(path))
                    .map_err(|e| StorageError::io(path, e.error))?;
            }
            Ok(other) => return Err(StorageError::wrong_kind(path, "binary", other.name())),
            Err(StorageError::NotFound(_)) if create_if_not_exists => {
                self.write_new(path, payload)?;
            }
            Err(e) => return Err(e),
        }
        let binary = load_binary(&self.root, path)?;
        debug!(path = %path, size = binary.size_in_bytes, "updated binary");
        Ok(binary)
    }

    fn delete_resource(&self, path: &StoragePath) -> StorageResult<()> {
        let kind = stat(&self.root, path)?;
        self.remove_tree(path, kind)
    }

    fn get_resource(&self, path: &StoragePath) -> StorageResult<Resource> {
        match stat(&self.root, path)? {
            Kind::Container => Ok(Resource::Container(Container::new(path.clone()))),
            Kind::Directory => Ok(Resource::Directory(Directory::new(path.clone()))),
            Kind::Binary => load_binary(&self.root, path).map(Resource::Binary),
        }
    }

    fn exists(&self, path: &StoragePath) -> StorageResult<bool> {
        match stat(&self.root, path) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, source: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        if source.is_container() != target.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "cannot rename {source} to {target}: container paths only rename to container paths"
            )));
        }
        if target.starts_with(source) {
            return Err(StorageError::RequestNotValid(format!(
                "cannot rename {source} into itself at {target}"
            )));
        }
        stat(&self.root, source)?;
        if self.exists(target)? {
            return Err(StorageError::AlreadyExists(target.clone()));
        }
        if !target.is_container() {
            self.ensure_parents(target)?;
        }
        fs::rename(self.fs_path(source), self.fs_path(target))
            .map_err(|e| StorageError::io(source, e))?;

        let old_history = self.history_dir(source);
        if old_history.exists() {
            let new_history = self.history_dir(target);
            let moved = new_history
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::rename(&old_history, &new_history));
            if let Err(e) = moved {
                warn!(source = %source, target = %target, error = %e, "failed to move version history");
            }
        }
        debug!(source = %source, target = %target, "renamed");
        Ok(())
    }

    fn create_binary_version(
        &self,
        path: &StoragePath,
        message: Option<&str>,
    ) -> StorageResult<BinaryVersion> {
        self.expect_kind(path, Kind::Binary)?;
        let history = self.history_dir(path);
        fs::create_dir_all(&history)
            .map_err(|e| StorageError::backend(format!("creating history for {path}"), e))?;

        let record = VersionRecord {
            id: uuid::Uuid::now_v7().to_string(),
            message: message.map(str::to_string),
            created: Utc::now(),
        };
        fs::copy(self.fs_path(path), history.join(format!("{}.bin", record.id)))
            .map_err(|e| StorageError::io(path, e))?;
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::backend(format!("encoding version of {path}"), e))?;
        fs::write(history.join(format!("{}.json", record.id)), json)
            .map_err(|e| StorageError::backend(format!("writing version of {path}"), e))?;

        debug!(path = %path, version = %record.id, "created binary version");
        load_version(&history, path, record)
    }

    fn list_binary_versions(&self, path: &StoragePath) -> StorageResult<VersionListing> {
        self.expect_kind(path, Kind::Binary)?;
        let history = self.history_dir(path);
        let entries = match fs::read_dir(&history) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Listing::empty()),
            Err(e) => {
                return Err(StorageError::backend(format!("listing versions of {path}"), e))
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StorageError::backend(format!("listing versions of {path}"), e))?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            records.push(self.read_record(path, id)?);
        }
        records.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        let path = path.clone();
        Ok(Listing::new(records).map(move |record| load_version(&history, &path, record)))
    }

    fn get_binary_version(
        &self,
        path: &StoragePath,
        version_id: &str,
    ) -> StorageResult<BinaryVersion> {
        self.expect_kind(path, Kind::Binary)?;
        let record = self.read_record(path, version_id)?;
        load_version(&self.history_dir(path), path, record)
    }

    fn revert_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<Binary> {
        let version = self.get_binary_version(path, version_id)?;
        let tmp = self.stage(path, &version.binary.content)?;
        tmp.persist(self.fs_path(path))
            .map_err(|e| StorageError::io(path, e.error))?;
        debug!(path = %path, version = version_id, "reverted binary");
        load_binary(&self.root, path)
    }

    fn delete_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<()> {
        self.expect_kind(path, Kind::Binary)?;
        let record = self.read_record(path, version_id)?;
        let history = self.history_dir(path);
        for file in [format!("{}.bin", record.id), format!("{}.json", record.id)] {
            match fs::remove_file(history.join(&file)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::backend(
                        format!("deleting version {version_id} of {path}"),
                        e,
                    ))
                }
            }
        }
        Ok(())
    }
}
