use std::collections::BTreeMap;
use std::sync::RwLock;

use arx_types::StoragePath;
use chrono::Utc;
use tracing::debug;

use crate::digest;
use crate::error::{StorageError, StorageResult};
use crate::listing::{ContainerListing, Listing, ResourceListing, VersionListing};
use crate::payload::ContentPayload;
use crate::resource::{Binary, BinaryVersion, Container, Directory, Resource};
use crate::traits::StorageService;

#[derive(Clone, Debug)]
enum Node {
    Container,
    Directory,
    Binary(Binary),
}

impl Node {
    fn kind_name(&self) -> &'static str {
        match self {
            Node::Container => "container",
            Node::Directory => "directory",
            Node::Binary(_) => "binary",
        }
    }

    fn to_resource(&self, path: &StoragePath) -> Resource {
        match self {
            Node::Container => Resource::Container(Container::new(path.clone())),
            Node::Directory => Resource::Directory(Directory::new(path.clone())),
            Node::Binary(b) => Resource::Binary(b.clone()),
        }
    }
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<StoragePath, Node>,
    versions: BTreeMap<StoragePath, Vec<BinaryVersion>>,
}

impl State {
    fn node(&self, path: &StoragePath) -> StorageResult<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| StorageError::not_found(path))
    }

    /// Paths at or below `path`, in order.
    fn subtree(&self, path: &StoragePath) -> Vec<StoragePath> {
        self.nodes
            .range(path.clone()..)
            .take_while(|(k, _)| k.starts_with(path))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn descendants(&self, path: &StoragePath, recursive: bool) -> Vec<Resource> {
        self.nodes
            .range(path.clone()..)
            .take_while(|(k, _)| k.starts_with(path))
            .filter(|(k, _)| k.depth() > path.depth())
            .filter(|(k, _)| recursive || k.depth() == path.depth() + 1)
            .map(|(k, node)| node.to_resource(k))
            .collect()
    }

    /// Check that `path` can be created below its container and return the
    /// intermediate directories that are missing.
    fn missing_parents(&self, path: &StoragePath) -> StorageResult<Vec<StoragePath>> {
        let container = StoragePath::container(path.container_name())?;
        match self.nodes.get(&container) {
            Some(Node::Container) => {}
            Some(other) => return Err(StorageError::wrong_kind(&container, "container", other.kind_name())),
            None => return Err(StorageError::not_found(&container)),
        }

        let mut missing = Vec::new();
        let mut ancestor = path.parent();
        while let Some(p) = ancestor {
            if p.is_container() {
                break;
            }
            match self.nodes.get(&p) {
                Some(Node::Binary(_)) => {
                    return Err(StorageError::wrong_kind(&p, "directory", "binary"));
                }
                Some(_) => break,
                None => missing.push(p.clone()),
            }
            ancestor = p.parent();
        }
        Ok(missing)
    }

    fn insert_with_parents(&mut self, path: &StoragePath, node: Node) -> StorageResult<()> {
        let missing = self.missing_parents(path)?;
        for dir in missing {
            self.nodes.insert(dir, Node::Directory);
        }
        self.nodes.insert(path.clone(), node);
        Ok(())
    }

    fn remove_subtree(&mut self, path: &StoragePath) {
        for key in self.subtree(path) {
            self.nodes.remove(&key);
            self.versions.remove(&key);
        }
    }

    fn binary(&self, path: &StoragePath) -> StorageResult<&Binary> {
        match self.node(path)? {
            Node::Binary(b) => Ok(b),
            other => Err(StorageError::wrong_kind(path, "binary", other.kind_name())),
        }
    }

    fn version_index(&self, path: &StoragePath, version_id: &str) -> StorageResult<usize> {
        self.binary(path)?;
        self.versions
            .get(path)
            .and_then(|history| history.iter().position(|v| v.id == version_id))
            .ok_or_else(|| StorageError::NotFound(format!("version {version_id} of {path}")))
    }
}

/// In-memory storage backend.
///
/// Intended for tests and embedding. The whole tree lives in an ordered map
/// behind a `RwLock`; every descendant of a path sorts contiguously after
/// it, so subtree operations are range scans. Listings are snapshots taken
/// under the read lock.
///
/// Reference binaries are supported when the payload is a file path: the
/// path is kept and read on demand.
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Number of resources of any kind.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().expect("lock poisoned").nodes.is_empty()
    }

    /// Total inline bytes held by current binaries.
    pub fn total_bytes(&self) -> u64 {
        self.state
            .read()
            .expect("lock poisoned")
            .nodes
            .values()
            .filter_map(|n| match n {
                Node::Binary(b) if !b.is_reference => Some(b.size_in_bytes),
                _ => None,
            })
            .sum()
    }

    fn build_binary(
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
    ) -> StorageResult<Binary> {
        if !as_reference {
            let data = payload
                .read_all()
                .map_err(|e| StorageError::backend(format!("reading content for {path}"), e))?;
            return Ok(Binary::inline(path.clone(), data));
        }

        let Some(file) = payload.file_path() else {
            return Err(StorageError::RequestNotValid(format!(
                "reference binary {path} needs file content"
            )));
        };
        let reader = payload.open().map_err(|e| {
            StorageError::backend(format!("opening referenced content {}", file.display()), e)
        })?;
        let (size_in_bytes, content_digest) = digest::digest_reader(reader).map_err(|e| {
            StorageError::backend(format!("reading referenced content {}", file.display()), e)
        })?;
        Ok(Binary {
            path: path.clone(),
            content: payload.clone(),
            size_in_bytes,
            content_digest,
            is_reference: true,
        })
    }

    fn snapshot(binary: &Binary) -> StorageResult<Binary> {
        if !binary.is_reference {
            return Ok(binary.clone());
        }
        // Referenced content can change underneath us; capture the bytes.
        let data = binary
            .content
            .read_all()
            .map_err(|e| StorageError::backend(format!("reading content for {}", binary.path), e))?;
        Ok(Binary::inline(binary.path.clone(), data))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageService for InMemoryStorage {
    fn create_container(&self, path: &StoragePath) -> StorageResult<Container> {
        if !path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is not a container path"
            )));
        }
        let mut state = self.state.write().expect("lock poisoned");
        if state.nodes.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.clone()));
        }
        state.nodes.insert(path.clone(), Node::Container);
        debug!(path = %path, "created container");
        Ok(Container::new(path.clone()))
    }

    fn get_container(&self, path: &StoragePath) -> StorageResult<Container> {
        let state = self.state.read().expect("lock poisoned");
        match state.node(path)? {
            Node::Container => Ok(Container::new(path.clone())),
            other => Err(StorageError::wrong_kind(path, "container", other.kind_name())),
        }
    }

    fn delete_container(&self, path: &StoragePath) -> StorageResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        match state.node(path)? {
            Node::Container => {}
            other => return Err(StorageError::wrong_kind(path, "container", other.kind_name())),
        }
        state.remove_subtree(path);
        debug!(path = %path, "deleted container");
        Ok(())
    }

    fn list_containers(&self) -> StorageResult<ContainerListing> {
        let state = self.state.read().expect("lock poisoned");
        let containers: Vec<_> = state
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n, Node::Container))
            .map(|(k, _)| Ok(Container::new(k.clone())))
            .collect();
        Ok(Listing::new(containers))
    }

    fn list_resources_under_container(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing> {
        let state = self.state.read().expect("lock poisoned");
        match state.node(path)? {
            Node::Container => {}
            other => return Err(StorageError::wrong_kind(path, "container", other.kind_name())),
        }
        Ok(Listing::new(state.descendants(path, recursive)).map(Ok))
    }

    fn create_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
        if path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is a container path, not a directory path"
            )));
        }
        let mut state = self.state.write().expect("lock poisoned");
        if state.nodes.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.clone()));
        }
        state.insert_with_parents(path, Node::Directory)?;
        Ok(Directory::new(path.clone()))
    }

    fn get_directory(&self, path: &StoragePath) -> StorageResult<Directory> {
        let state = self.state.read().expect("lock poisoned");
        match state.node(path)? {
            Node::Directory => Ok(Directory::new(path.clone())),
            other => Err(StorageError::wrong_kind(path, "directory", other.kind_name())),
        }
    }

    fn list_resources_under_directory(
        &self,
        path: &StoragePath,
        recursive: bool,
    ) -> StorageResult<ResourceListing> {
        let state = self.state.read().expect("lock poisoned");
        match state.node(path)? {
            Node::Directory => {}
            other => return Err(StorageError::wrong_kind(path, "directory", other.kind_name())),
        }
        Ok(Listing::new(state.descendants(path, recursive)).map(Ok))
    }

    fn create_binary(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
    ) -> StorageResult<Binary> {
        if path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is a container path, not a binary path"
            )));
        }
        let binary = Self::build_binary(path, payload, as_reference)?;
        let mut state = self.state.write().expect("lock poisoned");
        if state.nodes.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.clone()));
        }
        state.insert_with_parents(path, Node::Binary(binary.clone()))?;
        debug!(path = %path, size = binary.size_in_bytes, "created binary");
        Ok(binary)
    }

    fn get_binary(&self, path: &StoragePath) -> StorageResult<Binary> {
        let state = self.state.read().expect("lock poisoned");
        state.binary(path).cloned()
    }

    fn update_binary_content(
        &self,
        path: &StoragePath,
        payload: &ContentPayload,
        as_reference: bool,
        create_if_not_exists: bool,
    ) -> StorageResult<Binary> {
        if path.is_container() {
            return Err(StorageError::RequestNotValid(format!(
                "{path} is a container path, not a binary path"
            )));
        }
        let binary = Self::build_binary(path, payload, as_reference)?;
        let mut state = self.state.write().expect("lock poisoned");
        match state.nodes.get(path) {
            Some(Node::Binary(_)) => {
                state.nodes.insert(path.clone(), Node::Binary(binary.clone()));
            }
            Some(other) => {
                return Err(StorageError::wrong_kind(path, "binary", other.kind_name()));
            }
            None if create_if_not_exists => {
                state.insert_with_parents(path, Node::Binary(binary.clone()))?;
            }
            None => return Err(StorageError::not_found(path)),
        }
        debug!(path = %path, size = binary.size_in_bytes, "updated binary");
        Ok(binary)
    }

    fn delete_resource(&self, path: &StoragePath) -> StorageResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.node(path)?;
        state.remove_subtree(path);
        debug!(path = %path, "deleted resource");
        Ok(())
    }

    fn get_resource(&self, path: &StoragePath) -> StorageResult<Resource> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.node(path)?.to_resource(path))
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

        let mut state = self.state.write().expect("lock poisoned");
        state.node(source)?;
        if state.nodes.contains_key(target) {
            return Err(StorageError::AlreadyExists(target.clone()));
        }
        let missing = if target.is_container() {
            Vec::new()
        } else {
            state.missing_parents(target)?
        };

        for key in state.subtree(source) {
            let Some(new_key) = key.rebase(source, target) else {
                continue;
            };
            if let Some(mut node) = state.nodes.remove(&key) {
                if let Node::Binary(b) = &mut node {
                    b.path = new_key.clone();
                }
                state.nodes.insert(new_key.clone(), node);
            }
            if let Some(mut history) = state.versions.remove(&key) {
                for version in &mut history {
                    version.binary.path = new_key.clone();
                }
                state.versions.insert(new_key, history);
            }
        }
        for dir in missing {
            state.nodes.insert(dir, Node::Directory);
        }
        debug!(source = %source, target = %target, "renamed");
        Ok(())
    }

    fn create_binary_version(
        &self,
        path: &StoragePath,
        message: Option<&str>,
    ) -> StorageResult<BinaryVersion> {
        let mut state = self.state.write().expect("lock poisoned");
        let binary = Self::snapshot(state.binary(path)?)?;
        let version = BinaryVersion {
            id: uuid::Uuid::now_v7().to_string(),
            message: message.map(str::to_string),
            created: Utc::now(),
            binary,
        };
        state
            .versions
            .entry(path.clone())
            .or_default()
            .push(version.clone());
        debug!(path = %path, version = %version.id, "created binary version");
        Ok(version)
    }

    fn list_binary_versions(&self, path: &StoragePath) -> StorageResult<VersionListing> {
        let state = self.state.read().expect("lock poisoned");
        state.binary(path)?;
        let history = state.versions.get(path).cloned().unwrap_or_default();
        Ok(Listing::new(history).map(Ok))
    }

    fn get_binary_version(
        &self,
        path: &StoragePath,
        version_id: &str,
    ) -> StorageResult<BinaryVersion> {
        let state = self.state.read().expect("lock poisoned");
        let index = state.version_index(path, version_id)?;
        Ok(state.versions[path][index].clone())
    }

    fn revert_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<Binary> {
        let mut state = self.state.write().expect("lock poisoned");
        let index = state.version_index(path, version_id)?;
        let binary = state.versions[path][index].binary.clone();
        state.nodes.insert(path.clone(), Node::Binary(binary.clone()));
        debug!(path = %path, version = version_id, "reverted binary");
        Ok(binary)
    }

    fn delete_binary_version(&self, path: &StoragePath, version_id: &str) -> StorageResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let index = state.version_index(path, version_id)?;
        if let Some(history) = state.versions.get_mut(path) {
            history.remove(index);
        }
        Ok(())
    }
}
