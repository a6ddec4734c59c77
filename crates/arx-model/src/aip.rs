use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Archival Information Package, as persisted in its `aip.json` envelope.
///
/// `id` is never part of the JSON: it is the name of the AIP's storage
/// directory and is filled in after parsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aip {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub permissions: AipPermissions,
    #[serde(default)]
    pub descriptive_metadata: Vec<DescriptiveMetadata>,
    #[serde(default)]
    pub representations: Vec<Representation>,
}

fn default_active() -> bool {
    true
}

impl Aip {
    /// An AIP with no metadata and no representations.
    pub fn new(id: impl Into<String>, parent_id: Option<String>, active: bool, permissions: AipPermissions) -> Self {
        Self {
            id: id.into(),
            parent_id,
            active,
            permissions,
            descriptive_metadata: Vec::new(),
            representations: Vec::new(),
        }
    }

    /// Parse an envelope, taking the id from the storage directory name.
    ///
    /// The AIP id recorded in nested entries is overwritten as well, so an
    /// envelope imported under another name never leaks its old id.
    pub fn from_envelope(id: &str, json: &[u8]) -> Result<Self, serde_json::Error> {
        let mut aip: Aip = serde_json::from_slice(json)?;
        aip.id = id.to_string();
        for dm in &mut aip.descriptive_metadata {
            dm.aip_id = id.to_string();
        }
        for rep in &mut aip.representations {
            rep.aip_id = id.to_string();
        }
        Ok(aip)
    }

    pub fn to_envelope(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn descriptive_metadata(&self, id: &str) -> Option<&DescriptiveMetadata> {
        self.descriptive_metadata.iter().find(|dm| dm.id == id)
    }

    /// Record a descriptive metadata entry, replacing the type in place if
    /// the id is already listed. Returns the stored entry.
    pub fn upsert_descriptive_metadata(&mut self, id: &str, metadata_type: &str) -> DescriptiveMetadata {
        if let Some(existing) = self.descriptive_metadata.iter_mut().find(|dm| dm.id == id) {
            existing.metadata_type = metadata_type.to_string();
            return existing.clone();
        }
        let entry = DescriptiveMetadata::new(id, &self.id, metadata_type);
        self.descriptive_metadata.push(entry.clone());
        entry
    }

    /// Drop a descriptive metadata entry; `true` if it was listed.
    pub fn remove_descriptive_metadata(&mut self, id: &str) -> bool {
        let before = self.descriptive_metadata.len();
        self.descriptive_metadata.retain(|dm| dm.id != id);
        before != self.descriptive_metadata.len()
    }

    pub fn representation(&self, id: &str) -> Option<&Representation> {
        self.representations.iter().find(|r| r.id == id)
    }

    pub fn remove_representation(&mut self, id: &str) -> bool {
        let before = self.representations.len();
        self.representations.retain(|r| r.id != id);
        before != self.representations.len()
    }
}

/// Per-principal permission sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AipPermissions {
    #[serde(default)]
    pub users: BTreeMap<String, BTreeSet<Permission>>,
    #[serde(default)]
    pub groups: BTreeMap<String, BTreeSet<Permission>>,
}

impl AipPermissions {
    pub fn grant_user(&mut self, user: &str, permission: Permission) {
        self.users.entry(user.to_string()).or_default().insert(permission);
    }

    pub fn grant_group(&mut self, group: &str, permission: Permission) {
        self.groups.entry(group.to_string()).or_default().insert(permission);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
    Grant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveMetadata {
    pub id: String,
    pub aip_id: String,
    #[serde(rename = "type")]
    pub metadata_type: String,
}

impl DescriptiveMetadata {
    pub fn new(id: &str, aip_id: &str, metadata_type: &str) -> Self {
        Self {
            id: id.into(),
            aip_id: aip_id.into(),
            metadata_type: metadata_type.into(),
        }
    }
}

/// One rendition of an AIP's content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    pub id: String,
    pub aip_id: String,
    pub original: bool,
}

impl Representation {
    pub fn new(id: &str, aip_id: &str, original: bool) -> Self {
        Self {
            id: id.into(),
            aip_id: aip_id.into(),
            original,
        }
    }
}
