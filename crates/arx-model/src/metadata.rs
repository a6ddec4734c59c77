//! Preservation and other metadata descriptors.
//!
//! Both carry their full scope (AIP, representation, file) so that the
//! same logical artifact always maps to the same storage path and the same
//! derived id.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreservationMetadataType {
    ObjectRepresentation,
    ObjectFile,
    Event,
    Agent,
}

impl PreservationMetadataType {
    /// Directory holding artifacts of this type.
    pub fn directory(self) -> &'static str {
        match self {
            Self::ObjectRepresentation => "representation",
            Self::ObjectFile => "files",
            Self::Event => "events",
            Self::Agent => "agents",
        }
    }

    pub fn from_directory(name: &str) -> Option<Self> {
        match name {
            "representation" => Some(Self::ObjectRepresentation),
            "files" => Some(Self::ObjectFile),
            "events" => Some(Self::Event),
            "agents" => Some(Self::Agent),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreservationMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub metadata_type: PreservationMetadataType,
    pub aip_id: Option<String>,
    pub representation_id: Option<String>,
    #[serde(default)]
    pub file_directory_path: Vec<String>,
    pub file_id: Option<String>,
}

impl PreservationMetadata {
    /// Global agent record, not scoped to any AIP.
    pub fn agent(id: &str) -> Self {
        Self {
            id: id.into(),
            metadata_type: PreservationMetadataType::Agent,
            aip_id: None,
            representation_id: None,
            file_directory_path: Vec::new(),
            file_id: None,
        }
    }

    /// Event attached to an AIP or to one of its representations.
    pub fn event(id: &str, aip_id: &str, representation_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            metadata_type: PreservationMetadataType::Event,
            aip_id: Some(aip_id.into()),
            representation_id: representation_id.map(Into::into),
            file_directory_path: Vec::new(),
            file_id: None,
        }
    }

    /// Object record of a representation, with a derived id.
    pub fn representation(aip_id: &str, representation_id: &str) -> Self {
        Self {
            id: preservation_metadata_id(
                PreservationMetadataType::ObjectRepresentation,
                Some(aip_id),
                Some(representation_id),
                &[] as &[String],
                None,
            ),
            metadata_type: PreservationMetadataType::ObjectRepresentation,
            aip_id: Some(aip_id.into()),
            representation_id: Some(representation_id.into()),
            file_directory_path: Vec::new(),
            file_id: None,
        }
    }

    /// Object record of a file, with a derived id.
    pub fn file<S: AsRef<str>>(aip_id: &str, representation_id: &str, directory_path: &[S], file_id: &str) -> Self {
        Self {
            id: preservation_metadata_id(
                PreservationMetadataType::ObjectFile,
                Some(aip_id),
                Some(representation_id),
                directory_path,
                Some(file_id),
            ),
            metadata_type: PreservationMetadataType::ObjectFile,
            aip_id: Some(aip_id.into()),
            representation_id: Some(representation_id.into()),
            file_directory_path: directory_path.iter().map(|s| s.as_ref().to_string()).collect(),
            file_id: Some(file_id.into()),
        }
    }
}

/// Deterministic id of a preservation artifact from its scope.
///
/// Agents and events are identified by their own id; object records are
/// identified by the thing they describe.
pub fn preservation_metadata_id<S: AsRef<str>>(
    metadata_type: PreservationMetadataType,
    aip_id: Option<&str>,
    representation_id: Option<&str>,
    directory_path: &[S],
    file_id: Option<&str>,
) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(aip_id);
    parts.extend(representation_id);
    if metadata_type == PreservationMetadataType::ObjectFile {
        parts.extend(directory_path.iter().map(|s| s.as_ref()));
        parts.extend(file_id);
    }
    parts.join("-")
}

/// Auxiliary metadata of an arbitrary `type`, stored as `<owner><suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub metadata_type: String,
    pub aip_id: String,
    pub representation_id: Option<String>,
    #[serde(default)]
    pub file_directory_path: Vec<String>,
    pub file_id: Option<String>,
    pub file_suffix: String,
}

impl OtherMetadata {
    pub fn for_aip(aip_id: &str, metadata_type: &str, file_suffix: &str) -> Self {
        Self::scoped(aip_id, None, &[] as &[String], None, metadata_type, file_suffix)
    }

    pub fn for_representation(aip_id: &str, representation_id: &str, metadata_type: &str, file_suffix: &str) -> Self {
        Self::scoped(aip_id, Some(representation_id), &[] as &[String], None, metadata_type, file_suffix)
    }

    pub fn for_file<S: AsRef<str>>(
        aip_id: &str,
        representation_id: &str,
        directory_path: &[S],
        file_id: &str,
        metadata_type: &str,
        file_suffix: &str,
    ) -> Self {
        Self::scoped(
            aip_id,
            Some(representation_id),
            directory_path,
            Some(file_id),
            metadata_type,
            file_suffix,
        )
    }

    fn scoped<S: AsRef<str>>(
        aip_id: &str,
        representation_id: Option<&str>,
        directory_path: &[S],
        file_id: Option<&str>,
        metadata_type: &str,
        file_suffix: &str,
    ) -> Self {
        Self {
            id: other_metadata_id(metadata_type, aip_id, representation_id, directory_path, file_id),
            metadata_type: metadata_type.into(),
            aip_id: aip_id.into(),
            representation_id: representation_id.map(Into::into),
            file_directory_path: directory_path.iter().map(|s| s.as_ref().to_string()).collect(),
            file_id: file_id.map(Into::into),
            file_suffix: file_suffix.into(),
        }
    }
}

/// Deterministic id of an other-metadata artifact from its scope.
pub fn other_metadata_id<S: AsRef<str>>(
    metadata_type: &str,
    aip_id: &str,
    representation_id: Option<&str>,
    directory_path: &[S],
    file_id: Option<&str>,
) -> String {
    let mut parts = vec![metadata_type, aip_id];
    parts.extend(representation_id);
    if file_id.is_some() {
        parts.extend(directory_path.iter().map(|s| s.as_ref()));
        parts.extend(file_id);
    }
    parts.join("-")
}
