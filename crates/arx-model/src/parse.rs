//! Reading model entities back from storage paths.
//!
//! The inverse of [`crate::paths`]: given where a resource lives, recover
//! which file or metadata artifact it is.

use arx_store::{Resource, StoragePath};

use crate::error::{ModelError, ModelResult};
use crate::file::File;
use crate::metadata::{OtherMetadata, PreservationMetadata, PreservationMetadataType};
use crate::paths::{
    AGENTS_DIRECTORY, AIP_CONTAINER, DATA, METADATA, OTHER, PRESERVATION, PRESERVATION_CONTAINER,
    PRESERVATION_SUFFIX, REPRESENTATIONS,
};

/// Where under an AIP a metadata artifact sits.
struct Scope<'a> {
    aip_id: &'a str,
    representation_id: Option<&'a str>,
    /// Segments after `metadata/<kind>`.
    rest: &'a [String],
}

fn not_model_path(path: &StoragePath, what: &str) -> ModelError {
    ModelError::RequestNotValid(format!("{path} is not a {what} path"))
}

/// Split `aip/<a>[/representations/<r>]/metadata/<kind>/...`.
fn metadata_scope<'a>(path: &'a StoragePath, kind: &str) -> Option<Scope<'a>> {
    let s = path.segments();
    if s.len() < 2 || s[0] != AIP_CONTAINER {
        return None;
    }
    match &s[2..] {
        [m, k, rest @ ..] if m == METADATA && k == kind => Some(Scope {
            aip_id: &s[1],
            representation_id: None,
            rest,
        }),
        [reps, rep, m, k, rest @ ..] if reps == REPRESENTATIONS && m == METADATA && k == kind => Some(Scope {
            aip_id: &s[1],
            representation_id: Some(rep.as_str()),
            rest,
        }),
        _ => None,
    }
}

/// A file or folder under a representation's `data` directory.
pub fn file_from_resource(resource: &Resource) -> ModelResult<File> {
    let path = resource.path();
    let s = path.segments();
    match s {
        [c, aip, reps, rep, data, rest @ ..]
            if c == AIP_CONTAINER && reps == REPRESENTATIONS && data == DATA && !rest.is_empty() =>
        {
            let (id, dirs) = rest.split_last().ok_or_else(|| not_model_path(path, "file"))?;
            Ok(File::new(aip, rep, dirs, id, resource.is_directory()))
        }
        _ => Err(not_model_path(path, "file")),
    }
}

fn strip_preservation_suffix(name: &str) -> &str {
    name.strip_suffix(PRESERVATION_SUFFIX).unwrap_or(name)
}

/// Preservation metadata descriptor of the binary at `path`.
pub fn preservation_from_path(path: &StoragePath) -> ModelResult<PreservationMetadata> {
    let s = path.segments();
    if let [c, agents, name] = s {
        if c == PRESERVATION_CONTAINER && agents == AGENTS_DIRECTORY {
            return Ok(PreservationMetadata::agent(strip_preservation_suffix(name)));
        }
    }

    let scope = metadata_scope(path, PRESERVATION).ok_or_else(|| not_model_path(path, "preservation metadata"))?;
    let (type_dir, rest) = scope
        .rest
        .split_first()
        .ok_or_else(|| not_model_path(path, "preservation metadata"))?;
    let metadata_type = PreservationMetadataType::from_directory(type_dir)
        .ok_or_else(|| not_model_path(path, "preservation metadata"))?;
    let (name, dirs) = rest
        .split_last()
        .ok_or_else(|| not_model_path(path, "preservation metadata"))?;
    let stem = strip_preservation_suffix(name);

    match (metadata_type, scope.representation_id) {
        (PreservationMetadataType::Event, rep) if dirs.is_empty() => {
            Ok(PreservationMetadata::event(stem, scope.aip_id, rep))
        }
        (PreservationMetadataType::ObjectRepresentation, Some(rep)) if dirs.is_empty() => {
            Ok(PreservationMetadata::representation(scope.aip_id, rep))
        }
        (PreservationMetadataType::ObjectFile, Some(rep)) => {
            Ok(PreservationMetadata::file(scope.aip_id, rep, dirs, stem))
        }
        _ => Err(not_model_path(path, "preservation metadata")),
    }
}

/// Split `name` into `(stem, suffix)` at its last extension.
fn split_suffix(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}

/// Other metadata descriptor of the binary at `path`.
///
/// A binary directly under the type directory whose stem is the owner's id
/// is owner-level metadata; anything else under a representation is
/// file-level, with the last extension taken as suffix.
pub fn other_from_path(path: &StoragePath) -> ModelResult<OtherMetadata> {
    let scope = metadata_scope(path, OTHER).ok_or_else(|| not_model_path(path, "other metadata"))?;
    let (metadata_type, rest) = scope
        .rest
        .split_first()
        .ok_or_else(|| not_model_path(path, "other metadata"))?;
    let (name, dirs) = rest.split_last().ok_or_else(|| not_model_path(path, "other metadata"))?;

    match scope.representation_id {
        None => {
            let suffix = name
                .strip_prefix(scope.aip_id)
                .unwrap_or_else(|| split_suffix(name).1);
            if !dirs.is_empty() {
                return Err(not_model_path(path, "other metadata"));
            }
            Ok(OtherMetadata::for_aip(scope.aip_id, metadata_type, suffix))
        }
        Some(rep) => {
            let (stem, suffix) = split_suffix(name);
            if dirs.is_empty() && stem == rep {
                Ok(OtherMetadata::for_representation(scope.aip_id, rep, metadata_type, suffix))
            } else {
                Ok(OtherMetadata::for_file(scope.aip_id, rep, dirs, stem, metadata_type, suffix))
            }
        }
    }
}
