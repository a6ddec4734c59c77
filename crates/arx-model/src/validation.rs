//! Structural validation of AIP trees before import.
//!
//! Validation never stops at the first problem: every issue found is
//! collected in a [`ValidationReport`] so the caller can see the whole
//! picture at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use arx_store::{Resource, StorageError, StoragePath, StorageService};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aip::Aip;
use crate::paths::{AIP_METADATA_FILENAME, DATA, DESCRIPTIVE, METADATA};

/// Outcome of a validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

/// A single problem, optionally tied to the storage path it was found at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    pub path: Option<String>,
}

impl ValidationReport {
    /// Returns `true` if no issue was recorded.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, message: impl Into<String>, path: Option<&StoragePath>) {
        self.issues.push(ValidationIssue {
            message: message.into(),
            path: path.map(ToString::to_string),
        });
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

/// Checks a descriptive metadata document against the rules for its type.
pub trait DescriptiveMetadataValidator: Send + Sync {
    /// Validate `content` declared as `metadata_type`.
    ///
    /// With `fail_if_no_schema` unset, types with no known rules pass.
    fn validate(&self, metadata_type: &str, content: &[u8], fail_if_no_schema: bool) -> ValidationReport;
}

/// Rules for one descriptive metadata type.
pub trait MetadataSchema: Send + Sync {
    fn check(&self, content: &[u8]) -> Vec<String>;
}

/// Validator dispatching on metadata type, case-insensitively.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<dyn MetadataSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata_type: &str, schema: Arc<dyn MetadataSchema>) {
        self.schemas.insert(metadata_type.to_lowercase(), schema);
    }

    pub fn with_schema(mut self, metadata_type: &str, schema: impl MetadataSchema + 'static) -> Self {
        self.register(metadata_type, Arc::new(schema));
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DescriptiveMetadataValidator for SchemaRegistry {
    fn validate(&self, metadata_type: &str, content: &[u8], fail_if_no_schema: bool) -> ValidationReport {
        let mut report = ValidationReport::default();
        match self.schemas.get(&metadata_type.to_lowercase()) {
            Some(schema) => {
                for message in schema.check(content) {
                    report.push(message, None);
                }
            }
            None if fail_if_no_schema => {
                report.push(format!("no schema registered for metadata type {metadata_type:?}"), None);
            }
            None => debug!(metadata_type, "no schema registered, skipping"),
        }
        report
    }
}

/// Parseable JSON object with a set of required top-level keys.
#[derive(Clone, Debug, Default)]
pub struct JsonDocumentSchema {
    pub required_keys: Vec<String>,
}

impl JsonDocumentSchema {
    pub fn new<S: Into<String>>(required_keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            required_keys: required_keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl MetadataSchema for JsonDocumentSchema {
    fn check(&self, content: &[u8]) -> Vec<String> {
        let value: serde_json::Value = match serde_json::from_slice(content) {
            Ok(value) => value,
            Err(e) => return vec![format!("not valid JSON: {e}")],
        };
        let Some(object) = value.as_object() else {
            return vec!["document is not a JSON object".to_string()];
        };
        self.required_keys
            .iter()
            .filter(|key| !object.contains_key(key.as_str()))
            .map(|key| format!("missing required key {key:?}"))
            .collect()
    }
}

/// Validate an AIP tree rooted at `dir` in `storage`.
///
/// The envelope must exist and parse, and every descriptive metadata entry
/// it declares must exist and pass `validator`.
pub fn validate_aip_tree(
    storage: &dyn StorageService,
    dir: &StoragePath,
    validator: &dyn DescriptiveMetadataValidator,
    fail_if_no_schema: bool,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    match storage.get_directory(dir) {
        Ok(_) => {}
        Err(e) => {
            report.push(format!("AIP directory is not usable: {e}"), Some(dir));
            return report;
        }
    }

    let envelope_path = match dir.child(AIP_METADATA_FILENAME) {
        Ok(path) => path,
        Err(e) => {
            report.push(e.to_string(), Some(dir));
            return report;
        }
    };
    let aip = match read_envelope(storage, dir, &envelope_path) {
        Ok(aip) => aip,
        Err(message) => {
            report.push(message, Some(&envelope_path));
            return report;
        }
    };

    for dm in &aip.descriptive_metadata {
        let dm_path = match dir.join(&[METADATA, DESCRIPTIVE, dm.id.as_str()]) {
            Ok(path) => path,
            Err(e) => {
                report.push(format!("descriptive metadata id {:?}: {e}", dm.id), Some(dir));
                continue;
            }
        };
        let content = storage
            .get_binary(&dm_path)
            .map_err(|e| e.to_string())
            .and_then(|binary| binary.content.read_all().map_err(|e| e.to_string()));
        match content {
            Ok(bytes) => {
                let found = validator.validate(&dm.metadata_type, &bytes, fail_if_no_schema);
                for issue in found.issues {
                    report.push(issue.message, Some(&dm_path));
                }
            }
            Err(e) => report.push(format!("declared descriptive metadata is unreadable: {e}"), Some(&dm_path)),
        }
    }

    report
}

fn read_envelope(storage: &dyn StorageService, dir: &StoragePath, path: &StoragePath) -> Result<Aip, String> {
    let binary = storage.get_binary(path).map_err(|e| match e {
        StorageError::NotFound(_) => "AIP envelope is missing".to_string(),
        other => format!("AIP envelope is unreadable: {other}"),
    })?;
    let bytes = binary
        .content
        .read_all()
        .map_err(|e| format!("AIP envelope is unreadable: {e}"))?;
    Aip::from_envelope(dir.name(), &bytes).map_err(|e| format!("AIP envelope does not parse: {e}"))
}

/// Validate a representation tree: only `data` and `metadata` may appear at
/// its top level.
pub fn validate_representation_tree(storage: &dyn StorageService, dir: &StoragePath) -> ValidationReport {
    let mut report = ValidationReport::default();
    let listing = match storage.list_resources_under_directory(dir, false) {
        Ok(listing) => listing,
        Err(e) => {
            report.push(format!("representation directory is not usable: {e}"), Some(dir));
            return report;
        }
    };
    for item in listing {
        match item {
            Ok(Resource::Directory(d)) if d.path.name() == DATA || d.path.name() == METADATA => {}
            Ok(other) => report.push(
                format!("unexpected {} at representation top level", other.kind_name()),
                Some(other.path()),
            ),
            Err(e) => report.push(format!("listing failed: {e}"), Some(dir)),
        }
    }
    report
}
