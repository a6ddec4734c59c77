//! Storage path conventions.
//!
//! Every model artifact lives at a path derived only from its scope, so the
//! same logical artifact always maps to the same place:
//!
//! ```text
//! aip/<aip>/aip.json
//! aip/<aip>/metadata/descriptive/<dm>
//! aip/<aip>/metadata/preservation/events/<event>.xml
//! aip/<aip>/metadata/other/<type>/<aip><suffix>
//! aip/<aip>/representations/<rep>/data/<dirs..>/<file>
//! aip/<aip>/representations/<rep>/metadata/preservation/representation/<rep>.xml
//! aip/<aip>/representations/<rep>/metadata/preservation/files/<dirs..>/<file>.xml
//! aip/<aip>/representations/<rep>/metadata/preservation/events/<event>.xml
//! aip/<aip>/representations/<rep>/metadata/other/<type>/<dirs..>/<file or rep><suffix>
//! preservation/agents/<agent>.xml
//! job/<job>.json
//! job-report/<job>-<aip>.json
//! actionlog/<yyyy-MM-dd>.log
//! ```

use arx_types::StoragePath;

use crate::error::{ModelError, ModelResult};
use crate::job::job_report_id;
use crate::metadata::{OtherMetadata, PreservationMetadata, PreservationMetadataType};

pub const AIP_CONTAINER: &str = "aip";
pub const PRESERVATION_CONTAINER: &str = "preservation";
pub const ACTIONLOG_CONTAINER: &str = "actionlog";
pub const JOB_CONTAINER: &str = "job";
pub const JOB_REPORT_CONTAINER: &str = "job-report";

pub const AGENTS_DIRECTORY: &str = "agents";
pub const AIP_METADATA_FILENAME: &str = "aip.json";
pub const METADATA: &str = "metadata";
pub const DESCRIPTIVE: &str = "descriptive";
pub const PRESERVATION: &str = "preservation";
pub const OTHER: &str = "other";
pub const REPRESENTATIONS: &str = "representations";
pub const DATA: &str = "data";

pub const PRESERVATION_SUFFIX: &str = ".xml";
pub const JSON_SUFFIX: &str = ".json";
pub const LOG_SUFFIX: &str = ".log";

/// Containers every repository needs.
pub const CONTAINERS: [&str; 5] = [
    AIP_CONTAINER,
    PRESERVATION_CONTAINER,
    ACTIONLOG_CONTAINER,
    JOB_CONTAINER,
    JOB_REPORT_CONTAINER,
];

pub fn aip_container() -> ModelResult<StoragePath> {
    Ok(StoragePath::container(AIP_CONTAINER)?)
}

pub fn aip_path(aip_id: &str) -> ModelResult<StoragePath> {
    Ok(aip_container()?.child(aip_id)?)
}

pub fn aip_metadata_path(aip_id: &str) -> ModelResult<StoragePath> {
    Ok(aip_path(aip_id)?.child(AIP_METADATA_FILENAME)?)
}

pub fn descriptive_metadata_path(aip_id: &str, descriptive_metadata_id: &str) -> ModelResult<StoragePath> {
    Ok(aip_path(aip_id)?.join(&[METADATA, DESCRIPTIVE, descriptive_metadata_id])?)
}

pub fn aip_preservation_path(aip_id: &str) -> ModelResult<StoragePath> {
    Ok(aip_path(aip_id)?.join(&[METADATA, PRESERVATION])?)
}

pub fn aip_other_metadata_path(aip_id: &str, metadata_type: &str) -> ModelResult<StoragePath> {
    Ok(aip_path(aip_id)?.join(&[METADATA, OTHER, metadata_type])?)
}

pub fn representation_path(aip_id: &str, representation_id: &str) -> ModelResult<StoragePath> {
    Ok(aip_path(aip_id)?.join(&[REPRESENTATIONS, representation_id])?)
}

pub fn representation_data_path(aip_id: &str, representation_id: &str) -> ModelResult<StoragePath> {
    Ok(representation_path(aip_id, representation_id)?.child(DATA)?)
}

pub fn representation_preservation_path(aip_id: &str, representation_id: &str) -> ModelResult<StoragePath> {
    Ok(representation_path(aip_id, representation_id)?.join(&[METADATA, PRESERVATION])?)
}

pub fn representation_other_metadata_path(
    aip_id: &str,
    representation_id: &str,
    metadata_type: &str,
) -> ModelResult<StoragePath> {
    Ok(representation_path(aip_id, representation_id)?.join(&[METADATA, OTHER, metadata_type])?)
}

pub fn file_path<S: AsRef<str>>(
    aip_id: &str,
    representation_id: &str,
    directory_path: &[S],
    file_id: &str,
) -> ModelResult<StoragePath> {
    Ok(representation_data_path(aip_id, representation_id)?
        .join(directory_path)?
        .child(file_id)?)
}

pub fn agents_path() -> ModelResult<StoragePath> {
    Ok(StoragePath::container(PRESERVATION_CONTAINER)?.child(AGENTS_DIRECTORY)?)
}

/// Where a preservation artifact lives, by type and scope.
pub fn preservation_metadata_path(pm: &PreservationMetadata) -> ModelResult<StoragePath> {
    let file_name = |name: &str| format!("{name}{PRESERVATION_SUFFIX}");
    let require = |value: &Option<String>, what: &str| {
        value.clone().ok_or_else(|| {
            ModelError::RequestNotValid(format!(
                "{:?} preservation metadata {} needs {what}",
                pm.metadata_type, pm.id
            ))
        })
    };

    match pm.metadata_type {
        PreservationMetadataType::Agent => Ok(agents_path()?.child(&file_name(&pm.id))?),
        PreservationMetadataType::Event => {
            let aip_id = require(&pm.aip_id, "an AIP")?;
            let base = match &pm.representation_id {
                Some(rep) => representation_preservation_path(&aip_id, rep)?,
                None => aip_preservation_path(&aip_id)?,
            };
            Ok(base.join(&[pm.metadata_type.directory(), file_name(&pm.id).as_str()])?)
        }
        PreservationMetadataType::ObjectRepresentation => {
            let aip_id = require(&pm.aip_id, "an AIP")?;
            let rep = require(&pm.representation_id, "a representation")?;
            Ok(representation_preservation_path(&aip_id, &rep)?
                .join(&[pm.metadata_type.directory(), file_name(&rep).as_str()])?)
        }
        PreservationMetadataType::ObjectFile => {
            let aip_id = require(&pm.aip_id, "an AIP")?;
            let rep = require(&pm.representation_id, "a representation")?;
            let file_id = require(&pm.file_id, "a file")?;
            Ok(representation_preservation_path(&aip_id, &rep)?
                .child(pm.metadata_type.directory())?
                .join(&pm.file_directory_path)?
                .child(&file_name(&file_id))?)
        }
    }
}

/// Where an other-metadata artifact lives.
pub fn other_metadata_path(om: &OtherMetadata) -> ModelResult<StoragePath> {
    match (&om.representation_id, &om.file_id) {
        (None, _) => Ok(aip_other_metadata_path(&om.aip_id, &om.metadata_type)?
            .child(&format!("{}{}", om.aip_id, om.file_suffix))?),
        (Some(rep), None) => Ok(representation_other_metadata_path(&om.aip_id, rep, &om.metadata_type)?
            .child(&format!("{rep}{}", om.file_suffix))?),
        (Some(rep), Some(file_id)) => Ok(representation_other_metadata_path(&om.aip_id, rep, &om.metadata_type)?
            .join(&om.file_directory_path)?
            .child(&format!("{file_id}{}", om.file_suffix))?),
    }
}

pub fn job_path(job_id: &str) -> ModelResult<StoragePath> {
    Ok(StoragePath::container(JOB_CONTAINER)?.child(&format!("{job_id}{JSON_SUFFIX}"))?)
}

pub fn job_report_path(job_id: &str, aip_id: &str) -> ModelResult<StoragePath> {
    let id = job_report_id(job_id, aip_id);
    Ok(StoragePath::container(JOB_REPORT_CONTAINER)?.child(&format!("{id}{JSON_SUFFIX}"))?)
}

/// Archived action log file.
pub fn log_path(file_name: &str) -> ModelResult<StoragePath> {
    Ok(StoragePath::container(ACTIONLOG_CONTAINER)?.child(file_name)?)
}
