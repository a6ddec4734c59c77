use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Created,
    Started,
    Completed,
    Failed,
}

/// A background job, as persisted at `job/<id>.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    pub username: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub state: JobState,
    pub completion_percentage: u8,
    pub plugin: String,
    #[serde(default)]
    pub plugin_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub object_ids: Vec<String>,
}

impl Job {
    pub fn new(id: &str, name: &str, username: &str, plugin: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            username: username.into(),
            start_date: Utc::now(),
            end_date: None,
            state: JobState::Created,
            completion_percentage: 0,
            plugin: plugin.into(),
            plugin_parameters: BTreeMap::new(),
            object_ids: Vec::new(),
        }
    }
}

/// Outcome of one job on one AIP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    /// Always `<jobId>-<aipId>`.
    pub id: String,
    pub job_id: String,
    pub aip_id: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub completion_percentage: u8,
    #[serde(default)]
    pub report: String,
}

impl JobReport {
    pub fn new(job_id: &str, aip_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: job_report_id(job_id, aip_id),
            job_id: job_id.into(),
            aip_id: aip_id.into(),
            date_created: now,
            date_updated: now,
            completion_percentage: 0,
            report: String::new(),
        }
    }
}

/// Composite id of the report of `job_id` on `aip_id`.
pub fn job_report_id(job_id: &str, aip_id: &str) -> String {
    format!("{job_id}-{aip_id}")
}
