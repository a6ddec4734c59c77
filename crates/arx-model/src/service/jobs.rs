use arx_store::{ContentPayload, StoragePath};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use super::ModelService;
use crate::error::{ModelError, ModelResult};
use crate::job::{Job, JobReport};
use crate::notify::ModelEvent;
use crate::paths::{job_path, job_report_path};

impl ModelService {
    /// Persist a job. Storage failures are logged, never raised: job
    /// bookkeeping must not block the work it tracks.
    pub fn create_or_update_job(&self, job: &Job) {
        match job_path(&job.id).and_then(|path| self.put_json(&path, job)) {
            Ok(()) => debug!(job_id = %job.id, "persisted job"),
            Err(e) => error!(job_id = %job.id, error = %e, "could not persist job"),
        }
        self.publish(true, ModelEvent::JobCreatedOrUpdated(job.clone()));
    }

    pub fn retrieve_job(&self, job_id: &str) -> ModelResult<Job> {
        self.get_json(&job_path(job_id)?)
    }

    /// Persist a job report, best-effort like [`create_or_update_job`].
    ///
    /// [`create_or_update_job`]: ModelService::create_or_update_job
    pub fn create_or_update_job_report(&self, report: &JobReport) {
        match job_report_path(&report.job_id, &report.aip_id).and_then(|path| self.put_json(&path, report)) {
            Ok(()) => debug!(job_report_id = %report.id, "persisted job report"),
            Err(e) => error!(job_report_id = %report.id, error = %e, "could not persist job report"),
        }
        self.publish(true, ModelEvent::JobReportCreatedOrUpdated(report.clone()));
    }

    pub fn retrieve_job_report(&self, job_id: &str, aip_id: &str) -> ModelResult<JobReport> {
        self.get_json(&job_report_path(job_id, aip_id)?)
    }

    fn put_json<T: Serialize>(&self, path: &StoragePath, value: &T) -> ModelResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| ModelError::wrap(format!("serializing {path}"), e))?;
        self.storage
            .update_binary_content(path, &ContentPayload::from(bytes), false, true)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &StoragePath) -> ModelResult<T> {
        let binary = self.storage.get_binary(path)?;
        let bytes = binary
            .content
            .read_all()
            .map_err(|e| ModelError::wrap(format!("reading {path}"), e))?;
        serde_json::from_slice(&bytes).map_err(|e| ModelError::wrap(format!("parsing {path}"), e))
    }
}
