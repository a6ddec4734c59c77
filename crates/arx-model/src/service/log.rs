use super::ModelService;
use crate::error::{ModelError, ModelResult};
use crate::log_entry::LogEntry;
use crate::notify::ModelEvent;

impl ModelService {
    /// Append an entry to the action log.
    pub fn add_log_entry(&self, entry: &LogEntry, notify: bool) -> ModelResult<()> {
        let log = self
            .action_log
            .as_ref()
            .ok_or_else(|| ModelError::generic("no action log directory configured"))?;
        log.append(entry)?;
        self.publish(notify, ModelEvent::LogEntryCreated(entry.clone()));
        Ok(())
    }
}
