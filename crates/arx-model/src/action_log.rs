//! Append-only action log with daily rollover.
//!
//! Entries for the current day are appended as JSON lines to
//! `<directory>/<yyyy-MM-dd>.log`. When the first entry of a new day
//! arrives, every older day-file in the directory is moved into the
//! `actionlog` container as an immutable binary and removed locally. The
//! rollover scan and archive run under the same mutex as appends, so no
//! entry is written to a file that is being archived.
//!
//! Clones of an [`ActionLog`] share that mutex. Every writer of one
//! directory in a process must be a clone of the same log; two logs built
//! separately over one directory can both archive the same day-file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arx_store::{ContentPayload, StorageService};
use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info};

use crate::error::{ModelError, ModelResult};
use crate::log_entry::LogEntry;
use crate::paths::{log_path, LOG_SUFFIX};

/// Outcome of archiving old day-files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub archived: Vec<String>,
    pub failed: Vec<String>,
}

struct CurrentFile {
    date: NaiveDate,
    file: fs::File,
}

/// Writer of the action log. Cheap to clone; clones append through one
/// shared writer.
#[derive(Clone)]
pub struct ActionLog {
    directory: PathBuf,
    storage: Arc<dyn StorageService>,
    current: Arc<Mutex<Option<CurrentFile>>>,
}

impl ActionLog {
    /// Construction performs no I/O; the directory is created on first
    /// append.
    pub fn new(directory: impl Into<PathBuf>, storage: Arc<dyn StorageService>) -> Self {
        Self {
            directory: directory.into(),
            storage,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Append `entry` to today's file.
    pub fn append(&self, entry: &LogEntry) -> ModelResult<()> {
        self.append_on(Utc::now().date_naive(), entry)
    }

    /// Append `entry` to the file of `date`, rolling over first if needed.
    pub fn append_on(&self, date: NaiveDate, entry: &LogEntry) -> ModelResult<()> {
        let mut line = serde_json::to_vec(entry).map_err(|e| ModelError::wrap("serializing log entry", e))?;
        line.push(b'\n');

        let mut current = self.current.lock().expect("lock poisoned");
        if current.as_ref().map(|c| c.date) != Some(date) {
            *current = None;
            fs::create_dir_all(&self.directory)
                .map_err(|e| ModelError::wrap(format!("creating {}", self.directory.display()), e))?;
            let name = file_name(date);
            let path = self.directory.join(&name);
            if !path.exists() {
                self.archive_old(&name);
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| ModelError::wrap(format!("opening {}", path.display()), e))?;
            debug!(path = %path.display(), "action log rolled over");
            *current = Some(CurrentFile { date, file });
        }

        if let Some(current) = current.as_mut() {
            current
                .file
                .write_all(&line)
                .and_then(|()| current.file.flush())
                .map_err(|e| ModelError::wrap("appending to action log", e))?;
        }
        Ok(())
    }

    /// Move every day-file except `keep` into storage.
    ///
    /// Failures are logged and reported; they never fail the append that
    /// triggered the rollover.
    fn archive_old(&self, keep: &str) -> ArchiveReport {
        let mut report = ArchiveReport::default();
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                error!(directory = %self.directory.display(), error = %e, "could not scan action log directory");
                return report;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name != keep && name.ends_with(LOG_SUFFIX))
            .collect();
        names.sort();

        for name in names {
            let local = self.directory.join(&name);
            let archived = log_path(&name).and_then(|target| {
                self.storage
                    .create_binary(&target, &ContentPayload::from_path(&local), false)
                    .map_err(ModelError::from)
            });
            match archived.and_then(|_| {
                fs::remove_file(&local).map_err(|e| ModelError::wrap(format!("removing {}", local.display()), e))
            }) {
                Ok(()) => {
                    info!(file = %name, "archived action log");
                    report.archived.push(name);
                }
                Err(e) => {
                    error!(file = %name, error = %e, "could not archive action log");
                    report.failed.push(name);
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLog").field("directory", &self.directory).finish()
    }
}

/// `yyyy-MM-dd.log`.
pub fn file_name(date: NaiveDate) -> String {
    format!("{}{LOG_SUFFIX}", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_store::{InMemoryStorage, StoragePath};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn storage_with_container() -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        storage.create_container(&StoragePath::parse("actionlog").unwrap()).unwrap();
        storage
    }

    #[test]
    fn entries_are_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ActionLog::new(tmp.path(), storage_with_container());
        log.append_on(day(1), &LogEntry::new("alice", "aip", "create")).unwrap();
        log.append_on(day(1), &LogEntry::new("alice", "aip", "delete")).unwrap();

        let text = fs::read_to_string(tmp.path().join("2026-10-01.log")).unwrap();
        let entries: Vec<LogEntry> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action_method, "delete");
    }

    #[test]
    fn rollover_archives_previous_days() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage_with_container();
        let log = ActionLog::new(tmp.path(), storage.clone());
        log.append_on(day(1), &LogEntry::new("alice", "aip", "create")).unwrap();
        log.append_on(day(2), &LogEntry::new("bob", "aip", "update")).unwrap();

        assert!(!tmp.path().join("2026-10-01.log").exists());
        assert!(tmp.path().join("2026-10-02.log").exists());
        let archived = storage
            .get_binary(&StoragePath::parse("actionlog/2026-10-01.log").unwrap())
            .unwrap();
        let text = archived.content.read_to_string().unwrap();
        assert!(text.contains("\"username\":\"alice\""));
    }

    #[test]
    fn existing_day_file_is_appended_without_rollover() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2026-10-01.log"), "").unwrap();
        fs::write(tmp.path().join("2026-10-02.log"), "").unwrap();
        let storage = storage_with_container();
        let log = ActionLog::new(tmp.path(), storage.clone());
        log.append_on(day(2), &LogEntry::new("alice", "aip", "create")).unwrap();
        // Day 2 already existed, so no scan happened.
        assert!(tmp.path().join("2026-10-01.log").exists());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn archive_failure_keeps_local_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2026-10-01.log"), "old\n").unwrap();
        // No actionlog container: archiving fails.
        let log = ActionLog::new(tmp.path(), Arc::new(InMemoryStorage::new()));
        log.append_on(day(2), &LogEntry::new("alice", "aip", "create")).unwrap();
        assert!(tmp.path().join("2026-10-01.log").exists());
    }

    #[test]
    fn clones_roll_over_once() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2026-10-01.log"), "old\n").unwrap();
        let storage = storage_with_container();
        let log = ActionLog::new(tmp.path(), storage.clone());

        std::thread::scope(|scope| {
            for i in 0..8 {
                let writer = log.clone();
                scope.spawn(move || {
                    writer
                        .append_on(day(2), &LogEntry::new(&format!("user{i}"), "aip", "create"))
                        .unwrap();
                });
            }
        });

        assert!(!tmp.path().join("2026-10-01.log").exists());
        let archived = storage
            .get_binary(&StoragePath::parse("actionlog/2026-10-01.log").unwrap())
            .unwrap();
        assert_eq!(archived.content.read_to_string().unwrap(), "old\n");
        assert_eq!(storage.len(), 1);
        let text = fs::read_to_string(tmp.path().join("2026-10-02.log")).unwrap();
        assert_eq!(text.lines().count(), 8);
    }

    #[test]
    fn archive_report_lists_outcomes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2026-09-30.log"), "a\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        let log = ActionLog::new(tmp.path(), storage_with_container());
        let report = log.archive_old("2026-10-01.log");
        assert_eq!(report.archived, vec!["2026-09-30.log".to_string()]);
        assert!(report.failed.is_empty());
        assert!(tmp.path().join("notes.txt").exists());
    }
}
