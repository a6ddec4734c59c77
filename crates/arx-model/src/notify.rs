//! Change notifications for downstream consumers (indexers, caches).
//!
//! Observers are registered explicitly on a [`NotificationBus`] that the
//! model service owns. Delivery is synchronous and in registration order.
//! A failing or panicking observer is logged and counted but never fails
//! the operation that produced the event, nor stops delivery to the
//! observers after it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, warn};

use crate::aip::{Aip, DescriptiveMetadata, Representation};
use crate::file::File;
use crate::job::{Job, JobReport};
use crate::log_entry::LogEntry;
use crate::metadata::{OtherMetadata, PreservationMetadata};
use crate::user::{Group, User};

/// Something changed in the repository.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    AipCreated(Aip),
    AipUpdated(Aip),
    AipDeleted { aip_id: String },

    DescriptiveMetadataCreated(DescriptiveMetadata),
    DescriptiveMetadataUpdated(DescriptiveMetadata),
    DescriptiveMetadataDeleted { aip_id: String, descriptive_metadata_id: String },

    RepresentationCreated(Representation),
    RepresentationUpdated(Representation),
    RepresentationDeleted { aip_id: String, representation_id: String },

    FileCreated(File),
    FileUpdated(File),
    FileDeleted {
        aip_id: String,
        representation_id: String,
        directory_path: Vec<String>,
        file_id: String,
    },

    PreservationMetadataCreated(PreservationMetadata),
    PreservationMetadataUpdated(PreservationMetadata),
    PreservationMetadataDeleted(PreservationMetadata),

    OtherMetadataCreated(OtherMetadata),

    LogEntryCreated(LogEntry),

    UserCreated(User),
    UserUpdated(User),
    UserDeleted { user_id: String },
    GroupCreated(Group),
    GroupUpdated(Group),
    GroupDeleted { group_id: String },

    JobCreatedOrUpdated(Job),
    JobReportCreatedOrUpdated(JobReport),
}

impl ModelEvent {
    /// Short stable name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AipCreated(_) => "aip_created",
            Self::AipUpdated(_) => "aip_updated",
            Self::AipDeleted { .. } => "aip_deleted",
            Self::DescriptiveMetadataCreated(_) => "descriptive_metadata_created",
            Self::DescriptiveMetadataUpdated(_) => "descriptive_metadata_updated",
            Self::DescriptiveMetadataDeleted { .. } => "descriptive_metadata_deleted",
            Self::RepresentationCreated(_) => "representation_created",
            Self::RepresentationUpdated(_) => "representation_updated",
            Self::RepresentationDeleted { .. } => "representation_deleted",
            Self::FileCreated(_) => "file_created",
            Self::FileUpdated(_) => "file_updated",
            Self::FileDeleted { .. } => "file_deleted",
            Self::PreservationMetadataCreated(_) => "preservation_metadata_created",
            Self::PreservationMetadataUpdated(_) => "preservation_metadata_updated",
            Self::PreservationMetadataDeleted(_) => "preservation_metadata_deleted",
            Self::OtherMetadataCreated(_) => "other_metadata_created",
            Self::LogEntryCreated(_) => "log_entry_created",
            Self::UserCreated(_) => "user_created",
            Self::UserUpdated(_) => "user_updated",
            Self::UserDeleted { .. } => "user_deleted",
            Self::GroupCreated(_) => "group_created",
            Self::GroupUpdated(_) => "group_updated",
            Self::GroupDeleted { .. } => "group_deleted",
            Self::JobCreatedOrUpdated(_) => "job_created_or_updated",
            Self::JobReportCreatedOrUpdated(_) => "job_report_created_or_updated",
        }
    }
}

/// Error type observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber to model events.
pub trait ModelObserver: Send + Sync {
    fn on_event(&self, event: &ModelEvent) -> Result<(), ObserverError>;
}

impl<F> ModelObserver for F
where
    F: Fn(&ModelEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &ModelEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Delivery summary of one published event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Observer name and error message, per failed delivery.
    pub failed: Vec<(String, String)>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Named, ordered set of observers.
#[derive(Default)]
pub struct NotificationBus {
    observers: RwLock<Vec<(String, Arc<dyn ModelObserver>)>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. A second observer under the same name replaces
    /// the first one in place.
    pub fn subscribe(&self, name: &str, observer: Arc<dyn ModelObserver>) {
        let mut observers = self.observers.write().expect("lock poisoned");
        match observers.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = observer,
            None => observers.push((name.to_string(), observer)),
        }
    }

    /// Remove an observer; `true` if it was registered.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let mut observers = self.observers.write().expect("lock poisoned");
        let before = observers.len();
        observers.retain(|(n, _)| n != name);
        before != observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every observer, in registration order.
    pub fn publish(&self, event: &ModelEvent) -> PublishReport {
        // Snapshot so observers may (un)subscribe from inside a callback.
        let observers: Vec<_> = self.observers.read().expect("lock poisoned").clone();
        let mut report = PublishReport::default();
        for (name, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(observer = %name, event = event.kind(), error = %e, "observer failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(observer = %name, event = event.kind(), panic = %message, "observer panicked");
                    report.failed.push((name, format!("panicked: {message}")));
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let observers = self.observers.read().expect("lock poisoned");
        f.debug_struct("NotificationBus")
            .field("observers", &observers.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// Observer that records every event it receives. Handy in tests and for
/// batching consumers.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: std::sync::Mutex<Vec<ModelEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ModelEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(ModelEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }
}

impl ModelObserver for EventRecorder {
    fn on_event(&self, event: &ModelEvent) -> Result<(), ObserverError> {
        self.events.lock().expect("lock poisoned").push(event.clone());
        Ok(())
    }
}
