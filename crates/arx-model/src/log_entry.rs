use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audited action, appended to the action log as a JSON line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub address: String,
    pub datetime: DateTime<Utc>,
    pub username: String,
    pub action_component: String,
    pub action_method: String,
    pub related_object_id: Option<String>,
    /// Milliseconds.
    pub duration: u64,
    #[serde(default)]
    pub parameters: Vec<LogEntryParameter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryParameter {
    pub name: String,
    pub value: String,
}

impl LogEntry {
    pub fn new(username: &str, action_component: &str, action_method: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address: String::new(),
            datetime: Utc::now(),
            username: username.into(),
            action_component: action_component.into(),
            action_method: action_method.into(),
            related_object_id: None,
            duration: 0,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.push(LogEntryParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}
