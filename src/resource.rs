//! Read-only resource projections over tasks and stages, plus render options.
//!
//! Resources own no live state: they are snapshots taken per render and are
//! cheap to rebuild, which is what keeps link and embedding derivation pure.

use crate::links::LinkBuilder;
use crate::outcome::Payload;
use crate::stage::Stage;
use crate::task::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The derived state of a single stage within a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// The stage performed and succeeded.
    Success,
    /// The stage performed and failed.
    Failure,
    /// The stage has not performed yet.
    Pending,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// A snapshot of one stage: name, derived state, and its payload if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResource {
    /// The stage name.
    pub name: String,
    /// The derived stage state.
    pub status: StageState,
    /// Whether the stage holds an outcome.
    pub performed: bool,
    /// The success payload, present only for succeeded stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Payload>,
    /// The failure payload, present only for failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Payload>,
}

impl StageResource {
    /// Snapshots the given stage.
    #[must_use]
    pub fn of(stage: &Stage) -> Self {
        let status = if stage.succeeded() {
            StageState::Success
        } else if stage.failed() {
            StageState::Failure
        } else {
            StageState::Pending
        };

        Self {
            name: stage.name().to_string(),
            status,
            performed: stage.performed(),
            value: stage.value().cloned(),
            error: stage.error().cloned(),
        }
    }

    /// Renders the stage as a standalone HAL document.
    ///
    /// Stage documents never embed sub-resources of their own; when a task
    /// embeds its stages this keeps the embedding depth at one.
    #[must_use]
    pub fn to_hal(&self, base_url: &str, task_id: &str) -> Value {
        let mut doc = Payload::new();
        let links = LinkBuilder::new(base_url, task_id).stage_links(self);
        doc.insert("_links".to_string(), Value::Object(links));
        doc.insert("name".to_string(), Value::String(self.name.clone()));
        doc.insert("status".to_string(), Value::String(self.status.to_string()));
        doc.insert("performed".to_string(), Value::Bool(self.performed));

        if let Some(value) = &self.value {
            doc.insert("value".to_string(), Value::Object(value.clone()));
        } else if let Some(error) = &self.error {
            doc.insert("error".to_string(), Value::Object(error.clone()));
        }

        Value::Object(doc)
    }
}

/// A snapshot of a task's stage sequence, taken once per render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResource {
    /// Stage snapshots in task order.
    pub stages: Vec<StageResource>,
}

impl TaskResource {
    /// Snapshots the given task.
    #[must_use]
    pub fn of(task: &Task) -> Self {
        Self {
            stages: task.stages().iter().map(StageResource::of).collect(),
        }
    }

    /// Returns true if every stage performed and succeeded.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.stages
            .iter()
            .all(|stage| stage.status == StageState::Success)
    }

    /// Returns true if at least one stage failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| stage.status == StageState::Failure)
    }

    /// Returns true if at least one stage has performed.
    #[must_use]
    pub fn any_performed(&self) -> bool {
        self.stages.iter().any(|stage| stage.performed)
    }

    /// Returns the first not-yet-performed stage, if one exists.
    #[must_use]
    pub fn current_stage(&self) -> Option<&StageResource> {
        self.stages.iter().find(|stage| !stage.performed)
    }

    /// Returns the names of succeeded stages, in task order.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|stage| stage.status == StageState::Success)
            .map(|stage| stage.name.as_str())
            .collect()
    }

    /// Returns the names of failed stages, in task order.
    #[must_use]
    pub fn failed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|stage| stage.status == StageState::Failure)
            .map(|stage| stage.name.as_str())
            .collect()
    }

    /// Returns the failure payloads of failed stages, in task order.
    #[must_use]
    pub fn failed_errors(&self) -> Vec<&Payload> {
        self.stages
            .iter()
            .filter_map(|stage| stage.error.as_ref())
            .collect()
    }

    /// Derives the task status cascade from the snapshot.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_flags(self.all_successful(), self.any_failed(), self.any_performed())
    }

    /// Derives the HTTP status code for a response carrying this snapshot.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status().http_status()
    }
}

fn default_task_id() -> String {
    "default".to_string()
}

const fn default_include_embedded() -> bool {
    true
}

/// Options controlling a render: where links point and what gets embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Base URL prefixed to every derived href.
    #[serde(default)]
    pub base_url: String,
    /// Task identifier used in derived hrefs.
    #[serde(default = "default_task_id")]
    pub task_id: String,
    /// Whether the document embeds stage sub-resources.
    #[serde(default = "default_include_embedded")]
    pub include_embedded: bool,
    /// Creation timestamp echoed into the document when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Update timestamp echoed into the document when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            task_id: default_task_id(),
            include_embedded: true,
            created_at: None,
            updated_at: None,
        }
    }
}

impl RenderOptions {
    /// Creates options with the given base URL and task id.
    #[must_use]
    pub fn new(base_url: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            task_id: task_id.into(),
            ..Self::default()
        }
    }

    /// Disables embedding of stage sub-resources.
    #[must_use]
    pub fn without_embedded(mut self) -> Self {
        self.include_embedded = false;
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets the update timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{self, Payload};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn performed_task() -> Task {
        let mut task = Task::new();
        task.add(Stage::new("ok", |_ctx| Ok(outcome::value("x", json!(1)))))
            .add(Stage::new("bad", |_ctx| Err(outcome::error("nope"))))
            .add(Stage::new("later", |_ctx| Ok(Payload::new())));
        let _ = task.run();
        task
    }

    #[test]
    fn test_stage_resource_states() {
        let task = performed_task();
        let resource = TaskResource::of(&task);

        assert_eq!(resource.stages[0].status, StageState::Success);
        assert_eq!(resource.stages[0].value, Some(outcome::value("x", json!(1))));
        assert_eq!(resource.stages[1].status, StageState::Failure);
        assert_eq!(resource.stages[1].error, Some(outcome::error("nope")));
        assert_eq!(resource.stages[2].status, StageState::Pending);
        assert!(!resource.stages[2].performed);
    }

    #[test]
    fn test_task_resource_aggregates() {
        let task = performed_task();
        let resource = TaskResource::of(&task);

        assert!(!resource.all_successful());
        assert!(resource.any_failed());
        assert!(resource.any_performed());
        assert_eq!(resource.completed_stages(), vec!["ok"]);
        assert_eq!(resource.failed_stages(), vec!["bad"]);
        assert_eq!(resource.current_stage().map(|s| s.name.as_str()), Some("later"));
        assert_eq!(resource.status(), TaskStatus::Failed);
        assert_eq!(resource.http_status(), 500);
    }

    #[test]
    fn test_stage_to_hal_success() {
        let task = performed_task();
        let resource = TaskResource::of(&task);
        let doc = resource.stages[0].to_hal("http://api.example.com", "42");

        assert_eq!(doc["name"], json!("ok"));
        assert_eq!(doc["status"], json!("success"));
        assert_eq!(doc["performed"], json!(true));
        assert_eq!(doc["value"], json!({"x": 1}));
        assert_eq!(
            doc["_links"]["self"]["href"],
            json!("http://api.example.com/tasks/42/stages/ok")
        );
        assert!(doc.get("error").is_none());
        assert!(doc.get("_embedded").is_none());
    }

    #[test]
    fn test_stage_to_hal_failure_carries_error() {
        let task = performed_task();
        let resource = TaskResource::of(&task);
        let doc = resource.stages[1].to_hal("", "default");

        assert_eq!(doc["status"], json!("failure"));
        assert_eq!(doc["error"], json!({"error": "nope"}));
        assert!(doc.get("value").is_none());
    }

    #[test]
    fn test_options_defaults() {
        let options: RenderOptions = serde_json::from_value(json!({})).unwrap();

        assert_eq!(options.base_url, "");
        assert_eq!(options.task_id, "default");
        assert!(options.include_embedded);
        assert!(options.created_at.is_none());
    }

    #[test]
    fn test_resource_round_trips_through_json() {
        let task = performed_task();
        let resource = TaskResource::of(&task);

        let value = serde_json::to_value(&resource).unwrap();
        let restored: TaskResource = serde_json::from_value(value).unwrap();

        assert_eq!(resource, restored);
    }
}
