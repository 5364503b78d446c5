//! HAL `_embedded` derivation for task resources.

use crate::outcome::Payload;
use crate::resource::TaskResource;
use serde_json::Value;

/// Derives the `_embedded` collections for a task document.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingBuilder<'a> {
    base_url: &'a str,
    task_id: &'a str,
}

impl<'a> EmbeddingBuilder<'a> {
    /// Creates a builder rooted at the given base URL and task id.
    #[must_use]
    pub fn new(base_url: &'a str, task_id: &'a str) -> Self {
        Self { base_url, task_id }
    }

    /// Builds the embedded collections for a task resource.
    ///
    /// A task with stages embeds a `stages` collection of stage HAL
    /// documents (each depth-limited, embedding nothing of its own). When
    /// any stage failed an `errors` collection carries every failure payload
    /// in stage order. Returns an empty map when there is nothing to embed.
    #[must_use]
    pub fn task_embedded(&self, resource: &TaskResource) -> Payload {
        let mut embedded = Payload::new();

        if !resource.stages.is_empty() {
            let stages: Vec<Value> = resource
                .stages
                .iter()
                .map(|stage| stage.to_hal(self.base_url, self.task_id))
                .collect();
            embedded.insert("stages".to_string(), Value::Array(stages));
        }

        if resource.any_failed() {
            let errors: Vec<Value> = resource
                .failed_errors()
                .into_iter()
                .map(|error| Value::Object(error.clone()))
                .collect();
            embedded.insert("errors".to_string(), Value::Array(errors));
        }

        embedded
    }
}
