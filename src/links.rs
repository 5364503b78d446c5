//! HAL `_links` derivation for task and stage resources.
//!
//! Link predicates are re-evaluated from current state on every call; links
//! are never cached across renders.

use crate::outcome::Payload;
use crate::resource::{StageResource, StageState, TaskResource};
use serde_json::{json, Value};

/// Derives ordered `rel -> {href}` link maps from resource state.
#[derive(Debug, Clone, Copy)]
pub struct LinkBuilder<'a> {
    base_url: &'a str,
    task_id: &'a str,
}

impl<'a> LinkBuilder<'a> {
    /// Creates a builder rooted at the given base URL and task id.
    #[must_use]
    pub fn new(base_url: &'a str, task_id: &'a str) -> Self {
        Self { base_url, task_id }
    }

    /// Builds the link map for a task resource.
    ///
    /// Always contains `self` and `stages`. `start` is present unless every
    /// stage succeeded, `retry` when any stage failed, and `next_stage`
    /// points at the first not-yet-performed stage if one exists.
    #[must_use]
    pub fn task_links(&self, resource: &TaskResource) -> Payload {
        let mut links = Payload::new();
        links.insert("self".to_string(), link(self.task_path()));
        links.insert("stages".to_string(), link(format!("{}/stages", self.task_path())));

        if !resource.all_successful() {
            links.insert("start".to_string(), link(format!("{}/start", self.task_path())));
        }

        if resource.any_failed() {
            links.insert("retry".to_string(), link(format!("{}/retry", self.task_path())));
        }

        if let Some(next) = resource.current_stage() {
            links.insert("next_stage".to_string(), link(self.stage_path(&next.name)));
        }

        links
    }

    /// Builds the link map for a stage resource.
    ///
    /// Always contains `self` and `task`. `execute` is present unless the
    /// stage has performed, and `retry` when the stage failed.
    #[must_use]
    pub fn stage_links(&self, resource: &StageResource) -> Payload {
        let mut links = Payload::new();
        links.insert("self".to_string(), link(self.stage_path(&resource.name)));
        links.insert("task".to_string(), link(self.task_path()));

        if !resource.performed {
            links.insert(
                "execute".to_string(),
                link(format!("{}/execute", self.stage_path(&resource.name))),
            );
        }

        if resource.status == StageState::Failure {
            links.insert(
                "retry".to_string(),
                link(format!("{}/retry", self.stage_path(&resource.name))),
            );
        }

        links
    }

    fn task_path(&self) -> String {
        format!("{}/tasks/{}", self.base_url, self.task_id)
    }

    fn stage_path(&self, name: &str) -> String {
        format!("{}/stages/{name}", self.task_path())
    }
}

fn link(href: String) -> Value {
    json!({ "href": href })
}
