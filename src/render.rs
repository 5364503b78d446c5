//! The fixed five-stage rendering pipeline.
//!
//! Rendering is itself a [`Task`]: validate, resolve links, build embedded
//! collections, serialize the HAL document, finalize the response. The
//! pipeline obeys the same fail-fast contract as any other task, so a
//! validation failure short-circuits before any link or embedding work runs.

use crate::embedding::EmbeddingBuilder;
use crate::links::LinkBuilder;
use crate::outcome::{self, Payload, StageOutcome};
use crate::resource::{RenderOptions, TaskResource};
use crate::stage::Stage;
use crate::task::Task;
use serde_json::{json, Value};

pub(crate) const TASK_RESOURCE_KEY: &str = "task_resource";
pub(crate) const OPTIONS_KEY: &str = "options";
pub(crate) const LINKS_KEY: &str = "links";
pub(crate) const EMBEDDED_KEY: &str = "embedded";
pub(crate) const HAL_DOCUMENT_KEY: &str = "hal_document";
pub(crate) const RESPONSE_KEY: &str = "response";

/// The HAL media type stamped on every finalized response.
pub const HAL_CONTENT_TYPE: &str = "application/hal+json";

/// A task pre-wired with the five rendering stages and a context seeded with
/// the resource snapshot and render options.
#[derive(Debug)]
pub struct RenderingTask {
    inner: Task,
}

impl RenderingTask {
    /// Builds the rendering pipeline for the given resource snapshot.
    ///
    /// A missing resource is not rejected here; the validation stage reports
    /// it as the pipeline's first failure.
    #[must_use]
    pub fn new(resource: Option<&TaskResource>, options: &RenderOptions) -> Self {
        let mut context = Payload::new();
        if let Some(value) = resource.and_then(|r| serde_json::to_value(r).ok()) {
            context.insert(TASK_RESOURCE_KEY.to_string(), value);
        }
        if let Ok(value) = serde_json::to_value(options) {
            context.insert(OPTIONS_KEY.to_string(), value);
        }

        let mut inner = Task::with_context(context);
        inner
            .add(validation_stage())
            .add(link_resolution_stage())
            .add(embedding_stage())
            .add(serialization_stage())
            .add(response_stage());

        Self { inner }
    }

    /// Runs the pipeline, fail-fast.
    pub fn run(&mut self) -> StageOutcome {
        self.inner.run()
    }

    /// Returns the underlying task, for inspecting pipeline state.
    #[must_use]
    pub fn task(&self) -> &Task {
        &self.inner
    }
}

fn resource_from(ctx: &Payload) -> Result<TaskResource, Payload> {
    let raw = ctx
        .get(TASK_RESOURCE_KEY)
        .ok_or_else(|| outcome::error("No task resource provided"))?;
    serde_json::from_value(raw.clone())
        .map_err(|_| outcome::error("Task resource must expose a stage sequence"))
}

fn options_from(ctx: &Payload) -> RenderOptions {
    ctx.get(OPTIONS_KEY)
        .and_then(|raw| serde_json::from_value(raw.clone()).ok())
        .unwrap_or_default()
}

fn validation_stage() -> Stage {
    Stage::new("validation", |ctx| {
        resource_from(ctx)?;
        Ok(outcome::value("validated", json!(true)))
    })
}

fn link_resolution_stage() -> Stage {
    Stage::new("link_resolution", |ctx| {
        let resource = resource_from(ctx)?;
        let options = options_from(ctx);
        let links = LinkBuilder::new(&options.base_url, &options.task_id).task_links(&resource);
        Ok(outcome::value(LINKS_KEY, Value::Object(links)))
    })
}

fn embedding_stage() -> Stage {
    Stage::new("embedding", |ctx| {
        let resource = resource_from(ctx)?;
        let options = options_from(ctx);
        let embedded = if options.include_embedded {
            EmbeddingBuilder::new(&options.base_url, &options.task_id).task_embedded(&resource)
        } else {
            Payload::new()
        };
        Ok(outcome::value(EMBEDDED_KEY, Value::Object(embedded)))
    })
}

fn serialization_stage() -> Stage {
    Stage::new("serialization", |ctx| {
        let resource = resource_from(ctx)?;
        let options = options_from(ctx);

        let mut doc = Payload::new();
        doc.insert(
            "_links".to_string(),
            ctx.get(LINKS_KEY).cloned().unwrap_or_else(|| json!({})),
        );

        // _embedded only appears when there is something to embed.
        if let Some(Value::Object(embedded)) = ctx.get(EMBEDDED_KEY) {
            if !embedded.is_empty() {
                doc.insert("_embedded".to_string(), Value::Object(embedded.clone()));
            }
        }

        doc.insert("status".to_string(), json!(resource.status()));
        doc.insert("total_stages".to_string(), json!(resource.stages.len()));

        if let Some(current) = resource.current_stage() {
            doc.insert("current_stage".to_string(), json!(current.name));
        }

        let completed = resource.completed_stages();
        if !completed.is_empty() {
            doc.insert("completed_stages".to_string(), json!(completed));
        }

        let failed = resource.failed_stages();
        if !failed.is_empty() {
            doc.insert("failed_stages".to_string(), json!(failed));
        }

        if let Some(created_at) = options.created_at {
            doc.insert("created_at".to_string(), json!(created_at));
        }
        if let Some(updated_at) = options.updated_at {
            doc.insert("updated_at".to_string(), json!(updated_at));
        }

        Ok(outcome::value(HAL_DOCUMENT_KEY, Value::Object(doc)))
    })
}

fn response_stage() -> Stage {
    Stage::new("response", |ctx| {
        let resource = resource_from(ctx)?;
        let body = ctx
            .get(HAL_DOCUMENT_KEY)
            .cloned()
            .ok_or_else(|| outcome::error("No HAL document to finalize"))?;

        let mut response = Payload::new();
        response.insert("body".to_string(), body);
        response.insert(
            "content_type".to_string(),
            Value::String(HAL_CONTENT_TYPE.to_string()),
        );
        response.insert("status".to_string(), json!(resource.http_status()));

        Ok(outcome::value(RESPONSE_KEY, Value::Object(response)))
    })
}
