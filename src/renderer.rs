//! Renderer facade: one call from a task to an HTTP-shaped HAL response.

use crate::outcome::Payload;
use crate::render::{RenderingTask, RESPONSE_KEY};
use crate::resource::{RenderOptions, TaskResource};
use crate::task::Task;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// An HTTP-shaped render result: body, content type, and status code.
///
/// This is the boundary of the system — handing it to an actual HTTP server
/// is the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The HAL document body.
    pub body: Value,
    /// Always `application/hal+json`.
    pub content_type: String,
    /// The derived HTTP status code.
    pub status: u16,
}

/// A failed render, carrying the pipeline's failure payload unchanged.
#[derive(Debug, Clone, Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    message: String,
    payload: Payload,
}

impl RenderError {
    fn from_payload(payload: Payload) -> Self {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("rendering pipeline failed")
            .to_string();
        Self { message, payload }
    }

    /// Returns the pipeline failure payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consumes the error, returning the failure payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Renders a task snapshot as a HAL response by driving the fixed pipeline.
///
/// Render success is independent of task success: a failed task still
/// renders, producing a `"failed"` document with HTTP status 500.
#[derive(Debug, Clone)]
pub struct Renderer {
    resource: Option<TaskResource>,
    options: RenderOptions,
}

impl Renderer {
    /// Creates a renderer over a snapshot of the given task.
    #[must_use]
    pub fn new(task: &Task, options: RenderOptions) -> Self {
        Self {
            resource: Some(TaskResource::of(task)),
            options,
        }
    }

    /// Creates a renderer over a pre-built resource snapshot.
    #[must_use]
    pub fn from_resource(resource: TaskResource, options: RenderOptions) -> Self {
        Self {
            resource: Some(resource),
            options,
        }
    }

    /// Drives the rendering pipeline and returns the finalized response.
    ///
    /// On pipeline failure the failure payload is returned unchanged inside
    /// a [`RenderError`].
    pub fn render(&self) -> Result<Response, RenderError> {
        let mut pipeline = RenderingTask::new(self.resource.as_ref(), &self.options);

        match pipeline.run() {
            Ok(run) => {
                debug!(task_id = %self.options.task_id, "render completed");
                extract_response(&run)
            }
            Err(failure) => Err(RenderError::from_payload(failure)),
        }
    }

    /// Convenience: just the HAL document, or `None` if the render failed.
    #[must_use]
    pub fn to_hal(&self) -> Option<Value> {
        self.render().ok().map(|response| response.body)
    }

    /// Convenience: the HAL document as a JSON string, or `None` on failure.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        self.to_hal()
            .and_then(|document| serde_json::to_string(&document).ok())
    }
}

fn extract_response(run: &Payload) -> Result<Response, RenderError> {
    run.get("context")
        .and_then(|context| context.get(RESPONSE_KEY))
        .cloned()
        .and_then(|raw| serde_json::from_value(raw).ok())
        .ok_or_else(|| {
            RenderError::from_payload(crate::outcome::error(
                "rendering pipeline produced no response",
            ))
        })
}
