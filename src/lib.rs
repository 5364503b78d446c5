//! # Halrender
//!
//! Fail-fast stage pipelines rendered as HAL hypermedia responses.
//!
//! Halrender provides a small synchronous pipeline model plus a pure
//! rendering layer:
//!
//! - **Stage-based execution**: Named units of work with a cached, run-once
//!   outcome
//! - **Fail-fast orchestration**: A [`Task`](task::Task) runs its stages in
//!   insertion order over one shared context and aborts at the first failure
//! - **State derivation**: Task status and HTTP status are pure functions of
//!   stage outcomes
//! - **HAL rendering**: Links and embedded sub-resources are derived from
//!   task state and assembled into an `application/hal+json` response
//!
//! ## Quick Start
//!
//! ```rust
//! use halrender::prelude::*;
//! use serde_json::json;
//!
//! let mut task = Task::new();
//! task.add(Stage::new("fetch", |_ctx| {
//!     Ok(outcome::value("records", json!(3)))
//! }));
//! task.add(Stage::new("process", |ctx| {
//!     let records = ctx.get("records").cloned().unwrap_or(json!(0));
//!     Ok(outcome::value("processed", records))
//! }));
//!
//! let run = task.run();
//! assert!(run.is_ok());
//!
//! let renderer = Renderer::new(&task, RenderOptions::new("http://api.example.com", "123"));
//! let response = renderer.render().unwrap();
//! assert_eq!(response.status, 200);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod embedding;
pub mod links;
pub mod outcome;
pub mod render;
pub mod renderer;
pub mod resource;
pub mod stage;
pub mod task;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::embedding::EmbeddingBuilder;
    pub use crate::links::LinkBuilder;
    pub use crate::outcome::{self, Payload, StageOutcome};
    pub use crate::render::RenderingTask;
    pub use crate::renderer::{RenderError, Renderer, Response};
    pub use crate::resource::{RenderOptions, StageResource, StageState, TaskResource};
    pub use crate::stage::Stage;
    pub use crate::task::{Task, TaskStatus};
}
