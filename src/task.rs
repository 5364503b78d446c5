//! Task: ordered, fail-fast orchestration of stages over a shared context.

use crate::outcome::{self, Payload, StageOutcome};
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, error, warn};

/// The derived status of a task, evaluated as an ordered cascade over its
/// stage outcomes. First matching rule wins: all successful, any failed, any
/// performed, otherwise pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Every stage performed and succeeded.
    Completed,
    /// At least one stage performed and failed.
    Failed,
    /// At least one stage performed, none failed, not all succeeded.
    Running,
    /// No stage has performed yet.
    Pending,
}

impl TaskStatus {
    /// Derives the status from aggregate predicates.
    #[must_use]
    pub fn from_flags(all_successful: bool, any_failed: bool, any_performed: bool) -> Self {
        if all_successful {
            Self::Completed
        } else if any_failed {
            Self::Failed
        } else if any_performed {
            Self::Running
        } else {
            Self::Pending
        }
    }

    /// Maps the status to an HTTP status code.
    ///
    /// Partial progress without failure reports 202; a pending task with no
    /// executed stages still reports 200.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Completed | Self::Pending => 200,
            Self::Failed => 500,
            Self::Running => 202,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Running => write!(f, "running"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// An ordered, fail-fast sequence of stages sharing one mutable context.
///
/// Stages execute in insertion order. A stage's success payload is merged
/// into the context (later keys overwrite earlier ones) and is therefore
/// visible to every later stage. The first failure aborts the remainder of
/// the run.
#[derive(Debug, Default)]
pub struct Task {
    stages: Vec<Stage>,
    context: Payload,
}

impl Task {
    /// Creates an empty task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a task with a pre-seeded context.
    #[must_use]
    pub fn with_context(context: Payload) -> Self {
        Self {
            stages: Vec::new(),
            context,
        }
    }

    /// Appends a stage; returns the task for fluent chaining.
    ///
    /// Duplicate names are permitted but logged, since link derivation
    /// addresses stages by name and will resolve to the first occurrence.
    pub fn add(&mut self, stage: Stage) -> &mut Self {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            warn!(
                stage = %stage.name(),
                "duplicate stage name; links will address the first occurrence"
            );
        }
        self.stages.push(stage);
        self
    }

    /// Returns the stages in insertion order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &Payload {
        &self.context
    }

    /// Runs the stages in insertion order, fail-fast.
    ///
    /// Each success payload is merged into the context before the next stage
    /// executes. The first failure stops the run; later stages remain
    /// unperformed and the failure is wrapped with the aborting stage's name
    /// and the inner payload under `details`.
    ///
    /// Re-running is resumable: stages that already hold an outcome return it
    /// from cache without re-invoking their work.
    pub fn run(&mut self) -> StageOutcome {
        for index in 0..self.stages.len() {
            let name = self.stages[index].name().to_string();
            let produced = self.stages[index].execute(&self.context);

            match produced {
                Ok(payload) => {
                    debug!(stage = %name, "stage succeeded");
                    outcome::merge(&mut self.context, payload);
                }
                Err(details) => {
                    error!(stage = %name, "task aborted at failing stage");
                    return Err(Self::failure(&name, details));
                }
            }
        }

        Ok(self.completion(self.stages.iter().map(Stage::name)))
    }

    /// Runs the stages with a caller-supplied router choosing the next index
    /// after each success.
    ///
    /// The router receives the success payload and the current index and
    /// returns the index to run next; returning an index at or past the end
    /// terminates the run. The fail-fast contract is unchanged. The success
    /// payload's `completed` list holds performed stage names only, in
    /// insertion order.
    pub fn run_conditional<F>(&mut self, next: F) -> StageOutcome
    where
        F: Fn(&Payload, usize) -> usize,
    {
        let mut index = 0;

        while index < self.stages.len() {
            let name = self.stages[index].name().to_string();
            let produced = self.stages[index].execute(&self.context);

            match produced {
                Ok(payload) => {
                    debug!(stage = %name, "stage succeeded");
                    index = next(&payload, index);
                    outcome::merge(&mut self.context, payload);
                }
                Err(details) => {
                    error!(stage = %name, "task aborted at failing stage");
                    return Err(Self::failure(&name, details));
                }
            }
        }

        Ok(self.completion(
            self.stages
                .iter()
                .filter(|stage| stage.performed())
                .map(Stage::name),
        ))
    }

    fn failure(name: &str, details: Payload) -> Payload {
        let mut payload = outcome::error(format!("Task failed at stage: {name}"));
        payload.insert("stage".to_string(), Value::String(name.to_string()));
        payload.insert("details".to_string(), Value::Object(details));
        payload
    }

    fn completion<'a>(&self, names: impl Iterator<Item = &'a str>) -> Payload {
        let mut payload = outcome::value("completed", json!(names.collect::<Vec<_>>()));
        payload.insert("context".to_string(), Value::Object(self.context.clone()));
        payload
    }

    /// Returns true if every stage performed and succeeded.
    ///
    /// Recomputed on each call, never cached.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.stages.iter().all(Stage::succeeded)
    }

    /// Returns true if at least one stage performed and failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.stages.iter().any(Stage::failed)
    }

    /// Returns true if at least one stage has performed.
    #[must_use]
    pub fn any_performed(&self) -> bool {
        self.stages.iter().any(Stage::performed)
    }

    /// Derives the task status from current stage outcomes.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_flags(self.all_successful(), self.any_failed(), self.any_performed())
    }

    /// Returns the success payloads of succeeded stages, in stage order.
    #[must_use]
    pub fn successful_results(&self) -> Vec<&Payload> {
        self.stages.iter().filter_map(Stage::value).collect()
    }

    /// Returns the failure payloads of failed stages, in stage order.
    #[must_use]
    pub fn failed_results(&self) -> Vec<&Payload> {
        self.stages.iter().filter_map(Stage::error).collect()
    }
}
