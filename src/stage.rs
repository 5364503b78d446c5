//! Stage: a named unit of pipeline work with a cached, run-once outcome.

use crate::outcome::{self, Payload, StageOutcome};
use serde_json::{json, Value};
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

type WorkFn = Box<dyn Fn(&Payload) -> StageOutcome>;
type PreconditionFn = Box<dyn Fn(&Payload) -> bool>;

/// The number of backtrace lines captured when a work closure panics.
const TRACE_LINES: usize = 5;

/// A named unit of work that executes at most once.
///
/// The work closure is injected at construction and must return a
/// [`StageOutcome`]. Once an outcome exists it is permanent: re-invoking
/// [`execute`](Stage::execute) returns the cached outcome without touching
/// the work closure again, which makes `execute` safe to call from multiple
/// call sites without duplicating side effects.
pub struct Stage {
    name: String,
    outcome: Option<StageOutcome>,
    precondition: PreconditionFn,
    work: WorkFn,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("performed", &self.performed())
            .finish()
    }
}

impl Stage {
    /// Creates a stage with the given name and work closure.
    ///
    /// The default precondition always passes.
    pub fn new(
        name: impl Into<String>,
        work: impl Fn(&Payload) -> StageOutcome + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            outcome: None,
            precondition: Box::new(|_ctx| true),
            work: Box::new(work),
        }
    }

    /// Replaces the precondition predicate.
    ///
    /// If the predicate returns false at execution time the stage declines
    /// to run and records a precondition failure as its outcome.
    #[must_use]
    pub fn with_precondition(mut self, predicate: impl Fn(&Payload) -> bool + 'static) -> Self {
        self.precondition = Box::new(predicate);
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the stage against the given context.
    ///
    /// Returns the cached outcome if the stage has already performed.
    /// Otherwise evaluates the precondition, invokes the work closure, and
    /// stores whatever outcome was produced as the permanent result. A panic
    /// inside the work closure is caught here and converted into a failure
    /// payload carrying the message, the stage name, and a short trace
    /// fragment.
    pub fn execute(&mut self, ctx: &Payload) -> StageOutcome {
        if let Some(cached) = &self.outcome {
            return cached.clone();
        }

        debug!(stage = %self.name, "executing stage");

        let produced = if (self.precondition)(ctx) {
            self.invoke_work(ctx)
        } else {
            warn!(stage = %self.name, "preconditions not met");
            Err(outcome::error(format!(
                "Preconditions not met for stage: {}",
                self.name
            )))
        };

        self.outcome = Some(produced.clone());
        produced
    }

    fn invoke_work(&self, ctx: &Payload) -> StageOutcome {
        match catch_unwind(AssertUnwindSafe(|| (self.work)(ctx))) {
            Ok(produced) => produced,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(stage = %self.name, message = %message, "stage work panicked");

                let mut payload = outcome::error(message);
                payload.insert("stage".to_string(), Value::String(self.name.clone()));
                payload.insert("backtrace".to_string(), json!(trace_fragment()));
                Err(payload)
            }
        }
    }

    /// Returns true if the stage has an outcome.
    #[must_use]
    pub fn performed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns true if the stage performed and succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(Ok(_)))
    }

    /// Returns true if the stage performed and failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        matches!(self.outcome, Some(Err(_)))
    }

    /// Returns the stored outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<&StageOutcome> {
        self.outcome.as_ref()
    }

    /// Returns the success payload, if the stage succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&Payload> {
        match &self.outcome {
            Some(Ok(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Returns the failure payload, if the stage failed.
    #[must_use]
    pub fn error(&self) -> Option<&Payload> {
        match &self.outcome {
            Some(Err(payload)) => Some(payload),
            _ => None,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "stage work panicked".to_string()
    }
}

fn trace_fragment() -> Vec<String> {
    Backtrace::force_capture()
        .to_string()
        .lines()
        .take(TRACE_LINES)
        .map(str::to_owned)
        .collect()
}
