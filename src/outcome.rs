//! Payload and outcome aliases shared by stages and tasks.
//!
//! Every stage produces exactly one of two variants: a success payload or a
//! failure payload. Both sides are JSON object maps, which keeps stage
//! outcomes, task aggregates, and rendering context entries structurally
//! uniform.

use serde_json::Value;

/// A JSON object payload carried by stage outcomes and task contexts.
///
/// Key order is preserved, so payloads assembled by the rendering layer
/// serialize in the order their entries were inserted.
pub type Payload = serde_json::Map<String, Value>;

/// The outcome of a stage execution: a success payload or a failure payload.
///
/// `Result` is deliberately the representation here — two constructors, no
/// default state, exhaustively matchable.
pub type StageOutcome = Result<Payload, Payload>;

/// Builds a payload holding a single entry.
#[must_use]
pub fn value(key: impl Into<String>, value: Value) -> Payload {
    let mut payload = Payload::new();
    payload.insert(key.into(), value);
    payload
}

/// Builds a failure payload carrying an `error` message.
#[must_use]
pub fn error(message: impl Into<String>) -> Payload {
    value("error", Value::String(message.into()))
}

/// Merges `incoming` into `target`; keys from `incoming` overwrite existing
/// keys of the same name. This is the contract for how stage success payloads
/// accumulate into a task context.
pub fn merge(target: &mut Payload, incoming: Payload) {
    for (key, entry) in incoming {
        target.insert(key, entry);
    }
}
