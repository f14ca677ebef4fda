//! Mapping of oracle responses onto [`PolicyDecision`].

use serde_json::Value;

use crate::domain::PolicyDecision;

/// Explicit verdict signalled by an oracle response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Allow,
    Block,
}

/// Ordered rules: the first one that matches decides. Allow signals are
/// checked before block signals.
const RULES: [(fn(&Value) -> bool, Signal); 4] = [
    (action_allow, Signal::Allow),
    (allowed_true, Signal::Allow),
    (action_block, Signal::Block),
    (allowed_false, Signal::Block),
];

fn action_allow(value: &Value) -> bool {
    value.get("action").and_then(Value::as_str) == Some("allow")
}

fn allowed_true(value: &Value) -> bool {
    value.get("allowed").and_then(Value::as_bool) == Some(true)
}

fn action_block(value: &Value) -> bool {
    value.get("action").and_then(Value::as_str) == Some("block")
}

fn allowed_false(value: &Value) -> bool {
    value.get("allowed").and_then(Value::as_bool) == Some(false)
}

fn reason_of(value: &Value) -> Option<String> {
    value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Normalize an oracle response. A missing or unrecognized shape is an allow.
pub fn normalize_decision(raw: Option<Value>) -> PolicyDecision {
    let Some(value) = raw.filter(|v| !v.is_null()) else {
        return PolicyDecision::allow(None, None);
    };

    let signal = RULES
        .iter()
        .find(|(matches, _)| matches(&value))
        .map(|(_, signal)| *signal);
    let reason = reason_of(&value);

    match signal {
        Some(Signal::Block) => PolicyDecision::deny(Some(value), reason),
        Some(Signal::Allow) | None => PolicyDecision::allow(Some(value), reason),
    }
}
