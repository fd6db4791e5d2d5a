//! Pipeline state threaded through every stage.
//!
//! A [`PipelineState`] is an ordered map from namespaced keys
//! (`research_findings`, `hook_confidence`, ...) to JSON values, plus the two
//! append-only accumulators `errors` and `messages`. Stages never mutate a
//! state in place: [`PipelineState::merge`] borrows the input and returns a
//! new value, so the orchestrator can keep and retry from any earlier state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StateError;

/// Reserved accumulator of human-readable failures.
pub const ERRORS_KEY: &str = "errors";

/// Reserved accumulator of audit-trail entries.
pub const MESSAGES_KEY: &str = "messages";

fn is_reserved(key: &str) -> bool {
    key == ERRORS_KEY || key == MESSAGES_KEY
}

/// Converts a JSON array of strings, rejecting anything else.
fn string_list(key: &str, value: &Value) -> Result<Vec<String>, StateError> {
    let items = value
        .as_array()
        .ok_or_else(|| StateError::InvalidAccumulator(key.to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| StateError::InvalidAccumulator(key.to_string()))
        })
        .collect()
}

/// Appends `incoming` to `current` without ever dropping entries.
///
/// When `incoming` is `current` plus new entries (the "old list + new item"
/// form) only the new tail is appended; otherwise every entry is appended.
fn append_entries(current: &mut Vec<String>, incoming: Vec<String>) {
    if incoming.starts_with(current) {
        let tail = incoming[current.len()..].to_vec();
        current.extend(tail);
    } else {
        current.extend(incoming);
    }
}

/// The key/value map shared by every stage of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    messages: Vec<String>,
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl PipelineState {
    /// An empty state with empty accumulators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from seed fields.
    ///
    /// # Errors
    ///
    /// `StateError::NotAMapping` if `seed` is not a JSON object, and
    /// `StateError::InvalidAccumulator` if it carries `errors` or `messages`
    /// that are not arrays of strings.
    pub fn create(seed: Value) -> Result<Self, StateError> {
        match seed {
            Value::Object(map) => Self::from_map(map),
            other => Err(StateError::NotAMapping(json_type_name(&other).to_string())),
        }
    }

    /// Builds a state from an already-destructured JSON object.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, StateError> {
        let mut state = Self::new();
        for (key, value) in map {
            match key.as_str() {
                ERRORS_KEY => state.errors = string_list(&key, &value)?,
                MESSAGES_KEY => state.messages = string_list(&key, &value)?,
                _ => {
                    state.values.insert(key, value);
                }
            }
        }
        Ok(state)
    }

    /// Returns a new state with `updates` applied; `self` is left untouched.
    ///
    /// Keys are overwritten wholesale (no deep merge). Entries for `errors`
    /// and `messages` are only ever appended.
    pub fn merge(&self, updates: impl Into<StateUpdate>) -> PipelineState {
        let updates = updates.into();
        let mut next = self.clone();

        for (key, value) in updates.set {
            if is_reserved(&key) {
                match string_list(&key, &value) {
                    Ok(entries) if key == ERRORS_KEY => append_entries(&mut next.errors, entries),
                    Ok(entries) => append_entries(&mut next.messages, entries),
                    Err(_) => {
                        tracing::warn!(key = %key, "Ignoring non-string-list update to reserved key");
                    }
                }
            } else {
                next.values.insert(key, value);
            }
        }
        next.errors.extend(updates.errors);
        next.messages.extend(updates.messages);
        next
    }

    /// True iff every key is present. Falsy values count as present.
    pub fn require(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.contains_key(key))
    }

    /// Keys from `keys` that are absent, in the given order.
    pub fn missing_keys<'k>(&self, keys: &[&'k str]) -> Vec<&'k str> {
        keys.iter()
            .copied()
            .filter(|key| !self.contains_key(key))
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        is_reserved(key) || self.values.contains_key(key)
    }

    /// Value stored under a non-reserved key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Unsigned integer, accepting non-negative floats by truncation.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let value = self.get(key)?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        })
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    /// Text for prompts: strings verbatim, other values as compact JSON.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// `<name>_confidence`, or 0.0 when the stage has not run.
    pub fn confidence(&self, stage: &str) -> f64 {
        self.get_f64(&format!("{}_confidence", stage)).unwrap_or(0.0)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of non-reserved keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-reserved keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Everything written since `base`, as an update that reproduces it.
    ///
    /// Gatekeepers use this to fold a subagent's result into their own state
    /// without copying keys the subagent never touched.
    pub fn changes_since(&self, base: &PipelineState) -> StateUpdate {
        let mut update = StateUpdate::new();
        for (key, value) in &self.values {
            if base.values.get(key) != Some(value) {
                update.set.insert(key.clone(), value.clone());
            }
        }
        update.errors = new_entries(&base.errors, &self.errors);
        update.messages = new_entries(&base.messages, &self.messages);
        update
    }

    /// The whole state as one JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(ERRORS_KEY.to_string(), Value::from(self.errors.clone()));
        map.insert(MESSAGES_KEY.to_string(), Value::from(self.messages.clone()));
        for (key, value) in &self.values {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    pub fn to_json_pretty(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn new_entries(base: &[String], current: &[String]) -> Vec<String> {
    if current.starts_with(base) {
        current[base.len()..].to_vec()
    } else {
        current.to_vec()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A set of writes to apply with [`PipelineState::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    set: BTreeMap<String, Value>,
    errors: Vec<String>,
    messages: Vec<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites `key` with `value`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// Overwrites `key` with the JSON form of `value`.
    ///
    /// Values that cannot be represented as JSON are stored as `null`.
    pub fn set_serialized<T: Serialize>(self, key: impl Into<String>, value: &T) -> Self {
        let key = key.into();
        let json = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Failed to serialize state value");
            Value::Null
        });
        self.set(key, json)
    }

    /// Appends one entry to `errors`.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    /// Appends one entry to `messages`.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    /// Folds another update on top of this one.
    pub fn extend(mut self, other: StateUpdate) -> Self {
        self.set.extend(other.set);
        self.errors.extend(other.errors);
        self.messages.extend(other.messages);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.errors.is_empty() && self.messages.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.set.get(key)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            set: map.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> PipelineState {
        PipelineState::create(json!({
            "topic": "Dark Matter",
            "target_audience": "curious adults",
            "duration_minutes": 12
        }))
        .expect("valid seed")
    }

    #[test]
    fn test_create_initializes_accumulators() {
        let state = seeded();
        assert!(state.errors().is_empty());
        assert!(state.messages().is_empty());
        assert_eq!(state.get_str("topic"), Some("Dark Matter"));
        assert_eq!(state.get_u64("duration_minutes"), Some(12));
    }

    #[test]
    fn test_create_rejects_non_mapping() {
        let err = PipelineState::create(json!(["topic"])).expect_err("array seed");
        assert!(matches!(err, StateError::NotAMapping(ref t) if t == "array"));
    }

    #[test]
    fn test_create_validates_accumulators() {
        let state = PipelineState::create(json!({"errors": ["earlier"]})).expect("valid");
        assert_eq!(state.errors(), ["earlier".to_string()]);

        let err = PipelineState::create(json!({"messages": "nope"})).expect_err("bad type");
        assert!(matches!(err, StateError::InvalidAccumulator(ref k) if k == "messages"));
    }

    #[test]
    fn test_merge_does_not_mutate_input() {
        let state = seeded();
        let before = state.clone();
        let next = state.merge(
            StateUpdate::new()
                .set("topic", "Black Holes")
                .set("research_confidence", 0.5)
                .error("research: boom"),
        );
        assert_eq!(state, before);
        assert_eq!(next.get_str("topic"), Some("Black Holes"));
        assert_eq!(next.errors().len(), 1);
    }

    #[test]
    fn test_merge_replaces_nested_values_wholesale() {
        let state = PipelineState::create(json!({"stats": {"a": 1, "b": 2}})).expect("seed");
        let next = state.merge(StateUpdate::new().set("stats", json!({"c": 3})));
        assert_eq!(next.get("stats"), Some(&json!({"c": 3})));
    }

    #[test]
    fn test_merge_from_map_appends_reserved_lists() {
        let state = seeded().merge(StateUpdate::new().error("first"));
        let mut updates = Map::new();
        updates.insert("errors".into(), json!(["first", "second"]));
        updates.insert("hook_confidence".into(), json!(0.0));

        let next = state.merge(updates);
        assert_eq!(next.errors(), ["first".to_string(), "second".to_string()]);

        let mut replacing = Map::new();
        replacing.insert("errors".into(), json!(["unrelated"]));
        let next = next.merge(replacing);
        assert_eq!(next.errors().len(), 3);
    }

    #[test]
    fn test_require_checks_presence_only() {
        let state = PipelineState::create(json!({"topic": "", "flag": false, "x": null}))
            .expect("seed");
        assert!(state.require(&["topic", "flag", "x", "errors"]));
        assert!(!state.require(&["topic", "video_style"]));
        assert_eq!(
            state.missing_keys(&["topic", "video_style", "target_audience"]),
            vec!["video_style", "target_audience"]
        );
    }

    #[test]
    fn test_changes_since_reproduces_result() {
        let base = seeded().merge(StateUpdate::new().message("start"));
        let after = base.merge(
            StateUpdate::new()
                .set("hook_count", 2)
                .set("topic", "Dark Matter")
                .error("hook: thing")
                .message("hook: done"),
        );

        let changes = after.changes_since(&base);
        assert_eq!(changes.get("hook_count"), Some(&json!(2)));
        assert!(changes.get("topic").is_none());
        assert_eq!(changes.errors(), ["hook: thing".to_string()]);
        assert_eq!(base.merge(changes), after);
    }

    #[test]
    fn test_serialization_is_stable() {
        let state = seeded().merge(StateUpdate::new().message("m"));
        let first = serde_json::to_string(&state).expect("serialize");
        let second = serde_json::to_string(&state.clone()).expect("serialize");
        assert_eq!(first, second);
        assert!(first.starts_with(r#"{"errors":[],"messages":["m"]"#));

        let back: PipelineState = serde_json::from_str(&first).expect("deserialize");
        assert_eq!(back, state);
        assert_eq!(state.to_value()["topic"], "Dark Matter");
    }

    #[test]
    fn test_text_or() {
        let state = PipelineState::create(json!({"s": "text", "n": 3, "z": null})).expect("seed");
        assert_eq!(state.text_or("s", "d"), "text");
        assert_eq!(state.text_or("n", "d"), "3");
        assert_eq!(state.text_or("z", "d"), "d");
        assert_eq!(state.text_or("missing", "d"), "d");
    }
}
