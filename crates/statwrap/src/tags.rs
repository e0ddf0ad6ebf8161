//! Tag model: flattening nested metadata and the call-scoped active-tag
//! stack.
//!
//! Nested maps flatten to `parent.child` keys, sequences to
//! `parent.index`, scalars terminate recursion. Flattened sets merge with
//! later-wins semantics and render as `"key:value"` strings at the
//! stats/tracer boundary.
//!
//! The active-tag stack is thread-local: entering an instrumented call
//! pushes its tag frame via the RAII [`TagScope`] guard and nested calls
//! observe the full stack without being able to mutate ancestor frames.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::Value;

/// A flat, ordered mapping from dotted-path key to rendered scalar value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Merge `other` into `self`; keys in `other` override keys in `self`.
    pub fn merge(&mut self, other: TagSet) {
        self.0.extend(other.0);
    }

    /// Render as ordered `"key:value"` strings (sorted by key).
    pub fn to_tag_strings(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{k}:{v}")).collect()
    }

    /// Parse `"key:value"` strings back into a tag set.
    ///
    /// The first `:` splits key from value; a string without one becomes a
    /// key with an empty value.
    pub fn from_tag_strings<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for tag in tags {
            match tag.as_ref().split_once(':') {
                Some((key, value)) => set.insert(key, value),
                None => set.insert(tag.as_ref(), ""),
            }
        }
        set
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Flatten arbitrary nested metadata into a [`TagSet`].
///
/// Maps contribute `prefix.key`, sequences contribute `prefix.index`,
/// scalars are assigned directly under `prefix`. Callers flattening a bare
/// scalar must supply a prefix as key context. Pure; no side effects.
pub fn flatten(value: &Value, prefix: Option<&str>) -> TagSet {
    let mut out = TagSet::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: Option<&str>, out: &mut TagSet) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(nested, Some(&join_key(prefix, key)), out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(nested, Some(&join_key(prefix, &index.to_string())), out);
            }
        }
        scalar => {
            out.insert(prefix.unwrap_or_default(), render_scalar(scalar));
        }
    }
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}.{key}"),
        _ => key.to_string(),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Active-tag stack
// ============================================================================

thread_local! {
    static ACTIVE_TAGS: RefCell<Vec<Vec<String>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for one frame of the active-tag stack.
///
/// Pushes its tags on construction and pops them on drop, on every exit
/// path. Not `Send`: a frame belongs to the thread that pushed it.
#[must_use = "the tag frame pops when this guard drops"]
pub struct TagScope {
    _not_send: PhantomData<*const ()>,
}

impl TagScope {
    /// Push a tag frame for the duration of this guard.
    pub fn push(tags: Vec<String>) -> Self {
        ACTIVE_TAGS.with(|stack| stack.borrow_mut().push(tags));
        Self { _not_send: PhantomData }
    }
}

impl Drop for TagScope {
    fn drop(&mut self) {
        ACTIVE_TAGS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Snapshot of the current thread's active tags, outermost frame first.
pub fn active_tags() -> Vec<String> {
    ACTIVE_TAGS.with(|stack| stack.borrow().iter().flatten().cloned().collect())
}

/// The active tags parsed back into key/value form.
///
/// Later frames win when the same key appears at multiple depths.
pub fn active_tag_set() -> TagSet {
    TagSet::from_tag_strings(active_tags())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flatten_nested_maps_and_sequences() {
        let set = flatten(&json!({"a": {"b": 1}, "c": [10, 20]}), None);

        assert_eq!(set.get("a.b"), Some("1"));
        assert_eq!(set.get("c.0"), Some("10"));
        assert_eq!(set.get("c.1"), Some("20"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn merge_later_wins() {
        let mut set = flatten(&json!({"a": {"b": 1}, "c": [10, 20]}), None);
        set.merge(flatten(&json!({"a": {"b": 2}}), None));

        assert_eq!(set.get("a.b"), Some("2"));
        assert_eq!(set.get("c.0"), Some("10"));
        assert_eq!(set.get("c.1"), Some("20"));
    }

    #[test]
    fn flatten_with_prefix_and_scalar_rendering() {
        let set = flatten(&json!({"id": "abc", "flag": true, "gone": null}), Some("user"));

        assert_eq!(set.get("user.id"), Some("abc"));
        assert_eq!(set.get("user.flag"), Some("true"));
        assert_eq!(set.get("user.gone"), Some(""));
    }

    #[test]
    fn tag_string_round_trip() {
        let mut set = TagSet::new();
        set.insert("env", "test");
        set.insert("method", "#save");

        let strings = set.to_tag_strings();
        assert_eq!(strings, vec!["env:test".to_string(), "method:#save".to_string()]);

        let parsed = TagSet::from_tag_strings(&strings);
        assert_eq!(parsed, set);
    }

    #[test]
    fn scope_pushes_and_pops() {
        assert!(active_tags().is_empty());
        {
            let _outer = TagScope::push(vec!["outer:1".into()]);
            assert_eq!(active_tags(), vec!["outer:1".to_string()]);
            {
                let _inner = TagScope::push(vec!["inner:2".into()]);
                assert_eq!(active_tags(), vec!["outer:1".to_string(), "inner:2".to_string()]);
                assert_eq!(active_tag_set().get("inner"), Some("2"));
            }
            assert_eq!(active_tags(), vec!["outer:1".to_string()]);
        }
        assert!(active_tags().is_empty());
    }

    #[test]
    fn scope_pops_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _scope = TagScope::push(vec!["doomed:yes".into()]);
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(active_tags().is_empty());
    }

    #[test]
    fn inner_frame_overrides_outer_in_parsed_set() {
        let _outer = TagScope::push(vec!["env:prod".into()]);
        let _inner = TagScope::push(vec!["env:test".into()]);
        assert_eq!(active_tag_set().get("env"), Some("test"));
    }
}
