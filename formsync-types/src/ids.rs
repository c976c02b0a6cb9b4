//! Identity and resumption types for form sync metadata.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Composite identity of a form: name, form id, and an optional version.
///
/// Used as the lookup key of every metadata store. Equality is structural.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormKey {
    name: String,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl FormKey {
    /// Create a key for an unversioned form.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            version: None,
        }
    }

    /// Create a key qualified by a form version.
    pub fn with_version(
        name: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            version: Some(version.into()),
        }
    }

    /// The human-readable form name (the definition's title).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The form id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The form version, if this key is version-qualified.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({}) v{}", self.name, self.id, version),
            None => write!(f, "{} ({})", self.name, self.id),
        }
    }
}

impl fmt::Debug for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormKey({})", self)
    }
}

/// An opaque resumption token for incremental pulls.
///
/// The encoding of the token belongs to the pull protocol; this type only
/// distinguishes "empty" (start from the beginning) from a concrete value.
/// Serialized as `{"value": "..."}`, or `{}` when empty.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty"
    )]
    value: Option<String>,
}

impl Cursor {
    /// Create a cursor holding the given token.
    ///
    /// An empty token yields the empty cursor.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            value: (!value.is_empty()).then_some(value),
        }
    }

    /// Create the cursor meaning "pull from the beginning".
    pub fn empty() -> Self {
        Self { value: None }
    }

    /// Check whether this is the empty cursor.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// The raw token, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "Cursor({value})"),
            None => write!(f, "Cursor(empty)"),
        }
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn form_key_structural_equality() {
        let a = FormKey::new("Census", "census-1");
        let b = FormKey::new("Census", "census-1");
        let c = FormKey::with_version("Census", "census-1", "2023-01");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<FormKey> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn form_key_display() {
        assert_eq!(FormKey::new("Census", "census-1").to_string(), "Census (census-1)");
        assert_eq!(
            FormKey::with_version("Census", "census-1", "3").to_string(),
            "Census (census-1) v3"
        );
    }

    #[test]
    fn form_key_json_omits_missing_version() {
        let json = serde_json::to_value(FormKey::new("Census", "census-1")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Census", "id": "census-1"}));

        let versioned: FormKey =
            serde_json::from_value(serde_json::json!({"name": "A", "id": "a", "version": "7"}))
                .unwrap();
        assert_eq!(versioned.version(), Some("7"));
    }

    #[test]
    fn cursor_empty_serializes_to_empty_object() {
        let json = serde_json::to_value(Cursor::empty()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let decoded: Cursor = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn cursor_with_value() {
        let cursor = Cursor::new("<cursor><uriLastReturnedValue>uuid:1</uriLastReturnedValue></cursor>");
        assert!(!cursor.is_empty());

        let json = serde_json::to_value(&cursor).unwrap();
        let decoded: Cursor = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn cursor_from_empty_string_is_empty() {
        assert_eq!(Cursor::new(""), Cursor::empty());

        let decoded: Cursor = serde_json::from_value(serde_json::json!({"value": ""})).unwrap();
        assert_eq!(decoded, Cursor::empty());
    }

    #[test]
    fn cursor_ignores_unknown_fields() {
        let decoded: Cursor =
            serde_json::from_value(serde_json::json!({"type": "aggregate", "value": "abc"}))
                .unwrap();
        assert_eq!(decoded.value(), Some("abc"));
    }
}
