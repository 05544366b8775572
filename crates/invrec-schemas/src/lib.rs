//! invrec-schemas
//!
//! Canonical data shapes shared by every invrec crate: the normalized item,
//! the identity key built from it, and the key index a collection produces.
//!
//! Pure data. No IO.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// Scalar value of one canonical field.
///
/// Comparison is type-sensitive: `Str("true")` and `Bool(true)` are different
/// values. Normalizers are responsible for producing consistent types.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Str(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

static NULL: FieldValue = FieldValue::Null;

// ---------------------------------------------------------------------------
// Canonical item
// ---------------------------------------------------------------------------

/// One normalized, backend-agnostic record: canonical field name -> value.
///
/// Only a normalizer builds these, and it builds them whole; a raw record that
/// cannot be itemized never yields a partially populated item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalItem {
    fields: BTreeMap<String, FieldValue>,
}

impl CanonicalItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`CanonicalItem::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field value with absence folded into `Null`.
    pub fn value_or_null(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// String value of a field; `None` when absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for CanonicalItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut item = CanonicalItem::new();
        for (k, v) in iter {
            item.insert(k, v);
        }
        item
    }
}

// ---------------------------------------------------------------------------
// Identity key
// ---------------------------------------------------------------------------

/// Ordered tuple of canonical field values used to match records across systems.
///
/// Ordering is lexicographic over the tuple, which gives the diff engine its
/// reproducible iteration order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(Vec<FieldValue>);

impl IdentityKey {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self(values)
    }

    /// Single-field key, the common case (`("h1",)`).
    pub fn single(value: impl Into<FieldValue>) -> Self {
        Self(vec![value.into()])
    }

    /// Project `item` onto `key_fields`.
    ///
    /// Returns `None` when any key field is absent or null; such an item
    /// cannot be indexed.
    pub fn from_item<S: AsRef<str>>(item: &CanonicalItem, key_fields: &[S]) -> Option<Self> {
        let mut values = Vec::with_capacity(key_fields.len());
        for f in key_fields {
            match item.get(f.as_ref()) {
                None | Some(FieldValue::Null) => return None,
                Some(v) => values.push(v.clone()),
            }
        }
        Some(Self(values))
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Key index
// ---------------------------------------------------------------------------

/// Identity key -> canonical item for one collection and one reconciliation pass.
///
/// Inserting an existing key replaces the earlier item (last write wins) and
/// bumps the collision counter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyIndex {
    key_fields: Vec<String>,
    items: BTreeMap<IdentityKey, CanonicalItem>,
    collisions: usize,
}

impl KeyIndex {
    pub fn new<S: Into<String>>(key_fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            items: BTreeMap::new(),
            collisions: 0,
        }
    }

    /// Build an index from pre-keyed entries (fixtures, snapshots).
    pub fn from_entries<S: Into<String>>(
        key_fields: impl IntoIterator<Item = S>,
        entries: impl IntoIterator<Item = (IdentityKey, CanonicalItem)>,
    ) -> Self {
        let mut idx = Self::new(key_fields);
        for (k, v) in entries {
            idx.insert(k, v);
        }
        idx
    }

    /// Insert, returning the item that was displaced on collision.
    pub fn insert(&mut self, key: IdentityKey, item: CanonicalItem) -> Option<CanonicalItem> {
        let prev = self.items.insert(key, item);
        if prev.is_some() {
            self.collisions += 1;
        }
        prev
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&CanonicalItem> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &IdentityKey) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.items.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &CanonicalItem)> {
        self.items.iter()
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Number of inserts that replaced an existing entry.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> BTreeMap<IdentityKey, CanonicalItem> {
        self.items
    }
}

// ---------------------------------------------------------------------------
// Change set
// ---------------------------------------------------------------------------

/// A key present on both sides whose compared fields differ.
///
/// This is also the payload handed to a collection's update path: the origin
/// item is the desired state, the target item is what the target holds now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    pub origin: CanonicalItem,
    pub target: CanonicalItem,
    pub fields: BTreeSet<String>,
}

impl ItemChange {
    /// Origin values for just the differing fields.
    pub fn desired_values(&self) -> CanonicalItem {
        self.fields
            .iter()
            .map(|f| (f.clone(), self.origin.value_or_null(f).clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn device(host: &str, ip: &str) -> CanonicalItem {
        CanonicalItem::new()
            .with("hostname", host)
            .with("ipaddr", ip)
    }

    #[test]
    fn key_from_item_projects_fields_in_order() {
        let item = device("h1", "10.0.0.1");
        let key = IdentityKey::from_item(&item, &["ipaddr", "hostname"]).unwrap();
        assert_eq!(
            key.values(),
            &[FieldValue::from("10.0.0.1"), FieldValue::from("h1")]
        );
    }

    #[test]
    fn key_from_item_missing_or_null_field_is_none() {
        let item = device("h1", "10.0.0.1").with("site", FieldValue::Null);
        assert!(IdentityKey::from_item(&item, &["serial"]).is_none());
        assert!(IdentityKey::from_item(&item, &["site"]).is_none());
    }

    #[test]
    fn key_display_matches_tuple_notation() {
        assert_eq!(IdentityKey::single("h1").to_string(), "(\"h1\",)");
        let k = IdentityKey::new(vec!["h1".into(), true.into()]);
        assert_eq!(k.to_string(), "(\"h1\", true)");
    }

    #[test]
    fn field_values_are_type_sensitive() {
        assert_ne!(FieldValue::from("true"), FieldValue::from(true));
        assert_ne!(FieldValue::Null, FieldValue::from(""));
    }

    #[test]
    fn value_or_null_folds_absence() {
        let item = device("h1", "10.0.0.1");
        assert_eq!(item.value_or_null("model"), &FieldValue::Null);
        assert_eq!(item.value_or_null("hostname"), &FieldValue::from("h1"));
    }

    #[test]
    fn key_index_last_write_wins_and_counts_collisions() {
        let mut idx = KeyIndex::new(["hostname"]);
        assert!(idx
            .insert(IdentityKey::single("h1"), device("h1", "10.0.0.1"))
            .is_none());
        let prev = idx.insert(IdentityKey::single("h1"), device("h1", "10.0.0.9"));

        assert_eq!(prev, Some(device("h1", "10.0.0.1")));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.collisions(), 1);
        assert_eq!(
            idx.get(&IdentityKey::single("h1")).unwrap().str_field("ipaddr"),
            Some("10.0.0.9")
        );
    }

    #[test]
    fn canonical_item_json_is_flat_object() {
        let item = device("h1", "10.0.0.1").with("managed", true).with("sn", FieldValue::Null);
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"hostname": "h1", "ipaddr": "10.0.0.1", "managed": true, "sn": null})
        );
        let back: CanonicalItem = serde_json::from_value(v).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn item_change_desired_values_only_covers_diff_fields() {
        let change = ItemChange {
            origin: device("h1", "10.0.0.1").with("site", "hq"),
            target: device("h1", "10.0.0.2").with("site", "hq"),
            fields: ["ipaddr".to_string()].into_iter().collect(),
        };
        let desired = change.desired_values();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired.str_field("ipaddr"), Some("10.0.0.1"));
    }
}
