//! Frontmatter - the metadata block at the top of every page.
//!
//! The mapping is kept in source order as an opaque YAML mapping. Keys this
//! crate understands get typed accessors; everything else rides along
//! untouched so presentation-only metadata survives a round trip.

mod codec;

pub use codec::*;

use serde_yaml::{Mapping, Value};

/// Frontmatter keys interpreted by the overlay core.
pub mod keys {
    /// Page classification (`npc`, `faction`, `location`, ...).
    pub const TYPE: &str = "type";
    /// List of tags, or a single scalar tag.
    pub const TAGS: &str = "tags";
    /// Owning campaign of an overlay or generated document.
    pub const CAMPAIGN: &str = "campaign";
    /// Canon title an overlay extends.
    pub const EXTENDS: &str = "extends";
    /// Heading in the extended canon page to insert after.
    pub const APPEND_TO: &str = "append_to";
    /// Ordering hint when several fragments extend one page.
    pub const PRIORITY: &str = "priority";

    /// All keys with typed meaning in the core.
    pub const RECOGNIZED: &[&str] = &[TYPE, TAGS, CAMPAIGN, EXTENDS, APPEND_TO, PRIORITY];

    /// Keys that steer merging and are not propagated into resolved pages.
    pub const CONTROL: &[&str] = &[EXTENDS, APPEND_TO, PRIORITY];

    /// Keys read only by the external query engine. Listed for reference;
    /// they are carried like any other unknown key.
    pub const PASSTHROUGH: &[&str] = &[
        "standing",
        "faction",
        "disposition",
        "personal_standing",
        "portrait",
        "recent_change",
        "cssclasses",
    ];
}

/// Ordered frontmatter mapping with typed accessors for known keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Mapping,
}

impl Frontmatter {
    /// Create an empty frontmatter block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already parsed mapping.
    pub fn from_mapping(fields: Mapping) -> Self {
        Self { fields }
    }

    /// Borrow the underlying mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Get the raw value of a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert or replace a value. Replacing keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(Value::String(key.into()), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Iterate over string keys in source order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().filter_map(Value::as_str)
    }

    /// Keys the core does not interpret, in source order.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|key| !keys::RECOGNIZED.contains(key))
    }

    /// Read a scalar value as a string. Numbers and booleans are stringified.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    /// Read a list of scalars. A lone scalar is read as a one-item list and
    /// non-scalar items are skipped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::Sequence(items) => Some(items.iter().filter_map(scalar_to_string).collect()),
            Value::Null => Some(Vec::new()),
            other => scalar_to_string(other).map(|s| vec![s]),
        }
    }

    /// The `type` key.
    pub fn kind(&self) -> Option<String> {
        self.get_str(keys::TYPE)
    }

    /// The `tags` key; empty when absent.
    pub fn tags(&self) -> Vec<String> {
        self.get_list(keys::TAGS).unwrap_or_default()
    }

    /// The `campaign` key.
    pub fn campaign(&self) -> Option<String> {
        self.get_str(keys::CAMPAIGN)
    }

    /// The `extends` key. A blank value counts as absent.
    pub fn extends(&self) -> Option<String> {
        non_blank(self.get_str(keys::EXTENDS))
    }

    /// The `append_to` key. A blank value counts as absent.
    pub fn append_to(&self) -> Option<String> {
        non_blank(self.get_str(keys::APPEND_TO))
    }

    /// The `priority` key, accepted as an integer or an integer string.
    pub fn priority(&self) -> Option<i64> {
        match self.get(keys::PRIORITY)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Use `self` as the authority and fill in keys only `fallback` declares.
    ///
    /// Own keys keep their order; fallback-only keys follow in their order.
    pub fn with_fallback(&self, fallback: &Frontmatter) -> Frontmatter {
        let mut fields = self.fields.clone();
        for (key, value) in fallback.fields.iter() {
            if !fields.contains_key(key) {
                fields.insert(key.clone(), value.clone());
            }
        }
        Frontmatter { fields }
    }

    /// Layer `top` over `self`, skipping the listed keys of `top`.
    ///
    /// Shared keys keep their position in `self` and take `top`'s value;
    /// keys only `top` declares are appended.
    pub fn overlaid_with(&self, top: &Frontmatter, skip: &[&str]) -> Frontmatter {
        let mut fields = self.fields.clone();
        for (key, value) in top.fields.iter() {
            if key.as_str().is_some_and(|k| skip.contains(&k)) {
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
        Frontmatter { fields }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frontmatter {
        Frontmatter::new()
            .with("type", "faction")
            .with("tags", Value::Sequence(vec!["faction".into(), "corp".into()]))
            .with("standing", "hostile")
            .with("cssclasses", "wide-page")
    }

    #[test]
    fn test_typed_accessors() {
        let fm = sample();
        assert_eq!(fm.kind().as_deref(), Some("faction"));
        assert_eq!(fm.tags(), vec!["faction", "corp"]);
        assert!(fm.campaign().is_none());
        assert!(fm.extends().is_none());
    }

    #[test]
    fn test_single_scalar_tag_reads_as_list() {
        let fm = Frontmatter::new().with("tags", "npc");
        assert_eq!(fm.tags(), vec!["npc"]);
    }

    #[test]
    fn test_blank_extends_is_absent() {
        let fm = Frontmatter::new().with("extends", "  ");
        assert!(fm.extends().is_none());
    }

    #[test]
    fn test_priority_accepts_number_and_string() {
        assert_eq!(Frontmatter::new().with("priority", 3).priority(), Some(3));
        assert_eq!(Frontmatter::new().with("priority", "-2").priority(), Some(-2));
        assert_eq!(Frontmatter::new().with("priority", "high").priority(), None);
    }

    #[test]
    fn test_unknown_keys_in_order() {
        let fm = sample();
        let unknown: Vec<_> = fm.unknown_keys().collect();
        assert_eq!(unknown, vec!["standing", "cssclasses"]);
    }

    #[test]
    fn test_with_fallback_keeps_canon_only_keys() {
        let canon = Frontmatter::new()
            .with("type", "npc")
            .with("portrait", "vex.png")
            .with("standing", "neutral");
        let overlay = Frontmatter::new().with("standing", "hostile");

        let merged = overlay.with_fallback(&canon);
        assert_eq!(merged.get_str("standing").as_deref(), Some("hostile"));
        assert_eq!(merged.get_str("portrait").as_deref(), Some("vex.png"));
        let order: Vec<_> = merged.keys().collect();
        assert_eq!(order, vec!["standing", "type", "portrait"]);
    }

    #[test]
    fn test_overlaid_with_skips_control_keys() {
        let canon = Frontmatter::new().with("type", "location").with("standing", "neutral");
        let overlay = Frontmatter::new()
            .with("extends", "Nexus")
            .with("append_to", "## History")
            .with("standing", "compromised")
            .with("recent_change", "surveillance exposed");

        let merged = canon.overlaid_with(&overlay, keys::CONTROL);
        let order: Vec<_> = merged.keys().collect();
        assert_eq!(order, vec!["type", "standing", "recent_change"]);
        assert_eq!(merged.get_str("standing").as_deref(), Some("compromised"));
        assert!(!merged.contains_key("extends"));
    }
}
