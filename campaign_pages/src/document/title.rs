//! Page titles and their normalized lookup keys.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Normalize a title into its lookup key: trimmed, lowercased, inner
/// whitespace runs collapsed to a single space.
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A page title as written, compared by its normalized key.
///
/// `"Nexus  Station"` and `"nexus station"` are the same title.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PageTitle {
    display: String,
    key: String,
}

impl PageTitle {
    /// Create a title from its display form.
    pub fn new(display: impl Into<String>) -> Self {
        let display = display.into().trim().to_string();
        let key = normalize_title(&display);
        Self { display, key }
    }

    /// The title as written in the file name or frontmatter.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The normalized key used for lookups and uniqueness.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl PartialEq for PageTitle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PageTitle {}

impl Hash for PageTitle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PageTitle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PageTitle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for PageTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl From<&str> for PageTitle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PageTitle {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PageTitle> for String {
    fn from(value: PageTitle) -> Self {
        value.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Nexus   Station "), "nexus station");
        assert_eq!(normalize_title("Vex\tMoreau"), "vex moreau");
    }

    #[test]
    fn test_title_equality_uses_key() {
        let a = PageTitle::new("Nexus Station");
        let b = PageTitle::new("nexus  STATION");
        assert_eq!(a, b);
        assert_eq!(a.display(), "Nexus Station");
        assert_eq!(b.display(), "nexus  STATION");
    }

    #[test]
    fn test_title_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(PageTitle::new("Nexus"));
        set.insert(PageTitle::new("NEXUS"));
        assert_eq!(set.len(), 1);
    }
}
