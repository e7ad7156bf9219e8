//! Wiki-style link tokens: `[[Target]]`, `[[Target#Heading]]`,
//! `[[Target|Alias]]` and embeds `![[Target]]`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::PageTitle;

static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(!?)\[\[([^\[\]|#\n]+)(?:#([^\[\]|\n]+))?(?:\|([^\[\]\n]+))?\]\]")
        .expect("valid wiki link regex")
});

/// A link found in page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkToken {
    /// Page the link points to.
    pub target: PageTitle,
    /// Heading fragment after `#`.
    pub heading: Option<String>,
    /// Display text after `|`.
    pub alias: Option<String>,
    /// `![[...]]` embeds the target instead of linking it.
    pub embed: bool,
    /// Byte range of the whole token.
    pub span: Range<usize>,
}

/// Find every link token in `text`, in order of appearance.
pub fn extract_links(text: &str) -> Vec<LinkToken> {
    WIKI_LINK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(2)?.as_str().trim();
            if target.is_empty() {
                return None;
            }
            Some(LinkToken {
                target: PageTitle::new(target),
                heading: caps.get(3).map(|m| m.as_str().trim().to_string()),
                alias: caps.get(4).map(|m| m.as_str().trim().to_string()),
                embed: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
                span: whole.range(),
            })
        })
        .collect()
}
