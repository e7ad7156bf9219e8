//! Page bodies split into heading sections.
//!
//! Only ATX headings (`#` through `######`) are recognized, and headings
//! inside fenced code blocks are ignored. The raw text is kept as-is so any
//! edit can be expressed as a byte-range splice.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One heading and the text it governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading depth, 1 through 6.
    pub level: u8,
    /// Heading text without the `#` markers.
    pub heading: String,
    /// The heading line as written, trailing whitespace removed.
    pub heading_line: String,
    /// Byte offset where the heading line starts.
    pub start: usize,
    /// Byte offset right after the heading line.
    pub content_start: usize,
    /// Byte offset of the next heading of any depth.
    pub content_end: usize,
    /// Byte offset of the next heading of equal or shallower depth.
    pub end: usize,
}

impl Section {
    /// Whether `anchor` names this heading, either as the full heading line
    /// (`## History`) or as the bare heading text (`History`). Case-sensitive.
    pub fn matches_anchor(&self, anchor: &str) -> bool {
        let anchor = anchor.trim();
        anchor == self.heading_line.trim_start() || anchor == self.heading
    }

    /// Byte range of the whole section including its subsections.
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A page body: raw text plus its heading outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    text: String,
    sections: Vec<Section>,
}

impl Body {
    /// Parse body text into sections.
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let sections = outline(&text);
        Self { text, sections }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Text before the first heading.
    pub fn preamble(&self) -> &str {
        let end = self.sections.first().map(|s| s.start).unwrap_or(self.text.len());
        &self.text[..end]
    }

    /// Raw text run owned directly by a section (up to the next heading).
    pub fn section_text(&self, section: &Section) -> &str {
        &self.text[section.content_start..section.content_end]
    }

    /// First section whose heading matches `anchor`.
    pub fn find_anchor(&self, anchor: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.matches_anchor(anchor))
    }

    /// Byte offset just past the last non-blank line of `section`.
    ///
    /// Trailing blank lines stay after the insertion point so they keep
    /// separating the section from the next heading.
    pub fn insertion_point(&self, section: &Section) -> usize {
        let slice = &self.text[section.start..section.end];
        let last_char = section.start + slice.trim_end().len();
        match self.text[last_char..section.end].find('\n') {
            Some(i) => last_char + i + 1,
            None => section.end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn outline(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        if let Some(marker) = fence_marker(line) {
            match fence {
                None => fence = Some(marker),
                Some((ch, len)) if marker.0 == ch && marker.1 >= len => fence = None,
                Some(_) => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        if let Some((level, heading)) = parse_heading(line) {
            if let Some(prev) = sections.last_mut() {
                prev.content_end = start;
            }
            sections.push(Section {
                level,
                heading,
                heading_line: line.trim_end().to_string(),
                start,
                content_start: offset,
                content_end: text.len(),
                end: text.len(),
            });
        }
    }

    // A section ends where the next heading of equal or shallower depth begins.
    for i in 0..sections.len() {
        let level = sections[i].level;
        if let Some(next) = sections[i + 1..].iter().find(|s| s.level <= level) {
            sections[i].end = next.start;
        }
    }

    sections
}

fn parse_heading(line: &str) -> Option<(u8, String)> {
    let line = line.trim_end();
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let hashes = rest.len() - rest.trim_start_matches('#').len();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let after = &rest[hashes..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }

    let mut heading = after.trim();
    // Optional closing sequence: `## Title ##`.
    let without_closing = heading.trim_end_matches('#');
    if without_closing.len() < heading.len()
        && (without_closing.is_empty() || without_closing.ends_with([' ', '\t']))
    {
        heading = without_closing.trim_end();
    }

    Some((hashes as u8, heading.to_string()))
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let run = trimmed.len() - trimmed.trim_start_matches(ch).len();
    (run >= 3).then_some((ch, run))
}
