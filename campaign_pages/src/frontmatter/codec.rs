//! Splitting a document into frontmatter and body, and writing it back.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

use super::Frontmatter;

/// Line that opens and closes a frontmatter block.
pub const FENCE: &str = "---";

const BOM: char = '\u{feff}';

/// A top-level line inside the block must look like `key:` or `key: value`.
static KEY_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<key>"[^"]*"|'[^']*'|[^\s#'"\-:?][^:]*):(?:\s|$)"#).expect("valid key line regex")
});

/// Errors raised while reading a frontmatter block. Line numbers are 1-based
/// and count from the top of the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: frontmatter fence `---` is never closed")]
    Unterminated { line: usize },

    #[error("line {line}: expected `key: value`, found `{text}`")]
    InvalidLine { line: usize, text: String },

    #[error("line {line}: {message}")]
    Yaml { line: usize, message: String },
}

impl ParseError {
    /// Line the error points at.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Unterminated { line }
            | ParseError::InvalidLine { line, .. }
            | ParseError::Yaml { line, .. } => *line,
        }
    }
}

/// Error raised when frontmatter cannot be serialized.
#[derive(Debug, Error)]
#[error("failed to serialize frontmatter: {0}")]
pub struct RenderError(#[from] serde_yaml::Error);

/// A document split into its metadata and the text that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Split raw document text into frontmatter and body.
///
/// A document without an opening fence on its first line has empty
/// frontmatter and is all body. The body starts right after the closing
/// fence line and is returned byte-for-byte.
pub fn parse_document(input: &str) -> Result<SplitDocument, ParseError> {
    let text = input.strip_prefix(BOM).unwrap_or(input);

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok(SplitDocument {
            frontmatter: Frontmatter::new(),
            body: String::new(),
        });
    };
    if first.trim_end() != FENCE {
        return Ok(SplitDocument {
            frontmatter: Frontmatter::new(),
            body: text.to_string(),
        });
    }

    let mut offset = first.len();
    let mut block_lines: Vec<&str> = Vec::new();
    let mut closed = false;

    for line in lines {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == "..." {
            closed = true;
            break;
        }
        block_lines.push(line);
    }

    if !closed {
        return Err(ParseError::Unterminated { line: 1 });
    }

    // Block line `i` sits on document line `i + 2` (the fence is line 1).
    for (i, line) in block_lines.iter().enumerate() {
        if !is_valid_block_line(line) {
            return Err(ParseError::InvalidLine {
                line: i + 2,
                text: line.trim_end().to_string(),
            });
        }
    }

    let frontmatter = parse_block(&block_lines)?;
    Ok(SplitDocument {
        frontmatter,
        body: text[offset..].to_string(),
    })
}

/// Write frontmatter and body back into one document.
///
/// Empty frontmatter produces the body alone, so pages without a block stay
/// without one.
pub fn render_document(frontmatter: &Frontmatter, body: &str) -> Result<String, RenderError> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }

    let yaml = serde_yaml::to_string(frontmatter.as_mapping())?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

fn is_valid_block_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.trim_start().is_empty() {
        return true;
    }
    // Indented lines continue the previous key; `#` starts a comment and
    // `-` a sequence item under the previous key.
    if trimmed.starts_with([' ', '\t', '#']) || trimmed == "-" || trimmed.starts_with("- ") {
        return true;
    }
    KEY_LINE_RE.is_match(trimmed)
}

fn parse_block(block_lines: &[&str]) -> Result<Frontmatter, ParseError> {
    let only_comments = block_lines
        .iter()
        .all(|line| line.trim().is_empty() || line.trim_start().starts_with('#'));
    if only_comments {
        return Ok(Frontmatter::new());
    }

    let value: Value = serde_yaml::from_str(&block_lines.concat()).map_err(|err| ParseError::Yaml {
        line: err
            .location()
            .map(|loc| loc.line() + 1)
            .unwrap_or_else(|| unlocated_error_line(block_lines)),
        message: err.to_string(),
    })?;

    match value {
        Value::Mapping(fields) => Ok(Frontmatter::from_mapping(fields)),
        Value::Null => Ok(Frontmatter::new()),
        _ => Err(ParseError::Yaml {
            line: 2,
            message: "frontmatter must be a mapping".to_string(),
        }),
    }
}

/// Document line for a YAML error that carries no location: the second
/// occurrence of a repeated top-level key, else the closing fence.
fn unlocated_error_line(block_lines: &[&str]) -> usize {
    let mut seen = HashSet::new();
    for (i, line) in block_lines.iter().enumerate() {
        let Some(caps) = KEY_LINE_RE.captures(line.trim_end()) else {
            continue;
        };
        let key = caps["key"].trim().trim_matches(['"', '\'']).to_string();
        if !seen.insert(key) {
            return i + 2;
        }
    }
    block_lines.len() + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frontmatter_is_all_body() {
        let doc = parse_document("# Nexus\nA city.").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "# Nexus\nA city.");
    }

    #[test]
    fn test_basic_frontmatter() {
        let input = "---\ntype: location\ntags:\n  - city\n  - hub\n---\n## History\nFounded in year one.\n";
        let doc = parse_document(input).unwrap();
        assert_eq!(doc.frontmatter.kind().as_deref(), Some("location"));
        assert_eq!(doc.frontmatter.tags(), vec!["city", "hub"]);
        assert_eq!(doc.body, "## History\nFounded in year one.\n");
    }

    #[test]
    fn test_unindented_sequence_items() {
        let input = "---\ntags:\n- npc\n- fixer\n---\nbody";
        let doc = parse_document(input).unwrap();
        assert_eq!(doc.frontmatter.tags(), vec!["npc", "fixer"]);
    }

    #[test]
    fn test_bom_is_tolerated() {
        let doc = parse_document("\u{feff}---\ntype: npc\n---\n").unwrap();
        assert_eq!(doc.frontmatter.kind().as_deref(), Some("npc"));
        assert_eq!(doc.body, "");
    }

    #[test]
    fn test_empty_block() {
        let doc = parse_document("---\n---\nbody\n").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "body\n");
    }

    #[test]
    fn test_unterminated_fence() {
        let err = parse_document("---\ntype: npc\nbody text\n").unwrap_err();
        assert_eq!(err, ParseError::Unterminated { line: 1 });
    }

    #[test]
    fn test_invalid_line_reports_offending_line() {
        let err = parse_document("---\ntype: npc\njust some words\n---\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidLine {
                line: 3,
                text: "just some words".to_string()
            }
        );
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_duplicate_key_reports_its_line() {
        let err = parse_document("---\na: 1\nb: 2\na: 3\n---\n").unwrap_err();
        assert_eq!(err.line(), 4);
        assert!(matches!(err, ParseError::Yaml { .. }));
    }

    #[test]
    fn test_unlocated_error_line() {
        assert_eq!(unlocated_error_line(&["a: 1\n", "b: 2\n"]), 4);
        assert_eq!(unlocated_error_line(&["a: 1\n", "  a: nested\n", "a: 2\n"]), 4);
        assert_eq!(unlocated_error_line(&["type: npc\n", "\"type\": faction\n"]), 3);
    }

    #[test]
    fn test_nested_values_are_preserved() {
        let input = "---\ntype: faction\nrelations:\n  corp: hostile\n  union: allied\n---\n";
        let doc = parse_document(input).unwrap();
        assert!(matches!(doc.frontmatter.get("relations"), Some(Value::Mapping(_))));
        assert!(doc.frontmatter.get_str("relations").is_none());
    }

    #[test]
    fn test_round_trip_keeps_unknown_keys_and_order() {
        let input = "---\ncssclasses:\n- dossier\ntype: npc\nportrait: vex.png\ndisposition: wary\n---\n# Vex\n";
        let doc = parse_document(input).unwrap();
        let rendered = render_document(&doc.frontmatter, &doc.body).unwrap();
        let again = parse_document(&rendered).unwrap();

        assert_eq!(again, doc);
        let keys: Vec<_> = again.frontmatter.keys().collect();
        assert_eq!(keys, vec!["cssclasses", "type", "portrait", "disposition"]);
    }

    #[test]
    fn test_render_without_frontmatter_is_body() {
        let rendered = render_document(&Frontmatter::new(), "plain\n").unwrap();
        assert_eq!(rendered, "plain\n");
    }

    #[test]
    fn test_render_shape() {
        let fm = Frontmatter::new().with("type", "timeline");
        let rendered = render_document(&fm, "# Timeline\n").unwrap();
        assert_eq!(rendered, "---\ntype: timeline\n---\n# Timeline\n");
    }
}
