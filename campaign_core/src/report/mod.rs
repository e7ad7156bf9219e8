//! Run reports - every skipped or failed item of a run, collected instead of
//! aborting.

use serde::{Deserialize, Serialize};

/// How bad a report item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Processing continued; the item was only noted.
    Warning,
    /// The item was excluded from the output.
    Failure,
}

/// What kind of problem a report item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Document frontmatter could not be parsed; the document was skipped.
    ParseError,
    /// Directory entry that cannot be a campaign.
    InvalidCampaign,
    /// Overlay extends a canon page that does not exist.
    TargetNotFound,
    /// Overlay anchor heading does not exist in the target page.
    AnchorNotFound,
    /// Overlay extends canon without naming an anchor.
    MissingAnchor,
    /// Merge inputs did not match the resolved mode.
    MergeInput,
    /// Event rejected by validation.
    InvalidEvent,
    /// Stored event line could not be decoded.
    CorruptEvent,
    /// Link target resolves to no visible page.
    DanglingLink,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::ParseError => "parse_error",
            IssueKind::InvalidCampaign => "invalid_campaign",
            IssueKind::TargetNotFound => "target_not_found",
            IssueKind::AnchorNotFound => "anchor_not_found",
            IssueKind::MissingAnchor => "missing_anchor",
            IssueKind::MergeInput => "merge_input",
            IssueKind::InvalidEvent => "invalid_event",
            IssueKind::CorruptEvent => "corrupt_event",
            IssueKind::DanglingLink => "dangling_link",
        }
    }
}

/// One skipped or failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    pub severity: Severity,
    pub kind: IssueKind,
    /// File path or `campaign/title` the item is about.
    pub subject: String,
    pub detail: String,
}

impl std::fmt::Display for ReportItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Failure => "failed",
        };
        write!(f, "{label} [{}] {}: {}", self.kind.as_str(), self.subject, self.detail)
    }
}

/// Collected items of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    items: Vec<ReportItem>,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a problem that did not exclude anything.
    pub fn warn(&mut self, kind: IssueKind, subject: impl Into<String>, detail: impl ToString) {
        self.push(Severity::Warning, kind, subject, detail);
    }

    /// Note an item that was excluded from the output.
    pub fn fail(&mut self, kind: IssueKind, subject: impl Into<String>, detail: impl ToString) {
        self.push(Severity::Failure, kind, subject, detail);
    }

    fn push(&mut self, severity: Severity, kind: IssueKind, subject: impl Into<String>, detail: impl ToString) {
        self.items.push(ReportItem {
            severity,
            kind,
            subject: subject.into(),
            detail: detail.to_string(),
        });
    }

    /// Append all items of another report.
    pub fn merge(&mut self, other: Report) {
        self.items.extend(other.items);
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that excluded something from the output.
    pub fn failures(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|i| i.severity == Severity::Failure)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Items of one kind.
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(move |i| i.kind == kind)
    }

    /// One-line summary, e.g. `2 failed, 1 warning`.
    pub fn summary(&self) -> String {
        let failed = self.failures().count();
        let warned = self.warnings().count();
        if failed == 0 && warned == 0 {
            return "no issues".to_string();
        }
        let plural = |n: usize, word: &str| if n == 1 { format!("{n} {word}") } else { format!("{n} {word}s") };
        format!("{failed} failed, {}", plural(warned, "warning"))
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for item in &self.items {
            writeln!(f, "{item}")?;
        }
        write!(f, "report: {}", self.summary())
    }
}
