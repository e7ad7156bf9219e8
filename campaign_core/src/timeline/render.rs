//! Timeline rendering and marker splicing. Pure text, no I/O.

use campaign_pages::{keys, render_document, CampaignId, Event, Frontmatter, RenderError};

use crate::config::TimelineConfig;

/// Region content when a campaign has no events.
pub const EMPTY_TIMELINE: &str = "_No events logged yet._";

/// Why a document's markers cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerProblem {
    MissingBegin,
    MissingEnd,
    EndBeforeBegin,
}

impl std::fmt::Display for MarkerProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerProblem::MissingBegin => write!(f, "end marker without begin marker"),
            MarkerProblem::MissingEnd => write!(f, "begin marker without end marker"),
            MarkerProblem::EndBeforeBegin => write!(f, "end marker precedes begin marker"),
        }
    }
}

/// Sort events into timeline order: session, then timestamp, then the order
/// they were logged in.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(Event::timeline_cmp);
}

/// Render the generated region for events already in timeline order.
///
/// One `## Session N` heading per session, one bullet per event. The output
/// always ends with a newline.
pub fn render_events(events: &[Event]) -> String {
    if events.is_empty() {
        return format!("{EMPTY_TIMELINE}\n");
    }

    let mut out = String::new();
    let mut current: Option<u32> = None;
    for event in events {
        if current != Some(event.session) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("## Session {}\n\n", event.session));
            current = Some(event.session);
        }
        out.push_str(&render_event(event));
        out.push('\n');
    }
    out
}

fn render_event(event: &Event) -> String {
    let mut line = format!("- **{}** ", event.timestamp);
    if !event.actor.is_empty() {
        line.push_str(&event.actor);
        line.push_str(": ");
    }
    line.push_str(&event.summary);
    for tag in &event.tags {
        line.push_str(" #");
        line.push_str(&tag.split_whitespace().collect::<Vec<_>>().join("-"));
    }
    line
}

/// Replace the text between the markers with `region`.
///
/// Returns `Ok(None)` when the document has neither marker.
pub fn splice_region(
    document: &str,
    region: &str,
    settings: &TimelineConfig,
) -> Result<Option<String>, MarkerProblem> {
    let begin = document.find(&settings.begin_marker);
    let end = document.find(&settings.end_marker);

    let (begin, end) = match (begin, end) {
        (None, None) => return Ok(None),
        (None, Some(_)) => return Err(MarkerProblem::MissingBegin),
        (Some(_), None) => return Err(MarkerProblem::MissingEnd),
        (Some(begin), Some(end)) if end < begin => return Err(MarkerProblem::EndBeforeBegin),
        (Some(begin), Some(end)) => (begin, end),
    };

    let head = &document[..begin + settings.begin_marker.len()];
    let tail = &document[end..];
    let mut out = String::with_capacity(head.len() + region.len() + tail.len() + 1);
    out.push_str(head);
    out.push('\n');
    out.push_str(region);
    out.push_str(tail);
    Ok(Some(out))
}

/// A complete timeline document, for files the generator owns outright.
pub fn render_owned_document(
    campaign: &CampaignId,
    region: &str,
    settings: &TimelineConfig,
) -> Result<String, RenderError> {
    let frontmatter = Frontmatter::new()
        .with(keys::TYPE, "timeline")
        .with(keys::CAMPAIGN, campaign.as_str())
        .with(keys::TAGS, vec!["timeline"]);
    let body = format!(
        "# Timeline: {campaign}\n\n{}\n{region}{}\n",
        settings.begin_marker, settings.end_marker
    );
    render_document(&frontmatter, &body)
}
