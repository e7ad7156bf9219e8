//! Per-campaign event storage and timeline regeneration on disk.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use campaign_pages::{CampaignId, Event, EventDraft, EventId};

use super::render::{render_events, render_owned_document, sort_events, splice_region};
use super::{TimelineError, TimelineResult};
use crate::config::{Config, TimelineConfig};
use crate::report::{IssueKind, Report};

/// Events read back from a campaign's store.
#[derive(Debug, Clone, Default)]
pub struct LoadedEvents {
    /// Events in the order they were logged.
    pub events: Vec<Event>,
    /// Lines that could not be decoded.
    pub report: Report,
}

/// An event rejected by [`EventLog::append_events`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEvent {
    /// Position in the submitted batch.
    pub index: usize,
    pub draft: EventDraft,
    pub reason: String,
}

/// Outcome of a batch append.
#[derive(Debug, Clone, Default)]
pub struct AppendReport {
    pub accepted: Vec<EventId>,
    pub rejected: Vec<RejectedEvent>,
    pub report: Report,
}

/// Result of a timeline regeneration.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub campaign: CampaignId,
    pub path: PathBuf,
    /// Full document text as it now stands on disk.
    pub content: String,
    pub event_count: usize,
    /// False when the file already held exactly this content.
    pub changed: bool,
    /// Skipped event lines.
    pub report: Report,
}

/// Append-only event store for every campaign under one root.
///
/// Appends and regenerations of one campaign are serialized; different
/// campaigns proceed in parallel.
#[derive(Debug)]
pub struct EventLog {
    campaigns_root: PathBuf,
    settings: TimelineConfig,
    locks: Mutex<HashMap<CampaignId, Arc<Mutex<()>>>>,
}

impl EventLog {
    pub fn new(campaigns_root: impl Into<PathBuf>, settings: TimelineConfig) -> Self {
        Self {
            campaigns_root: campaigns_root.into(),
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.campaigns_root.clone(), config.timeline.clone())
    }

    pub fn settings(&self) -> &TimelineConfig {
        &self.settings
    }

    pub fn campaign_dir(&self, campaign: &CampaignId) -> PathBuf {
        self.campaigns_root.join(campaign.as_str())
    }

    /// The JSON-lines event store of a campaign.
    pub fn log_path(&self, campaign: &CampaignId) -> PathBuf {
        self.campaign_dir(campaign).join(&self.settings.event_log)
    }

    /// The generated timeline document of a campaign.
    pub fn document_path(&self, campaign: &CampaignId) -> PathBuf {
        self.campaign_dir(campaign).join(&self.settings.document)
    }

    fn campaign_lock(&self, campaign: &CampaignId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(campaign.clone()).or_default().clone()
    }

    fn marker_in(&self, event: &Event) -> Option<&str> {
        [&self.settings.begin_marker, &self.settings.end_marker]
            .into_iter()
            .find(|marker| event.mentions(marker))
            .map(String::as_str)
    }

    /// Validate and store one event.
    ///
    /// A rejected event leaves the store untouched.
    pub fn append_event(&self, draft: EventDraft) -> TimelineResult<Event> {
        let event = draft.validate()?;
        if let Some(marker) = self.marker_in(&event) {
            return Err(TimelineError::MarkerInEvent(marker.to_string()));
        }
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let lock = self.campaign_lock(&event.campaign);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.campaign_dir(&event.campaign);
        std::fs::create_dir_all(&dir).map_err(|source| TimelineError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.log_path(&event.campaign);
        let io_err = |source| TimelineError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;

        debug!(campaign = %event.campaign, session = event.session, id = %event.id, "event appended");
        Ok(event)
    }

    /// Append a batch; each event is accepted or rejected on its own.
    pub fn append_events(&self, drafts: impl IntoIterator<Item = EventDraft>) -> AppendReport {
        let mut outcome = AppendReport::default();
        for (index, draft) in drafts.into_iter().enumerate() {
            let subject = format!("{}#{index}", draft.campaign);
            match self.append_event(draft.clone()) {
                Ok(event) => outcome.accepted.push(event.id),
                Err(err) => {
                    warn!(campaign = %draft.campaign, index, "event rejected: {err}");
                    outcome.report.fail(IssueKind::InvalidEvent, subject, &err);
                    outcome.rejected.push(RejectedEvent {
                        index,
                        draft,
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "event batch appended"
        );
        outcome
    }

    /// Read a campaign's events in logged order. Undecodable lines are
    /// skipped and reported.
    pub fn events(&self, campaign: &CampaignId) -> TimelineResult<LoadedEvents> {
        let lock = self.campaign_lock(campaign);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_events(campaign)
    }

    fn read_events(&self, campaign: &CampaignId) -> TimelineResult<LoadedEvents> {
        let path = self.log_path(campaign);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LoadedEvents::default()),
            Err(source) => return Err(TimelineError::Io { path, source }),
        };

        let mut loaded = LoadedEvents::default();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let subject = format!("{}:{}", path.display(), number + 1);
            match serde_json::from_str::<Event>(line) {
                Ok(event) if event.campaign == *campaign => loaded.events.push(event),
                Ok(event) => {
                    warn!(path = %path.display(), line = number + 1, "event belongs to another campaign");
                    loaded.report.warn(
                        IssueKind::CorruptEvent,
                        subject,
                        format!("event belongs to campaign `{}`", event.campaign),
                    );
                }
                Err(err) => {
                    warn!(path = %path.display(), line = number + 1, "skipping event line: {err}");
                    loaded.report.warn(IssueKind::CorruptEvent, subject, err);
                }
            }
        }
        Ok(loaded)
    }

    /// Rebuild the campaign's timeline document from its events.
    ///
    /// Only the region between the markers is replaced. A file without
    /// markers is owned by the generator and rewritten whole. Nothing is
    /// written when the content would not change or the markers are
    /// malformed.
    pub fn regenerate_timeline(&self, campaign: &CampaignId) -> TimelineResult<GeneratedDocument> {
        let lock = self.campaign_lock(campaign);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let LoadedEvents { mut events, mut report } = self.read_events(campaign)?;
        events.retain(|event| match self.marker_in(event) {
            Some(marker) => {
                warn!(campaign = %campaign, id = %event.id, "skipping event that quotes a timeline marker");
                report.warn(
                    IssueKind::CorruptEvent,
                    format!("{campaign}/{}", event.id),
                    format!("event text contains the timeline marker `{marker}`"),
                );
                false
            }
            None => true,
        });
        sort_events(&mut events);
        let region = render_events(&events);

        let path = self.document_path(campaign);
        let existing = match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(TimelineError::Io { path, source }),
        };

        let spliced = match existing.as_deref() {
            Some(text) => splice_region(text, &region, &self.settings).map_err(|problem| {
                TimelineError::MalformedMarkers {
                    path: path.clone(),
                    reason: problem.to_string(),
                }
            })?,
            None => None,
        };
        let content = match spliced {
            Some(content) => content,
            None => render_owned_document(campaign, &region, &self.settings)?,
        };

        let changed = existing.as_deref() != Some(content.as_str());
        if changed {
            let dir = self.campaign_dir(campaign);
            std::fs::create_dir_all(&dir).map_err(|source| TimelineError::Io {
                path: dir.clone(),
                source,
            })?;
            write_atomically(&path, &content).map_err(|source| TimelineError::Io {
                path: path.clone(),
                source,
            })?;
        }

        info!(
            campaign = %campaign,
            events = events.len(),
            skipped = report.len(),
            changed,
            "timeline regenerated"
        );

        Ok(GeneratedDocument {
            campaign: campaign.clone(),
            path,
            content,
            event_count: events.len(),
            changed,
            report,
        })
    }
}

/// Write through a temp file in the same directory, then rename over `path`.
fn write_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_ghost() -> CampaignId {
        CampaignId::new("op-ghost").unwrap()
    }

    fn draft(session: u32, summary: &str) -> EventDraft {
        EventDraft::new("op-ghost")
            .with_session(session)
            .with_timestamp("2024-05-01T19:00")
            .with_summary(summary)
    }

    fn log(dir: &Path) -> EventLog {
        EventLog::new(dir, TimelineConfig::default())
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let event = log.append_event(draft(1, "Arrived.").with_actor("Ghost")).unwrap();

        let loaded = log.events(&op_ghost()).unwrap();
        assert_eq!(loaded.events, vec![event]);
        assert!(loaded.report.is_empty());
        assert!(dir.path().join("op-ghost/_events.jsonl").is_file());
    }

    #[test]
    fn test_rejected_event_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let mut bad = draft(1, "x");
        bad.summary = None;
        assert!(matches!(log.append_event(bad), Err(TimelineError::Validation(_))));
        assert!(log.events(&op_ghost()).unwrap().events.is_empty());
    }

    #[test]
    fn test_batch_rejects_individually() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let outcome = log.append_events(vec![
            draft(1, "One."),
            draft(2, "   "),
            EventDraft::new("../escape").with_session(1).with_timestamp("t").with_summary("s"),
            draft(3, "Three."),
        ]);

        assert_eq!(outcome.accepted.len(), 2);
        let rejected: Vec<_> = outcome.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![1, 2]);
        assert_eq!(outcome.report.of_kind(IssueKind::InvalidEvent).count(), 2);
        assert_eq!(log.events(&op_ghost()).unwrap().events.len(), 2);
    }

    #[test]
    fn test_marker_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let err = log
            .append_event(draft(1, "quoted <!-- timeline:end --> marker"))
            .unwrap_err();
        assert!(matches!(err, TimelineError::MarkerInEvent(ref marker) if marker == "<!-- timeline:end -->"));
        assert!(log.events(&op_ghost()).unwrap().events.is_empty());
    }

    #[test]
    fn test_logged_marker_text_keeps_regeneration_stable() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        log.append_event(draft(1, "Arrived.")).unwrap();
        let mut smuggled = draft(2, "placeholder").validate().unwrap();
        smuggled.summary = "quoted <!-- timeline:end --> marker".to_string();
        let mut file = OpenOptions::new()
            .append(true)
            .open(log.log_path(&op_ghost()))
            .unwrap();
        writeln!(file, "{}", serde_json::to_string(&smuggled).unwrap()).unwrap();

        let first = log.regenerate_timeline(&op_ghost()).unwrap();
        let second = log.regenerate_timeline(&op_ghost()).unwrap();
        let third = log.regenerate_timeline(&op_ghost()).unwrap();
        assert_eq!(first.content, second.content);
        assert_eq!(second.content, third.content);
        assert!(!third.changed);
        assert_eq!(first.event_count, 1);
        assert!(!first.content.contains("quoted"));
        assert_eq!(first.report.of_kind(IssueKind::CorruptEvent).count(), 1);
    }

    #[test]
    fn test_multiline_summary_cannot_add_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        log.append_event(draft(1, "line one\n## Session 99\nfake")).unwrap();

        let document = log.regenerate_timeline(&op_ghost()).unwrap();
        assert!(document.content.contains("- **2024-05-01T19:00** line one ## Session 99 fake\n"));
        assert!(!document.content.contains("\n## Session 99"));
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        log.append_event(draft(1, "Good.")).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(log.log_path(&op_ghost()))
            .unwrap();
        file.write_all(b"{not json\n\n").unwrap();
        log.append_event(draft(2, "Also good.")).unwrap();

        let loaded = log.events(&op_ghost()).unwrap();
        assert_eq!(loaded.events.len(), 2);
        let skipped: Vec<_> = loaded.report.of_kind(IssueKind::CorruptEvent).collect();
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].subject.ends_with(":2"));
    }

    #[test]
    fn test_regenerate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        for session in [3, 1, 2] {
            log.append_event(draft(session, &format!("Session {session} event."))).unwrap();
        }

        let first = log.regenerate_timeline(&op_ghost()).unwrap();
        assert!(first.changed);
        assert_eq!(first.event_count, 3);
        let second = log.regenerate_timeline(&op_ghost()).unwrap();
        assert!(!second.changed);
        assert_eq!(first.content, second.content);
        assert_eq!(std::fs::read_to_string(&first.path).unwrap(), first.content);

        let one = first.content.find("## Session 1").unwrap();
        let two = first.content.find("## Session 2").unwrap();
        let three = first.content.find("## Session 3").unwrap();
        assert!(one < two && two < three);
    }

    #[test]
    fn test_empty_campaign_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let doc = log(dir.path()).regenerate_timeline(&op_ghost()).unwrap();
        assert_eq!(doc.event_count, 0);
        assert!(doc.content.contains("_No events logged yet._"));
        assert!(doc.content.starts_with("---\ntype: timeline\n"));
    }

    #[test]
    fn test_hand_authored_content_survives() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let path = log.document_path(&op_ghost());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let authored = "# Our story\nWritten by hand.\n<!-- timeline:begin -->\n<!-- timeline:end -->\n## Epilogue\nAlso by hand.\n";
        std::fs::write(&path, authored).unwrap();

        log.append_event(draft(1, "Arrived.")).unwrap();
        let doc = log.regenerate_timeline(&op_ghost()).unwrap();
        assert!(doc.content.starts_with("# Our story\nWritten by hand.\n<!-- timeline:begin -->\n## Session 1\n"));
        assert!(doc.content.ends_with("<!-- timeline:end -->\n## Epilogue\nAlso by hand.\n"));
    }

    #[test]
    fn test_file_without_markers_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let path = log.document_path(&op_ghost());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale generated text\n").unwrap();

        let doc = log.regenerate_timeline(&op_ghost()).unwrap();
        assert!(doc.changed);
        assert!(!doc.content.contains("stale"));
    }

    #[test]
    fn test_malformed_markers_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());
        let path = log.document_path(&op_ghost());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let authored = "Intro.\n<!-- timeline:begin -->\nno end marker\n";
        std::fs::write(&path, authored).unwrap();

        let err = log.regenerate_timeline(&op_ghost()).unwrap_err();
        assert!(matches!(err, TimelineError::MalformedMarkers { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), authored);
    }

    #[test]
    fn test_concurrent_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = log(dir.path());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let log = &log;
                scope.spawn(move || {
                    for n in 0..25 {
                        log.append_event(draft(worker, &format!("worker {worker} event {n}")))
                            .unwrap();
                    }
                });
            }
        });

        let loaded = log.events(&op_ghost()).unwrap();
        assert_eq!(loaded.events.len(), 100);
        assert!(loaded.report.is_empty());
    }
}
