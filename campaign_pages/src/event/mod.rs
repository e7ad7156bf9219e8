//! Campaign events - the raw material of the generated timeline.
//!
//! An [`EventDraft`] is what an external logging call hands in; validating
//! it yields an immutable [`Event`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

use crate::page::CampaignId;

/// Unique identifier for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reasons an event is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("event is missing `{0}`")]
    Missing(&'static str),

    #[error("event field `{0}` is empty")]
    Empty(&'static str),

    #[error(transparent)]
    Campaign(#[from] crate::page::InvalidCampaignId),
}

/// An event as submitted, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub campaign: String,
    #[serde(default)]
    pub session: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EventDraft {
    /// Start a draft for a campaign.
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            ..Self::default()
        }
    }

    /// Set the session number.
    pub fn with_session(mut self, session: u32) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Set who acted.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set the one-line summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Check required fields and produce an immutable event.
    ///
    /// `session`, `timestamp` and `summary` must be present and non-empty.
    /// Text fields are folded onto one line with whitespace runs collapsed.
    /// Tags are also stripped of a leading `#`, and blanks dropped.
    pub fn validate(self) -> Result<Event, ValidationError> {
        let campaign = CampaignId::new(self.campaign)?;
        let session = self.session.ok_or(ValidationError::Missing("session"))?;
        let timestamp = required(self.timestamp, "timestamp")?;
        let summary = required(self.summary, "summary")?;
        let actor = self.actor.as_deref().map(single_line).unwrap_or_default();
        let tags = self
            .tags
            .iter()
            .map(|t| single_line(t.trim().trim_start_matches('#')))
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Event {
            id: EventId::new(),
            campaign,
            session,
            timestamp,
            actor,
            summary,
            tags,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let value = single_line(&value.ok_or(ValidationError::Missing(field))?);
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(value)
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A validated, immutable campaign event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub campaign: CampaignId,
    /// Campaign-relative session number.
    pub session: u32,
    /// Compared as text; ISO-8601 timestamps sort chronologically.
    pub timestamp: String,
    /// May be empty when nobody in particular acted.
    #[serde(default)]
    pub actor: String,
    pub summary: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Event {
    /// Timeline order on session then timestamp. Events that compare equal
    /// keep their insertion order when sorted stably.
    pub fn timeline_cmp(&self, other: &Event) -> Ordering {
        self.session
            .cmp(&other.session)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }

    /// Whether any rendered text field contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        [&self.timestamp, &self.actor, &self.summary]
            .into_iter()
            .chain(&self.tags)
            .any(|text| text.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EventDraft {
        EventDraft::new("op-ghost")
            .with_session(3)
            .with_timestamp("2024-05-01T19:00")
            .with_actor("Ghost")
            .with_summary("Surveillance exposed.")
    }

    #[test]
    fn test_valid_event() {
        let event = draft().with_tag("#nexus").with_tag(" stealth ").validate().unwrap();
        assert_eq!(event.campaign.as_str(), "op-ghost");
        assert_eq!(event.session, 3);
        assert_eq!(event.actor, "Ghost");
        let tags: Vec<_> = event.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["nexus", "stealth"]);
    }

    #[test]
    fn test_missing_fields() {
        let mut no_session = draft();
        no_session.session = None;
        assert_eq!(no_session.validate(), Err(ValidationError::Missing("session")));

        let mut no_summary = draft();
        no_summary.summary = None;
        assert_eq!(no_summary.validate(), Err(ValidationError::Missing("summary")));
    }

    #[test]
    fn test_blank_fields() {
        assert_eq!(
            draft().with_timestamp("   ").validate(),
            Err(ValidationError::Empty("timestamp"))
        );
        assert_eq!(
            draft().with_summary("").validate(),
            Err(ValidationError::Empty("summary"))
        );
    }

    #[test]
    fn test_text_is_folded_onto_one_line() {
        let event = draft()
            .with_summary("line one\n## Session 99\n  fake")
            .with_actor(" Ghost\t and\r\nVex ")
            .with_timestamp("2024-05-01\n19:00")
            .with_tag("#black\nsite")
            .validate()
            .unwrap();
        assert_eq!(event.summary, "line one ## Session 99 fake");
        assert_eq!(event.actor, "Ghost and Vex");
        assert_eq!(event.timestamp, "2024-05-01 19:00");
        assert!(event.tags.contains("black site"));
        assert!(event.mentions("Session 99"));
        assert!(event.mentions("black site"));
        assert!(!event.mentions("<!--"));
    }

    #[test]
    fn test_bad_campaign() {
        let mut bad = draft();
        bad.campaign = "../etc".to_string();
        assert!(matches!(bad.validate(), Err(ValidationError::Campaign(_))));
    }

    #[test]
    fn test_actor_is_optional() {
        let mut anonymous = draft();
        anonymous.actor = None;
        assert_eq!(anonymous.validate().unwrap().actor, "");
    }

    #[test]
    fn test_timeline_cmp() {
        let a = draft().with_session(1).validate().unwrap();
        let b = draft().with_session(2).with_timestamp("2020-01-01").validate().unwrap();
        let c = draft().with_session(2).with_timestamp("2021-01-01").validate().unwrap();
        assert_eq!(a.timeline_cmp(&b), Ordering::Less);
        assert_eq!(c.timeline_cmp(&b), Ordering::Greater);
        assert_eq!(a.timeline_cmp(&a.clone()), Ordering::Equal);
    }
}
