//! Page Store - an immutable snapshot of every canon page and overlay.
//!
//! A snapshot is built once per run, either by scanning the vault
//! ([`load`]) or from in-memory pages ([`SnapshotBuilder`]). Nothing mutates
//! it afterwards; a new run scans again and gets a new snapshot.

mod scan;

pub use scan::*;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

use campaign_pages::{CampaignId, CanonPage, Overlay, PageTitle};

use crate::report::Report;

/// Load-time errors. All of them abort the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("canon root `{}` does not exist", .0.display())]
    RootNotFound(PathBuf),

    #[error("page not found: {0}")]
    NotFound(String),

    #[error("duplicate canon title `{title}`: `{}` and `{}`", .first.display(), .second.display())]
    DuplicateTitle {
        title: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "duplicate overlay `{title}` in campaign `{campaign}`: `{}` and `{}`",
        .first.display(),
        .second.display()
    )]
    DuplicateOverlay {
        campaign: CampaignId,
        title: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan cancelled")]
    Cancelled,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of all documents for one resolution run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    canon: BTreeMap<PageTitle, CanonPage>,
    overlays: BTreeMap<CampaignId, BTreeMap<PageTitle, Overlay>>,
    report: Report,
}

impl Snapshot {
    /// Find a canon page by title.
    pub fn lookup_canon(&self, title: &PageTitle) -> StoreResult<&CanonPage> {
        self.canon
            .get(title)
            .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }

    /// Find a campaign's overlay for a title.
    pub fn lookup_overlay(&self, campaign: &CampaignId, title: &PageTitle) -> Option<&Overlay> {
        self.overlays.get(campaign)?.get(title)
    }

    pub fn has_canon(&self, title: &PageTitle) -> bool {
        self.canon.contains_key(title)
    }

    /// Canon pages ordered by title key.
    pub fn canon_pages(&self) -> impl Iterator<Item = &CanonPage> {
        self.canon.values()
    }

    pub fn canon_titles(&self) -> impl Iterator<Item = &PageTitle> {
        self.canon.keys()
    }

    /// Known campaigns, including those without overlays.
    pub fn campaigns(&self) -> impl Iterator<Item = &CampaignId> {
        self.overlays.keys()
    }

    pub fn has_campaign(&self, campaign: &CampaignId) -> bool {
        self.overlays.contains_key(campaign)
    }

    /// Overlays of one campaign ordered by title key.
    pub fn overlays_in<'a>(&'a self, campaign: &CampaignId) -> impl Iterator<Item = &'a Overlay> + 'a {
        self.overlays
            .get(campaign)
            .into_iter()
            .flat_map(|pages| pages.values())
    }

    /// Every title visible in a campaign: canon titles and the campaign's
    /// overlay titles, ordered by key.
    pub fn titles_in(&self, campaign: &CampaignId) -> Vec<PageTitle> {
        let mut titles: BTreeSet<&PageTitle> = self.canon.keys().collect();
        titles.extend(self.overlays_in(campaign).map(|overlay| &overlay.title));
        titles.into_iter().cloned().collect()
    }

    /// Whether a title names a page visible in the campaign.
    pub fn contains_title(&self, campaign: &CampaignId, title: &PageTitle) -> bool {
        self.has_canon(title) || self.lookup_overlay(campaign, title).is_some()
    }

    pub fn canon_count(&self) -> usize {
        self.canon.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.values().map(BTreeMap::len).sum()
    }

    /// Documents skipped while loading.
    pub fn report(&self) -> &Report {
        &self.report
    }
}

/// Assembles a snapshot, enforcing title uniqueness as pages arrive.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canon page; fails if its normalized title is taken.
    pub fn add_canon(&mut self, page: CanonPage) -> StoreResult<()> {
        if let Some(existing) = self.snapshot.canon.get(&page.title) {
            return Err(StoreError::DuplicateTitle {
                title: page.title.to_string(),
                first: existing.source.clone(),
                second: page.source,
            });
        }
        self.snapshot.canon.insert(page.title.clone(), page);
        Ok(())
    }

    /// Register a campaign even if it ends up with no overlays.
    pub fn add_campaign(&mut self, campaign: CampaignId) {
        self.snapshot.overlays.entry(campaign).or_default();
    }

    /// Add an overlay; fails if its campaign already has that title.
    pub fn add_overlay(&mut self, overlay: Overlay) -> StoreResult<()> {
        let pages = self.snapshot.overlays.entry(overlay.campaign.clone()).or_default();
        if let Some(existing) = pages.get(&overlay.title) {
            return Err(StoreError::DuplicateOverlay {
                campaign: overlay.campaign,
                title: overlay.title.to_string(),
                first: existing.source.clone(),
                second: overlay.source,
            });
        }
        pages.insert(overlay.title.clone(), overlay);
        Ok(())
    }

    /// Carry load diagnostics into the snapshot.
    pub fn report_mut(&mut self) -> &mut Report {
        &mut self.snapshot.report
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_pages::Frontmatter;

    fn campaign(id: &str) -> CampaignId {
        CampaignId::new(id).unwrap()
    }

    #[test]
    fn test_lookup() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add_canon(CanonPage::new("Nexus", Frontmatter::new(), "## History\n"))
            .unwrap();
        builder
            .add_overlay(Overlay::new(campaign("op-ghost"), "Vex", Frontmatter::new(), "New NPC.\n"))
            .unwrap();
        builder.add_campaign(campaign("quiet-ones"));
        let snapshot = builder.build();

        assert!(snapshot.lookup_canon(&PageTitle::new("nexus")).is_ok());
        assert!(matches!(
            snapshot.lookup_canon(&PageTitle::new("Vex")),
            Err(StoreError::NotFound(_))
        ));
        assert!(snapshot
            .lookup_overlay(&campaign("op-ghost"), &PageTitle::new("vex"))
            .is_some());
        assert!(snapshot
            .lookup_overlay(&campaign("quiet-ones"), &PageTitle::new("vex"))
            .is_none());

        let campaigns: Vec<_> = snapshot.campaigns().map(CampaignId::as_str).collect();
        assert_eq!(campaigns, vec!["op-ghost", "quiet-ones"]);
        assert_eq!(snapshot.titles_in(&campaign("op-ghost")).len(), 2);
        assert_eq!(snapshot.titles_in(&campaign("quiet-ones")).len(), 1);
    }

    #[test]
    fn test_duplicate_canon_title() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add_canon(CanonPage::new("Nexus", Frontmatter::new(), "").with_source("canon/Nexus.md"))
            .unwrap();
        let err = builder
            .add_canon(CanonPage::new("NEXUS", Frontmatter::new(), "").with_source("canon/old/NEXUS.md"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTitle { .. }));
        assert!(err.to_string().contains("canon/old/NEXUS.md"));
    }

    #[test]
    fn test_duplicate_overlay() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add_overlay(Overlay::new(campaign("op-ghost"), "Vex", Frontmatter::new(), ""))
            .unwrap();
        let err = builder
            .add_overlay(Overlay::new(campaign("op-ghost"), "vex", Frontmatter::new(), ""))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOverlay { .. }));

        // Same title in another campaign is fine.
        builder
            .add_overlay(Overlay::new(campaign("quiet-ones"), "Vex", Frontmatter::new(), ""))
            .unwrap();
    }
}
