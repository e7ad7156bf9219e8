//! Campaign views - every page of a campaign resolved in one pass.
//!
//! A failing page is recorded in the view's report and left out; its
//! siblings still resolve. Extension overlays whose title differs from the
//! page they extend are folded into that page instead of standing alone.

use std::collections::BTreeSet;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use campaign_pages::{CampaignId, Overlay, PageTitle};

use crate::merger::{merge, merge_fragments, MergeError, ResolvedPage};
use crate::report::{IssueKind, Report};
use crate::resolver::{resolve, Mode, ResolveError};
use crate::store::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl ResolutionError {
    /// Report category for this failure.
    pub fn issue_kind(&self) -> IssueKind {
        match self {
            ResolutionError::Resolve(ResolveError::NotFound(_))
            | ResolutionError::Resolve(ResolveError::TargetNotFound { .. }) => IssueKind::TargetNotFound,
            ResolutionError::Resolve(ResolveError::MissingAnchor { .. })
            | ResolutionError::Merge(MergeError::MissingAnchor { .. }) => IssueKind::MissingAnchor,
            ResolutionError::Merge(MergeError::AnchorNotFound { .. }) => IssueKind::AnchorNotFound,
            ResolutionError::Merge(MergeError::MissingInput { .. })
            | ResolutionError::Merge(MergeError::WrongTarget { .. }) => IssueKind::MergeInput,
        }
    }
}

/// All resolvable pages of one campaign.
#[derive(Debug, Clone)]
pub struct CampaignView {
    pub campaign: CampaignId,
    /// Resolved pages ordered by title key.
    pub pages: Vec<ResolvedPage>,
    /// Pages and overlays that could not be resolved.
    pub report: Report,
}

impl CampaignView {
    pub fn page(&self, title: &PageTitle) -> Option<&ResolvedPage> {
        self.pages.iter().find(|page| page.title == *title)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Resolve one page as `campaign` sees it.
///
/// For an extension overlay titled differently from its target, this is the
/// target page with the extension applied.
pub fn resolve_page(
    title: &PageTitle,
    campaign: &CampaignId,
    snapshot: &Snapshot,
) -> Result<ResolvedPage, ResolutionError> {
    let mut skipped = Vec::new();
    let page = match resolve(title, campaign, snapshot)? {
        Mode::Extend { target, .. } => compose(&target, campaign, snapshot, &mut skipped)?,
        _ => compose(title, campaign, snapshot, &mut skipped)?,
    };
    match skipped.into_iter().find(|(overlay, _)| overlay == title) {
        Some((_, err)) => Err(err),
        None => Ok(page),
    }
}

/// Resolve every page visible in `campaign`.
pub fn resolve_campaign(campaign: &CampaignId, snapshot: &Snapshot) -> CampaignView {
    let started_at = Instant::now();
    let mut report = Report::new();
    let mut page_titles = BTreeSet::new();

    for title in snapshot.titles_in(campaign) {
        let subject = format!("{campaign}/{title}");
        let folded = snapshot
            .lookup_overlay(campaign, &title)
            .and_then(Overlay::extends)
            .filter(|target| *target != title);

        match (resolve(&title, campaign, snapshot), folded) {
            (Err(err), _) => {
                let err = ResolutionError::from(err);
                warn!(campaign = %campaign, title = %title, "page excluded: {err}");
                report.fail(err.issue_kind(), subject, err);
                // A canon page of the same title is still visible.
                if snapshot.has_canon(&title) && folded_or_none(snapshot, campaign, &title) {
                    page_titles.insert(title);
                }
            }
            (Ok(_), Some(target)) => {
                if let Some(own) = snapshot.lookup_overlay(campaign, &target) {
                    if own.extends().is_none() {
                        warn!(campaign = %campaign, title = %title, target = %target, "extension ignored: target is overridden");
                        report.warn(
                            IssueKind::MergeInput,
                            subject,
                            format!("`{target}` is overridden in this campaign; extension ignored"),
                        );
                    }
                }
                if snapshot.has_canon(&title) {
                    page_titles.insert(title);
                }
                page_titles.insert(target);
            }
            (Ok(_), None) => {
                page_titles.insert(title);
            }
        }
    }

    let mut pages = Vec::with_capacity(page_titles.len());
    for title in page_titles {
        let mut skipped = Vec::new();
        let composed = compose(&title, campaign, snapshot, &mut skipped);
        for (overlay, err) in skipped {
            warn!(campaign = %campaign, title = %overlay, target = %title, "extension dropped: {err}");
            report.fail(err.issue_kind(), format!("{campaign}/{overlay}"), err);
        }
        match composed {
            Ok(page) => {
                debug!(campaign = %campaign, title = %page.title, mode = page.mode.name(), "resolved page");
                pages.push(page);
            }
            Err(err) => {
                warn!(campaign = %campaign, title = %title, "page excluded: {err}");
                report.fail(err.issue_kind(), format!("{campaign}/{title}"), err);
            }
        }
    }

    info!(
        campaign = %campaign,
        pages = pages.len(),
        failed = report.failures().count(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "campaign resolved"
    );

    CampaignView {
        campaign: campaign.clone(),
        pages,
        report,
    }
}

/// Report links in resolved pages that point at no page visible in the
/// campaign.
pub fn check_links(view: &CampaignView, snapshot: &Snapshot) -> Report {
    let mut report = Report::new();
    for page in &view.pages {
        for link in page.links() {
            if !snapshot.contains_title(&view.campaign, &link.target) {
                report.warn(
                    IssueKind::DanglingLink,
                    format!("{}/{}", view.campaign, page.title),
                    format!("[[{}]] resolves to no page", link.target),
                );
            }
        }
    }
    report
}

/// Whether the title's own overlay, if any, is a failed extension rather
/// than a page of its own.
fn folded_or_none(snapshot: &Snapshot, campaign: &CampaignId, title: &PageTitle) -> bool {
    snapshot
        .lookup_overlay(campaign, title)
        .and_then(Overlay::extends)
        .map_or(true, |target| target != *title)
}

/// Build the page known as `title` in `campaign`.
///
/// Extensions titled differently from `title` whose heading is missing from
/// canon are pushed onto `skipped` and left out. A failing extension of the
/// page's own title fails the page.
fn compose(
    title: &PageTitle,
    campaign: &CampaignId,
    snapshot: &Snapshot,
    skipped: &mut Vec<(PageTitle, ResolutionError)>,
) -> Result<ResolvedPage, ResolutionError> {
    let canon = snapshot.lookup_canon(title).ok();
    let own = snapshot
        .lookup_overlay(campaign, title)
        .filter(|overlay| overlay.extends().is_none());

    if let Some(own) = own {
        let mode = if canon.is_some() { Mode::Override } else { Mode::New };
        return Ok(merge(&mode, campaign, canon, Some(own))?);
    }

    let Some(canon) = canon else {
        return Err(ResolveError::NotFound(title.clone()).into());
    };

    // Extensions with resolution errors are reported under their own title
    // and left out here.
    let mut fragments: Vec<&Overlay> = Vec::new();
    for overlay in snapshot
        .overlays_in(campaign)
        .filter(|overlay| overlay.extends().as_ref() == Some(title))
        .filter(|overlay| resolve(&overlay.title, campaign, snapshot).is_ok())
    {
        if overlay.title == *title {
            fragments.push(overlay);
            continue;
        }
        match overlay.append_to() {
            Some(anchor) if canon.body.find_anchor(&anchor).is_none() => {
                let err = MergeError::AnchorNotFound {
                    target: canon.title.clone(),
                    anchor,
                    overlay: overlay.title.clone(),
                };
                skipped.push((overlay.title.clone(), err.into()));
            }
            _ => fragments.push(overlay),
        }
    }

    if fragments.is_empty() {
        Ok(merge(&Mode::CanonOnly, campaign, Some(canon), None)?)
    } else {
        Ok(merge_fragments(campaign, canon, &fragments)?)
    }
}
