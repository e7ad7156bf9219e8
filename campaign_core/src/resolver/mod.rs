//! Resolver - decides, per title and campaign, how a page is composed.
//!
//! Resolution only looks at what exists in the snapshot. It reads no text
//! and never fails on anything the merger would catch later (like an anchor
//! heading that is not in the target page).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use campaign_pages::{CampaignId, PageTitle};

use crate::store::Snapshot;

/// How a resolved page is composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    /// No overlay; canon passes through unchanged.
    CanonOnly,
    /// Overlay replaces the canon page of the same title.
    Override,
    /// Overlay body is inserted into a canon page after an anchor heading.
    Extend { target: PageTitle, anchor: String },
    /// Overlay with no canon counterpart.
    New,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::CanonOnly => "canon_only",
            Mode::Override => "override",
            Mode::Extend { .. } => "extend",
            Mode::New => "new",
        }
    }

    /// Whether the resolved page needs an overlay as input.
    pub fn needs_overlay(&self) -> bool {
        !matches!(self, Mode::CanonOnly)
    }

    /// Whether the resolved page needs a canon page as input.
    pub fn needs_canon(&self) -> bool {
        !matches!(self, Mode::New)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Extend { target, anchor } => write!(f, "extend {target} @ {anchor}"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no page titled `{0}` in canon or campaign overlays")]
    NotFound(PageTitle),

    #[error("overlay `{title}` extends `{target}`, which is not a canon page")]
    TargetNotFound { title: PageTitle, target: PageTitle },

    #[error("overlay `{title}` extends `{target}` but names no `append_to` heading")]
    MissingAnchor { title: PageTitle, target: PageTitle },
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Pick the merge mode for `title` in `campaign`.
pub fn resolve(title: &PageTitle, campaign: &CampaignId, snapshot: &Snapshot) -> ResolveResult<Mode> {
    let has_canon = snapshot.has_canon(title);

    let Some(overlay) = snapshot.lookup_overlay(campaign, title) else {
        return if has_canon {
            Ok(Mode::CanonOnly)
        } else {
            Err(ResolveError::NotFound(title.clone()))
        };
    };

    match overlay.extends() {
        Some(target) => {
            if !snapshot.has_canon(&target) {
                return Err(ResolveError::TargetNotFound {
                    title: title.clone(),
                    target,
                });
            }
            let anchor = overlay.append_to().ok_or_else(|| ResolveError::MissingAnchor {
                title: title.clone(),
                target: target.clone(),
            })?;
            Ok(Mode::Extend { target, anchor })
        }
        None if has_canon => Ok(Mode::Override),
        None => Ok(Mode::New),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotBuilder;
    use campaign_pages::{CanonPage, Frontmatter, Overlay};

    fn op_ghost() -> CampaignId {
        CampaignId::new("op-ghost").unwrap()
    }

    fn snapshot() -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        for title in ["Nexus", "Iron Syndicate", "Harbor"] {
            builder
                .add_canon(CanonPage::new(title, Frontmatter::new(), "## History\nOld.\n"))
                .unwrap();
        }
        let overlays = [
            ("Iron Syndicate", Frontmatter::new().with("standing", "hostile")),
            (
                "Nexus",
                Frontmatter::new().with("extends", "Nexus").with("append_to", "## History"),
            ),
            ("Vex Moreau", Frontmatter::new().with("type", "npc")),
            ("Lost Notes", Frontmatter::new().with("extends", "Atlantis").with("append_to", "Intro")),
            ("Harbor Annex", Frontmatter::new().with("extends", "Harbor")),
        ];
        for (title, fm) in overlays {
            builder
                .add_overlay(Overlay::new(op_ghost(), title, fm, "Campaign text.\n"))
                .unwrap();
        }
        builder.add_campaign(CampaignId::new("quiet-ones").unwrap());
        builder.build()
    }

    #[test]
    fn test_canon_only() {
        let snapshot = snapshot();
        let mode = resolve(&PageTitle::new("Harbor"), &op_ghost(), &snapshot).unwrap();
        assert_eq!(mode, Mode::CanonOnly);
    }

    #[test]
    fn test_override_and_new() {
        let snapshot = snapshot();
        assert_eq!(
            resolve(&PageTitle::new("iron syndicate"), &op_ghost(), &snapshot),
            Ok(Mode::Override)
        );
        assert_eq!(
            resolve(&PageTitle::new("Vex Moreau"), &op_ghost(), &snapshot),
            Ok(Mode::New)
        );
    }

    #[test]
    fn test_extend() {
        let snapshot = snapshot();
        let mode = resolve(&PageTitle::new("Nexus"), &op_ghost(), &snapshot).unwrap();
        assert_eq!(
            mode,
            Mode::Extend {
                target: PageTitle::new("Nexus"),
                anchor: "## History".to_string(),
            }
        );
        assert_eq!(mode.name(), "extend");
    }

    #[test]
    fn test_campaigns_are_independent() {
        let snapshot = snapshot();
        let quiet = CampaignId::new("quiet-ones").unwrap();
        assert_eq!(resolve(&PageTitle::new("Nexus"), &quiet, &snapshot), Ok(Mode::CanonOnly));
        assert!(matches!(
            resolve(&PageTitle::new("Vex Moreau"), &quiet, &snapshot),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_extend_errors() {
        let snapshot = snapshot();
        assert!(matches!(
            resolve(&PageTitle::new("Lost Notes"), &op_ghost(), &snapshot),
            Err(ResolveError::TargetNotFound { .. })
        ));
        assert!(matches!(
            resolve(&PageTitle::new("Harbor Annex"), &op_ghost(), &snapshot),
            Err(ResolveError::MissingAnchor { .. })
        ));
    }
}
