//! Merger - composes a resolved page from canon and overlay inputs.
//!
//! Merging is pure text work: it never reads files and never mutates its
//! inputs. Extensions are splices into the canon body, so every byte of
//! canon outside the inserted fragments survives unchanged.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

use campaign_pages::{
    extract_links, keys, render_document, CampaignId, CanonPage, Frontmatter, LinkToken, Overlay,
    PageTitle, RenderError,
};

use crate::resolver::Mode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("`{target}` has no heading `{anchor}` (from overlay `{overlay}`)")]
    AnchorNotFound {
        target: PageTitle,
        anchor: String,
        overlay: PageTitle,
    },

    #[error("overlay `{overlay}` names no `append_to` heading")]
    MissingAnchor { overlay: PageTitle },

    #[error("{mode} merge of `{title}` needs a {input} page")]
    MissingInput {
        mode: &'static str,
        title: String,
        input: &'static str,
    },

    #[error("extension targets `{expected}` but was given canon page `{found}`")]
    WrongTarget { expected: PageTitle, found: PageTitle },
}

pub type MergeResult<T> = Result<T, MergeError>;

/// One extension fragment placed into a resolved body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedFragment {
    /// Overlay the fragment came from.
    pub overlay: PageTitle,
    /// Anchor it was inserted under.
    pub anchor: String,
    /// Byte range of the fragment text within the resolved body.
    pub span: Range<usize>,
}

/// A page as one campaign sees it. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPage {
    pub title: PageTitle,
    pub campaign: CampaignId,
    pub mode: Mode,
    pub frontmatter: Frontmatter,
    pub body: String,
    /// Extension fragments, in body order.
    pub inserted: Vec<InsertedFragment>,
    /// Files the page was composed from, canon first.
    pub sources: Vec<PathBuf>,
}

impl ResolvedPage {
    /// Full document text: frontmatter block followed by the body.
    pub fn render(&self) -> Result<String, RenderError> {
        render_document(&self.frontmatter, &self.body)
    }

    /// Link tokens in the resolved body.
    pub fn links(&self) -> Vec<LinkToken> {
        extract_links(&self.body)
    }

    /// Text of an inserted fragment.
    pub fn fragment_text(&self, fragment: &InsertedFragment) -> &str {
        &self.body[fragment.span.clone()]
    }
}

/// Compose a page for an already resolved mode.
///
/// The inputs must match the mode: canon for everything but `New`, an
/// overlay for everything but `CanonOnly`. Inputs the mode does not use are
/// ignored.
pub fn merge(
    mode: &Mode,
    campaign: &CampaignId,
    canon: Option<&CanonPage>,
    overlay: Option<&Overlay>,
) -> MergeResult<ResolvedPage> {
    match mode {
        Mode::CanonOnly => {
            let canon = require(canon, mode, overlay.map(|o| &o.title), "canon")?;
            Ok(ResolvedPage {
                title: canon.title.clone(),
                campaign: campaign.clone(),
                mode: mode.clone(),
                frontmatter: canon.frontmatter.clone(),
                body: canon.body.text().to_string(),
                inserted: Vec::new(),
                sources: vec![canon.source.clone()],
            })
        }
        Mode::Override => {
            let overlay = require(overlay, mode, canon.map(|c| &c.title), "overlay")?;
            let canon = require(canon, mode, Some(&overlay.title), "canon")?;
            Ok(ResolvedPage {
                title: overlay.title.clone(),
                campaign: campaign.clone(),
                mode: mode.clone(),
                frontmatter: overlay.frontmatter.with_fallback(&canon.frontmatter),
                body: overlay.body.text().to_string(),
                inserted: Vec::new(),
                sources: vec![canon.source.clone(), overlay.source.clone()],
            })
        }
        Mode::New => {
            let overlay = require(overlay, mode, None, "overlay")?;
            Ok(ResolvedPage {
                title: overlay.title.clone(),
                campaign: campaign.clone(),
                mode: mode.clone(),
                frontmatter: overlay.frontmatter.clone(),
                body: overlay.body.text().to_string(),
                inserted: Vec::new(),
                sources: vec![overlay.source.clone()],
            })
        }
        Mode::Extend { target, anchor } => {
            let overlay = require(overlay, mode, Some(target), "overlay")?;
            let canon = require(canon, mode, Some(target), "canon")?;
            if canon.title != *target {
                return Err(MergeError::WrongTarget {
                    expected: target.clone(),
                    found: canon.title.clone(),
                });
            }
            splice(campaign, canon, &[(anchor.as_str(), overlay)])
        }
    }
}

/// Insert several extension fragments into one canon page.
///
/// Fragments apply in ascending `priority` (undeclared last), then by
/// source file name. Fragments sharing an anchor follow each other in that
/// order. Every overlay must name its anchor with `append_to`.
pub fn merge_fragments(
    campaign: &CampaignId,
    canon: &CanonPage,
    overlays: &[&Overlay],
) -> MergeResult<ResolvedPage> {
    let mut ordered: Vec<&Overlay> = overlays.to_vec();
    ordered.sort_by(|a, b| {
        fragment_priority(a)
            .cmp(&fragment_priority(b))
            .then_with(|| a.source_name().cmp(b.source_name()))
    });

    let anchors = ordered
        .iter()
        .map(|overlay| {
            overlay
                .append_to()
                .ok_or_else(|| MergeError::MissingAnchor {
                    overlay: overlay.title.clone(),
                })
        })
        .collect::<MergeResult<Vec<_>>>()?;

    let fragments: Vec<(&str, &Overlay)> = anchors
        .iter()
        .map(String::as_str)
        .zip(ordered.iter().copied())
        .collect();
    splice(campaign, canon, &fragments)
}

/// Undeclared priorities sort after every declared one.
fn fragment_priority(overlay: &Overlay) -> (bool, i64) {
    match overlay.priority() {
        Some(priority) => (false, priority),
        None => (true, 0),
    }
}

fn splice(
    campaign: &CampaignId,
    canon: &CanonPage,
    fragments: &[(&str, &Overlay)],
) -> MergeResult<ResolvedPage> {
    let text = canon.body.text();

    // Insertion points are computed on the untouched canon text, so earlier
    // fragments never shift where later ones land.
    let mut groups: BTreeMap<usize, Vec<(&str, &Overlay)>> = BTreeMap::new();
    for &(anchor, overlay) in fragments {
        let section = canon
            .body
            .find_anchor(anchor)
            .ok_or_else(|| MergeError::AnchorNotFound {
                target: canon.title.clone(),
                anchor: anchor.to_string(),
                overlay: overlay.title.clone(),
            })?;
        groups
            .entry(canon.body.insertion_point(section))
            .or_default()
            .push((anchor, overlay));
    }

    let added: usize = fragments.iter().map(|(_, o)| o.body.text().len() + 4).sum();
    let mut body = String::with_capacity(text.len() + added);
    let mut inserted = Vec::with_capacity(fragments.len());
    let mut cursor = 0;

    for (point, group) in groups {
        body.push_str(&text[cursor..point]);
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        for (anchor, overlay) in group {
            let fragment = trim_blank_lines(overlay.body.text());
            body.push('\n');
            let start = body.len();
            body.push_str(fragment);
            inserted.push(InsertedFragment {
                overlay: overlay.title.clone(),
                anchor: anchor.to_string(),
                span: start..body.len(),
            });
            body.push('\n');
        }
        if point < text.len() && !text[point..].starts_with('\n') {
            body.push('\n');
        }
        cursor = point;
    }
    body.push_str(&text[cursor..]);

    let mut frontmatter = canon.frontmatter.clone();
    let mut sources = vec![canon.source.clone()];
    for &(_, overlay) in fragments {
        frontmatter = frontmatter.overlaid_with(&overlay.frontmatter, keys::CONTROL);
        sources.push(overlay.source.clone());
    }

    let mode = match fragments.first() {
        Some(&(anchor, _)) => Mode::Extend {
            target: canon.title.clone(),
            anchor: anchor.to_string(),
        },
        None => Mode::CanonOnly,
    };

    Ok(ResolvedPage {
        title: canon.title.clone(),
        campaign: campaign.clone(),
        mode,
        frontmatter,
        body,
        inserted,
        sources,
    })
}

fn require<'a, T>(
    input: Option<&'a T>,
    mode: &Mode,
    title: Option<&PageTitle>,
    what: &'static str,
) -> MergeResult<&'a T> {
    input.ok_or_else(|| MergeError::MissingInput {
        mode: mode.name(),
        title: title.map(ToString::to_string).unwrap_or_default(),
        input: what,
    })
}

/// Drop leading blank lines and all trailing whitespace. Indentation of the
/// first real line is kept.
fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let first = text.find(|c: char| !c.is_whitespace()).unwrap_or(text.len());
    let line_start = text[..first].rfind('\n').map(|i| i + 1).unwrap_or(0);
    &text[line_start..]
}
