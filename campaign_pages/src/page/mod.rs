//! Canon pages, campaign overlays, and campaign identifiers.

mod campaign;

pub use campaign::*;

use std::path::{Path, PathBuf};

use crate::document::{Body, PageTitle};
use crate::frontmatter::{parse_document, Frontmatter, ParseError};

/// An authoritative reference page shared by every campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonPage {
    pub title: PageTitle,
    pub frontmatter: Frontmatter,
    pub body: Body,
    /// File the page was loaded from.
    pub source: PathBuf,
}

impl CanonPage {
    /// Create a page from already split parts.
    pub fn new(title: impl Into<PageTitle>, frontmatter: Frontmatter, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            frontmatter,
            body: Body::parse(body),
            source: PathBuf::new(),
        }
    }

    /// Parse a page from raw document text.
    pub fn parse(title: impl Into<PageTitle>, text: &str) -> Result<Self, ParseError> {
        let doc = parse_document(text)?;
        Ok(Self::new(title, doc.frontmatter, doc.body))
    }

    /// Record the file the page came from.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }
}

/// A campaign-specific page that overrides, extends, or adds to canon.
///
/// Whether it overrides, extends or stands alone is not stored; it follows
/// from its frontmatter and from what canon contains.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub campaign: CampaignId,
    pub title: PageTitle,
    pub frontmatter: Frontmatter,
    pub body: Body,
    /// File the overlay was loaded from.
    pub source: PathBuf,
}

impl Overlay {
    /// Create an overlay from already split parts.
    pub fn new(
        campaign: CampaignId,
        title: impl Into<PageTitle>,
        frontmatter: Frontmatter,
        body: impl Into<String>,
    ) -> Self {
        Self {
            campaign,
            title: title.into(),
            frontmatter,
            body: Body::parse(body),
            source: PathBuf::new(),
        }
    }

    /// Parse an overlay from raw document text.
    pub fn parse(
        campaign: CampaignId,
        title: impl Into<PageTitle>,
        text: &str,
    ) -> Result<Self, ParseError> {
        let doc = parse_document(text)?;
        Ok(Self::new(campaign, title, doc.frontmatter, doc.body))
    }

    /// Record the file the overlay came from.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Canon page this overlay extends, if it declares one.
    pub fn extends(&self) -> Option<PageTitle> {
        self.frontmatter.extends().map(PageTitle::new)
    }

    /// Heading the extension is inserted after.
    pub fn append_to(&self) -> Option<String> {
        self.frontmatter.append_to()
    }

    /// Declared ordering priority.
    pub fn priority(&self) -> Option<i64> {
        self.frontmatter.priority()
    }

    /// File name of the source, used as a tie-break when ordering fragments.
    pub fn source_name(&self) -> &str {
        self.source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Derive a page title from a file path (its stem).
pub fn title_from_path(path: &Path) -> Option<PageTitle> {
    let stem = path.file_stem()?.to_str()?;
    let title = PageTitle::new(stem);
    (!title.is_empty()).then_some(title)
}
