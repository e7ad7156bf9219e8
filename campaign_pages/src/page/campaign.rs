//! Campaign identifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected campaign identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid campaign id `{0}`: must be a non-empty directory name without separators or a leading dot")]
pub struct InvalidCampaignId(pub String);

/// Identifier of a campaign; also the name of its directory under the
/// campaigns root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CampaignId(String);

impl CampaignId {
    /// Validate and wrap a campaign id.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidCampaignId> {
        let id = id.into();
        let trimmed = id.trim();
        let valid = !trimmed.is_empty()
            && trimmed == id
            && !id.starts_with('.')
            && !id.contains(['/', '\\', '\0']);
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidCampaignId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CampaignId {
    type Error = InvalidCampaignId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CampaignId {
    type Error = InvalidCampaignId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CampaignId> for String {
    fn from(value: CampaignId) -> Self {
        value.0
    }
}

impl AsRef<str> for CampaignId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
