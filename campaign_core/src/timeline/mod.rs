//! Event Log and Timeline Generator.
//!
//! Events are appended to a per-campaign JSON-lines store. The timeline
//! document is derived from that store and fully recomputed on every
//! regeneration; only the region between the generation markers belongs to
//! the generator.

mod render;
mod store;

pub use render::*;
pub use store::*;

use std::path::PathBuf;
use thiserror::Error;

use campaign_pages::{RenderError, ValidationError};

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to access `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event text contains the timeline marker `{0}`")]
    MarkerInEvent(String),

    #[error("`{}` has malformed timeline markers: {reason}", .path.display())]
    MalformedMarkers { path: PathBuf, reason: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type TimelineResult<T> = Result<T, TimelineError>;
