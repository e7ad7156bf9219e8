//! # Campaign Core
//!
//! Resolves campaign overlays against canon and keeps each campaign's
//! generated timeline up to date. This crate does all file I/O; the document
//! model lives in `campaign_pages`.
//!
//! ## Core Components
//!
//! - **store**: scans the vault into an immutable snapshot of canon pages and overlays
//! - **resolver**: picks the merge mode per title and campaign
//! - **merger**: override and extend composition with anchor-based insertion
//! - **view**: resolves whole campaigns and checks links
//! - **timeline**: append-only event log and idempotent timeline regeneration
//! - **report**: skipped and failed items of a run
//! - **config**: `overlay.toml` settings
//!
//! ## Design Philosophy
//!
//! - **Snapshot-Driven**: every resolution reads one immutable snapshot; a new run scans again
//! - **Localized Failure**: a bad page or event is reported and skipped, never fatal for its siblings
//! - **Derived Output**: the timeline is recomputed from events, never edited in place

pub mod config;
pub mod merger;
pub mod report;
pub mod resolver;
pub mod store;
pub mod timeline;
pub mod view;

pub use config::*;
pub use merger::*;
pub use report::*;
pub use resolver::*;
pub use store::*;
pub use timeline::*;
pub use view::*;
