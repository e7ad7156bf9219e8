//! # Campaign Pages
//!
//! The document model of the campaign vault: how a page is split into
//! frontmatter and body, how its headings and links are located, and what a
//! campaign event looks like. This crate performs no file I/O; it only turns
//! text into typed values and back.
//!
//! ## Core Components
//!
//! - **frontmatter**: metadata block codec with typed accessors for known keys
//! - **document**: page titles, heading sections, link tokens
//! - **page**: canon pages, campaign overlays, campaign ids
//! - **event**: timeline events and their validation

pub mod document;
pub mod event;
pub mod frontmatter;
pub mod page;

pub use document::*;
pub use event::*;
pub use frontmatter::*;
pub use page::*;
