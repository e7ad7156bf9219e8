//! Document structure - the small slice of markdown the core understands.
//!
//! - **title**: page titles and their normalized keys
//! - **body**: heading sections and insertion anchors
//! - **link**: wiki-style link tokens

mod body;
mod link;
mod title;

pub use body::*;
pub use link::*;
pub use title::*;
