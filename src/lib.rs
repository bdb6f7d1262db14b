//! Single-page PDF viewer core
//!
//! Renders one page at a time from a pluggable PDF engine into a retained
//! element tree, pre-rendering the neighbors of the displayed page and
//! keeping a bounded set of pages materialized.

pub mod bootstrap;
pub mod dom;
pub mod engine;
pub mod host;
pub mod layers;
pub mod link;
pub mod logging;
pub mod settings;
pub mod utils;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bootstrap::{Bootstrap, ViewerRequest};
pub use viewer::{PdfViewer, ViewerError, ViewerOptions};
