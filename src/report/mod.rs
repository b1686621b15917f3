//! Digest report generation in markdown and HTML.

mod render;

pub use render::DigestRenderer;
