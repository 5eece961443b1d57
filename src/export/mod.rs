//! Metadata export and its side cache

pub mod cache_writer;
pub mod document;
pub mod renderers;

pub use cache_writer::{ExportCacheWriter, ExportOutcome};
pub use document::VersionDocument;
pub use renderers::StandardExportRenderer;
