//! Domain model for dataset publication

pub mod access;
pub mod collection;
pub mod dataset;

pub use access::*;
pub use collection::*;
pub use dataset::*;
