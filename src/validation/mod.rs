pub mod preconditions;
pub mod versioning;

pub use preconditions::PublicationPreconditions;
pub use versioning::{VersionNumber, VersioningPolicy};
