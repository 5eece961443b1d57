//! Orchestration layer for dataset publication
//!
//! Ties the validation, identifier, notification, export and index steps
//! into the publish command.

pub mod ancestry;
pub mod dataset_locks;
pub mod dataset_publisher;
pub mod report;

pub use ancestry::load_ancestor_chain;
pub use dataset_locks::DatasetLocks;
pub use dataset_publisher::{DatasetPublisher, PublishServices};
pub use report::PublishReport;
