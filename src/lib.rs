pub mod adapters;
pub mod core;
pub mod export;
pub mod model;
pub mod notifications;
pub mod orchestration;
pub mod registrars;
pub mod validation;

pub use crate::core::*;
pub use export::{ExportCacheWriter, ExportOutcome, StandardExportRenderer, VersionDocument};
pub use model::{Collection, Dataset, DatasetVersion, GlobalId, VersionState};
pub use notifications::{FanOutReport, NotificationFanOut};
pub use orchestration::{DatasetPublisher, PublishReport, PublishServices};
pub use registrars::{IdentifierService, RegistrarKind, RegistrarLoader};
pub use validation::{PublicationPreconditions, VersionNumber, VersioningPolicy};
