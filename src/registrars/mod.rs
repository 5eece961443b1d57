//! Persistent-identifier registrars

pub mod datacite;
pub mod ezid;
mod http;
pub mod identifier_service;
pub mod null_registrar;
pub mod registrar_loader;
pub mod sequence;

#[cfg(test)]
pub(crate) mod testing;

pub use datacite::DataCiteRegistrar;
pub use ezid::EzidRegistrar;
pub use identifier_service::{IdentifierService, RegistrationOutcome};
pub use null_registrar::{NullRegistrar, UnsupportedRegistrar};
pub use registrar_loader::{RegistrarKind, RegistrarLoader};
pub use sequence::{LocalSequenceCounters, SequenceIdentifierGenerator};
