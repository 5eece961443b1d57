//! Registrars without an external service
//!
//! `NullRegistrar` records identifiers locally only. `UnsupportedRegistrar`
//! stands in for an unknown or misconfigured provider and refuses every
//! call.

use async_trait::async_trait;

use crate::core::error::RegistrarError;
use crate::core::traits::IdentifierRegistrar;
use crate::model::Dataset;

/// Local-only registration; nothing is ever sent to a provider
#[derive(Debug, Default)]
pub struct NullRegistrar;

impl NullRegistrar {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentifierRegistrar for NullRegistrar {
    fn name(&self) -> &str {
        "none"
    }

    fn supports_protocol(&self, _protocol: &str) -> bool {
        true
    }

    fn requires_publicize(&self) -> bool {
        false
    }

    async fn create_identifier(&self, _dataset: &Dataset) -> Result<(), RegistrarError> {
        Ok(())
    }

    async fn identifier_exists(&self, _dataset: &Dataset) -> Result<bool, RegistrarError> {
        Ok(false)
    }

    async fn publicize_identifier(&self, _dataset: &Dataset) -> Result<(), RegistrarError> {
        Ok(())
    }
}

/// Provider that is unknown or lacks its configuration
#[derive(Debug)]
pub struct UnsupportedRegistrar {
    provider: String,
}

impl UnsupportedRegistrar {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    fn refuse(&self, dataset: &Dataset) -> RegistrarError {
        RegistrarError::UnsupportedProvider {
            provider: self.provider.clone(),
            protocol: dataset.global_id.protocol.clone(),
        }
    }
}

#[async_trait]
impl IdentifierRegistrar for UnsupportedRegistrar {
    fn name(&self) -> &str {
        &self.provider
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn supports_protocol(&self, _protocol: &str) -> bool {
        false
    }

    fn requires_publicize(&self) -> bool {
        false
    }

    async fn create_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        Err(self.refuse(dataset))
    }

    async fn identifier_exists(&self, dataset: &Dataset) -> Result<bool, RegistrarError> {
        Err(self.refuse(dataset))
    }

    async fn publicize_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        Err(self.refuse(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetVersion, GlobalId};

    fn dataset() -> Dataset {
        Dataset::new(
            1,
            GlobalId::new("hdl", "1902.1", "/", "10001"),
            1,
            DatasetVersion::draft(1),
        )
    }

    #[tokio::test]
    async fn test_null_registrar_accepts_everything() {
        let registrar = NullRegistrar::new();

        assert!(registrar.supports_protocol("hdl"));
        assert!(!registrar.requires_publicize());
        assert!(registrar.create_identifier(&dataset()).await.is_ok());
        assert!(!registrar.identifier_exists(&dataset()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_registrar_refuses() {
        let registrar = UnsupportedRegistrar::new("Handle.net");

        assert!(!registrar.is_supported());
        let error = registrar.create_identifier(&dataset()).await.unwrap_err();
        assert_eq!(
            error,
            RegistrarError::UnsupportedProvider {
                provider: "Handle.net".to_string(),
                protocol: "hdl".to_string()
            }
        );
    }
}
