//! Identifier service - ensures a dataset holds a registered identifier
//!
//! Creation is attempted at most twice: once with the current identifier
//! and, after a collision, once with a freshly generated one. Every provider
//! call runs under a deadline. Publicization is retried with backoff on
//! transient failures only.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{PublishError, RegistrarError};
use crate::core::retry::{RetryManager, RetryOptions, with_timeout};
use crate::core::traits::{IdentifierRegistrar, IdentifierSequence};
use crate::model::{Dataset, Registration};

/// First attempt plus one with a regenerated identifier
const MAX_CREATE_ATTEMPTS: u32 = 2;

/// Result of `ensure_registered`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RegistrationOutcome {
    /// Registered by an earlier run; no provider call was made
    AlreadyRegistered { at: DateTime<Utc> },
    Registered {
        identifier: String,
        regenerated: bool,
        at: DateTime<Utc>,
    },
}

pub struct IdentifierService {
    registrar: Arc<dyn IdentifierRegistrar>,
    sequence: Arc<dyn IdentifierSequence>,
    timeout: Duration,
    retry: RetryManager,
}

impl IdentifierService {
    pub fn new(
        registrar: Arc<dyn IdentifierRegistrar>,
        sequence: Arc<dyn IdentifierSequence>,
        timeout: Duration,
        retry: RetryOptions,
    ) -> Self {
        Self {
            registrar,
            sequence,
            timeout,
            retry: RetryManager::new(retry),
        }
    }

    pub fn provider(&self) -> &str {
        self.registrar.name()
    }

    /// Register the dataset's identifier unless it already is
    ///
    /// On success the registration is stamped with `now`. A collision
    /// regenerates the local identifier in place before the single retry.
    pub async fn ensure_registered(
        &self,
        dataset: &mut Dataset,
        now: DateTime<Utc>,
    ) -> Result<RegistrationOutcome, PublishError> {
        if let Registration::Registered { at } = dataset.registration {
            debug!("{} already registered at {}", dataset.label(), at);
            return Ok(RegistrationOutcome::AlreadyRegistered { at });
        }

        self.check_supported(dataset)?;

        let mut attempt = 1;
        loop {
            match self.create(dataset).await {
                Ok(()) => {
                    dataset.registration = Registration::Registered { at: now };
                    info!(
                        "[{}] Registered {} (attempt {})",
                        self.registrar.name(),
                        dataset.label(),
                        attempt
                    );
                    return Ok(RegistrationOutcome::Registered {
                        identifier: dataset.label(),
                        regenerated: attempt > 1,
                        at: now,
                    });
                }
                Err(RegistrarError::AlreadyExists { .. }) if attempt < MAX_CREATE_ATTEMPTS => {
                    let global_id = &dataset.global_id;
                    let fresh = self
                        .sequence
                        .generate(&global_id.protocol, &global_id.authority, &global_id.separator)
                        .await?;
                    warn!(
                        "[{}] {} already exists, retrying as {}",
                        self.registrar.name(),
                        dataset.label(),
                        fresh
                    );
                    dataset.global_id.identifier = fresh;
                    attempt += 1;
                }
                Err(RegistrarError::AlreadyExists { .. }) => {
                    return Err(PublishError::IdentifierCollision {
                        identifier: dataset.label(),
                    });
                }
                Err(RegistrarError::UnsupportedProvider { provider, protocol }) => {
                    return Err(PublishError::UnsupportedProvider { provider, protocol });
                }
                Err(source) => return Err(PublishError::RegistrarCreate { source }),
            }
        }
    }

    /// Fail with `UnsupportedProvider` if an unregistered dataset could not
    /// be registered with the configured provider
    pub fn check_supported(&self, dataset: &Dataset) -> Result<(), PublishError> {
        if dataset.registration.is_registered() {
            return Ok(());
        }

        let protocol = &dataset.global_id.protocol;
        if !self.registrar.is_supported() || !self.registrar.supports_protocol(protocol) {
            return Err(PublishError::UnsupportedProvider {
                provider: self.registrar.name().to_string(),
                protocol: protocol.clone(),
            });
        }
        Ok(())
    }

    /// Whether `publicize` would contact the provider for this dataset
    pub fn requires_publicize(&self, dataset: &Dataset) -> bool {
        self.registrar.is_supported()
            && self.registrar.requires_publicize()
            && self.registrar.supports_protocol(&dataset.global_id.protocol)
    }

    /// Make the identifier publicly resolvable
    ///
    /// Returns `Ok(false)` when the provider has nothing to publicize.
    pub async fn publicize(&self, dataset: &Dataset) -> Result<bool, RegistrarError> {
        if !self.requires_publicize(dataset) {
            debug!("[{}] Nothing to publicize for {}", self.registrar.name(), dataset.label());
            return Ok(false);
        }

        self.retry
            .retry(|| self.call(self.registrar.publicize_identifier(dataset)))
            .await?;
        Ok(true)
    }

    async fn create(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        if self.registrar.checks_existence_before_create()
            && self.call(self.registrar.identifier_exists(dataset)).await?
        {
            return Err(RegistrarError::AlreadyExists {
                provider: self.registrar.name().to_string(),
                identifier: dataset.label(),
            });
        }
        self.call(self.registrar.create_identifier(dataset)).await
    }

    async fn call<T>(
        &self,
        operation: impl Future<Output = Result<T, RegistrarError>>,
    ) -> Result<T, RegistrarError> {
        with_timeout(self.timeout, operation, |after| RegistrarError::Timeout {
            provider: self.registrar.name().to_string(),
            after,
        })
        .await
    }
}
