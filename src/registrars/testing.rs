//! Scripted registrar for workflow tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::error::RegistrarError;
use crate::core::traits::IdentifierRegistrar;
use crate::model::Dataset;

/// Registrar that replays queued results and counts calls.
/// An empty queue answers `Ok(())` / `Ok(false)`.
#[derive(Default)]
pub struct ScriptedRegistrar {
    pub checks_first: bool,
    pub delay: Option<Duration>,
    pub create_results: Mutex<VecDeque<Result<(), RegistrarError>>>,
    pub exists_results: Mutex<VecDeque<Result<bool, RegistrarError>>>,
    pub publicize_results: Mutex<VecDeque<Result<(), RegistrarError>>>,
    pub create_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
    pub publicize_calls: AtomicUsize,
    pub created: Mutex<Vec<String>>,
}

impl ScriptedRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checking_existence() -> Self {
        Self {
            checks_first: true,
            ..Self::default()
        }
    }

    pub fn with_creates(self, results: Vec<Result<(), RegistrarError>>) -> Self {
        *self.create_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_exists(self, results: Vec<Result<bool, RegistrarError>>) -> Self {
        *self.exists_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_publicizes(self, results: Vec<Result<(), RegistrarError>>) -> Self {
        *self.publicize_results.lock().unwrap() = results.into();
        self
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn exists_checks(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn publicizes(&self) -> usize {
        self.publicize_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn collision(identifier: &str) -> RegistrarError {
    RegistrarError::AlreadyExists {
        provider: "scripted".to_string(),
        identifier: identifier.to_string(),
    }
}

pub fn unavailable() -> RegistrarError {
    RegistrarError::Unavailable {
        provider: "scripted".to_string(),
        status: 503,
    }
}

#[async_trait]
impl IdentifierRegistrar for ScriptedRegistrar {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_protocol(&self, protocol: &str) -> bool {
        protocol == "doi"
    }

    fn checks_existence_before_create(&self) -> bool {
        self.checks_first
    }

    async fn create_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let result = self.create_results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.created.lock().unwrap().push(dataset.label());
        }
        result
    }

    async fn identifier_exists(&self, _dataset: &Dataset) -> Result<bool, RegistrarError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.exists_results.lock().unwrap().pop_front().unwrap_or(Ok(false))
    }

    async fn publicize_identifier(&self, _dataset: &Dataset) -> Result<(), RegistrarError> {
        self.publicize_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.publicize_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
