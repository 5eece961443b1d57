//! Dataset Publisher - Main orchestrator of the publish command
//!
//! Runs the release of a draft version:
//! - Precondition checks and identifier registration
//! - Version numbering, file cascade and notifications
//! - Best-effort export to the side cache
//! - Persistence (the durability boundary)
//! - Subject propagation, contributor record, identifier publicization
//! - Search index synchronization
//!
//! Failures before persistence are clean rejections. Failures after it
//! are reported as partial states carrying the persisted dataset.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::ancestry::load_ancestor_chain;
use super::dataset_locks::DatasetLocks;
use super::report::PublishReport;
use crate::adapters::{InMemoryStore, TokioFileCache};
use crate::core::config::{PublishConfig, RegistrarConfig};
use crate::core::error::{IndexError, PublishError, StorageError};
use crate::core::retry::{RetryManager, RetryOptions, with_timeout};
use crate::core::state_machine::{ReleaseState, ReleaseStateMachine};
use crate::core::traits::{
    CollectionRepository, NotificationSink, PersistenceStore, SearchIndexer,
};
use crate::export::{ExportCacheWriter, ExportOutcome, StandardExportRenderer};
use crate::model::{
    Collection, Dataset, DatasetId, DvObjectRef, NotificationType, Permission, VersionId,
    VersionState, VersionUserRecord, normalize_user_identifier,
};
use crate::notifications::{FanOutReport, NotificationFanOut};
use crate::registrars::{IdentifierService, RegistrarLoader, SequenceIdentifierGenerator};
use crate::validation::{PublicationPreconditions, VersioningPolicy};

/// Collaborators of the publish command, wired once at startup
pub struct PublishServices {
    pub store: Arc<dyn PersistenceStore>,
    pub collections: Arc<dyn CollectionRepository>,
    pub identifiers: IdentifierService,
    pub notifications: NotificationFanOut,
    pub exporter: ExportCacheWriter,
    pub indexer: Arc<dyn SearchIndexer>,
    pub index_timeout: Duration,
    pub index_retry: RetryOptions,
}

impl PublishServices {
    /// Wire the services around a local store
    ///
    /// The registrar is chosen from the `:DoiProvider` setting; export,
    /// timeouts and retry come from the corresponding config sections.
    pub fn local(
        config: &PublishConfig,
        store: Arc<InMemoryStore>,
        indexer: Arc<dyn SearchIndexer>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, PublishError> {
        let timeouts = config.timeouts();
        let registrar = RegistrarLoader::new(timeouts.registrar())
            .load_from_settings(config, config.registrar.as_ref())?;

        let defaults = RegistrarConfig::default();
        let registrar_config = config.registrar.as_ref().unwrap_or(&defaults);
        let sequence = SequenceIdentifierGenerator::with_counters(
            registrar_config.shoulder(),
            registrar_config.sequence_start(),
            store.clone(),
        );

        Ok(Self {
            store: store.clone(),
            collections: store.clone(),
            identifiers: IdentifierService::new(
                registrar,
                Arc::new(sequence),
                timeouts.registrar(),
                config.retry_options(),
            ),
            notifications: NotificationFanOut::new(store, sink),
            exporter: ExportCacheWriter::new(
                Arc::new(StandardExportRenderer::new()),
                Arc::new(TokioFileCache::new()),
                config.export(),
            ),
            indexer,
            index_timeout: timeouts.index(),
            index_retry: config.retry_options(),
        })
    }
}

/// State of one publish run
struct Run {
    id: Uuid,
    now: DateTime<Utc>,
    machine: ReleaseStateMachine,
    warnings: Vec<String>,
}

impl Run {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            now: Utc::now(),
            machine: ReleaseStateMachine::new(),
            warnings: Vec::new(),
        }
    }
}

/// The publish command
pub struct DatasetPublisher {
    services: PublishServices,
    preconditions: PublicationPreconditions,
    versioning: VersioningPolicy,
    index_retry: RetryManager,
    locks: DatasetLocks,
}

impl DatasetPublisher {
    pub fn new(services: PublishServices) -> Self {
        let index_retry = RetryManager::new(services.index_retry.clone());
        Self {
            services,
            preconditions: PublicationPreconditions::new(),
            versioning: VersioningPolicy::new(),
            index_retry,
            locks: DatasetLocks::new(),
        }
    }

    /// Release the draft version of `dataset`
    ///
    /// # Arguments
    ///
    /// * `dataset` - Dataset holding the draft to release
    /// * `requester` - Identifier of the releasing user (`@alice` or `alice`)
    /// * `is_minor` - Request a minor instead of a major release
    pub async fn publish(
        &self,
        dataset: Dataset,
        requester: &str,
        is_minor: bool,
    ) -> Result<Dataset, PublishError> {
        self.publish_with_report(dataset, requester, is_minor)
            .await
            .map(|(dataset, _)| dataset)
    }

    /// Load, lock and release a dataset by id
    ///
    /// The dataset is reloaded after the lock is acquired, so a command that
    /// lost a race validates against the already released state.
    pub async fn publish_by_id(
        &self,
        id: DatasetId,
        requester: &str,
        is_minor: bool,
    ) -> Result<(Dataset, PublishReport), PublishError> {
        let _guard = self.locks.lock(id).await;
        let dataset = self
            .services
            .store
            .find_dataset(id)
            .await?
            .ok_or(PublishError::DatasetNotFound { id })?;

        self.publish_with_report(dataset, requester, is_minor).await
    }

    /// Run the preconditions and the provider check without mutating anything
    pub async fn check(&self, dataset: &Dataset, is_minor: bool) -> Result<(), PublishError> {
        let ancestors =
            load_ancestor_chain(self.services.collections.as_ref(), dataset.owner).await?;
        self.preconditions.check(dataset, &ancestors, is_minor)?;
        self.services.identifiers.check_supported(dataset)
    }

    /// Release the draft and return the persisted dataset with a run report
    pub async fn publish_with_report(
        &self,
        dataset: Dataset,
        requester: &str,
        is_minor: bool,
    ) -> Result<(Dataset, PublishReport), PublishError> {
        let started = Instant::now();
        let mut run = Run::new();

        info!(
            "[{}] Publishing {} ({} release) for {}",
            run.id,
            dataset.label(),
            if is_minor { "minor" } else { "major" },
            requester
        );

        match self.execute(dataset, requester, is_minor, &mut run).await {
            Ok((dataset, mut report)) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    "[{}] Published {} as version {} in {}ms",
                    run.id, report.persistent_id, report.version, report.duration_ms
                );
                Ok((dataset, report))
            }
            Err(e) => {
                run.machine.fail(e.to_string());
                if e.is_partial_state() {
                    error!("[{}] Release persisted, then failed ({}): {}", run.id, e.code(), e);
                } else {
                    warn!("[{}] Publish rejected ({}): {}", run.id, e.code(), e);
                }
                debug!("[{}] State history:\n{}", run.id, run.machine.get_history());
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        mut dataset: Dataset,
        requester: &str,
        is_minor: bool,
        run: &mut Run,
    ) -> Result<(Dataset, PublishReport), PublishError> {
        let services = &self.services;
        let now = run.now;
        let requester_id = normalize_user_identifier(requester).to_string();

        // Preconditions
        run.machine.advance(ReleaseState::Validating, None)?;
        let ancestors = load_ancestor_chain(services.collections.as_ref(), dataset.owner).await?;
        self.preconditions.check(&dataset, &ancestors, is_minor)?;

        // Identifier
        let registration = services.identifiers.ensure_registered(&mut dataset, now).await?;
        run.machine.advance(
            ReleaseState::IdentifierEnsured,
            Some(services.identifiers.provider().to_string()),
        )?;

        // Version number; first publication notifies download holders before stamping
        let first_publication = !dataset.has_prior_publication();
        let version = self.versioning.next_version(&dataset, is_minor);
        let mut notifications = FanOutReport::default();
        if first_publication {
            notifications = services
                .notifications
                .notify_capability_holders(
                    DvObjectRef::Dataset(dataset.id),
                    Permission::DownloadFile,
                    NotificationType::AssignRole,
                    now,
                )
                .await;
            dataset.publication_date = Some(now);
            dataset.release_user = Some(requester_id.clone());
        }
        run.machine.advance(ReleaseState::Versioned, Some(version.to_string()))?;

        let label = dataset.label();
        let draft = dataset
            .edit_version_mut()
            .ok_or(PublishError::AlreadyReleased { dataset: label })?;
        draft.major = version.major;
        draft.minor = version.minor;
        draft.release_time = Some(now);
        draft.last_update_time = Some(now);
        draft.in_review = false;
        draft.state = VersionState::Released;
        let version_id = draft.id;
        let file_access_request = draft.terms.file_access_request;
        let subjects = draft.subject_terms();
        dataset.modification_time = Some(now);

        // File cascade
        for file in dataset.files.iter_mut() {
            if file.publication_date.is_none() {
                file.publication_date = Some(now);
                let report = services
                    .notifications
                    .notify_capability_holders(
                        DvObjectRef::File(file.id),
                        Permission::DownloadFile,
                        NotificationType::GrantFileAccess,
                        now,
                    )
                    .await;
                notifications.merge(report);
            }
            if let Some(metadata) = &file.metadata
                && metadata.version_id == version_id
            {
                file.restricted = metadata.restricted;
            }
        }
        dataset.file_access_request = file_access_request;
        run.machine.advance(ReleaseState::FilesCascaded, None)?;

        // Export (best-effort)
        let export = services.exporter.write_export(&mut dataset, now).await;
        if let ExportOutcome::Failed { error } = &export {
            run.warnings.push(format!("export failed: {}", error));
        }
        run.machine.advance(ReleaseState::Exported, None)?;

        // Durability boundary
        let saved = services.store.merge_dataset(dataset).await?;
        run.machine.advance(ReleaseState::Persisted, None)?;
        info!("[{}] {} persisted as RELEASED", run.id, saved.label());

        let reindex = self.propagate_subjects(&ancestors, &subjects, run).await;

        self.record_version_user(version_id, &requester_id, now)
            .await
            .map_err(|source| PublishError::RecordVersionUser {
                dataset: Box::new(saved.clone()),
                source,
            })?;

        let identifier_publicized = services
            .identifiers
            .publicize(&saved)
            .await
            .map_err(|source| PublishError::RegistrarPublicize {
                dataset: Box::new(saved.clone()),
                source,
            })?;
        run.machine.advance(
            ReleaseState::IdentifierPublicized,
            Some(if identifier_publicized { "publicized" } else { "not required" }.to_string()),
        )?;

        self.synchronize_index(&saved, &reindex).await?;
        run.machine.advance(ReleaseState::Indexed, None)?;

        let report = PublishReport {
            run_id: run.id,
            dataset_id: saved.id,
            persistent_id: saved.label(),
            version,
            first_publication,
            registration,
            notifications,
            export,
            reindexed_collections: reindex.iter().map(|c| c.id).collect(),
            identifier_publicized,
            warnings: run.warnings.clone(),
            state: run.machine.get_state_data(),
            duration_ms: 0,
        };
        Ok((saved, report))
    }

    /// Merge the released subjects into every ancestor; returns the
    /// ancestors whose subject set changed
    async fn propagate_subjects(
        &self,
        ancestors: &[Collection],
        subjects: &[String],
        run: &mut Run,
    ) -> Vec<Collection> {
        let mut changed = Vec::new();
        if subjects.is_empty() {
            return changed;
        }

        for ancestor in ancestors {
            let mut updated = ancestor.clone();
            if !updated.merge_subjects(subjects.iter().cloned()) {
                continue;
            }
            match self.services.collections.merge_collection(updated).await {
                Ok(saved) => changed.push(saved),
                Err(e) => {
                    warn!("[{}] Subject merge into {} failed: {}", run.id, ancestor.alias, e);
                    run.warnings
                        .push(format!("subject merge into {} failed: {}", ancestor.alias, e));
                }
            }
        }
        changed
    }

    /// Upsert the (version, user) record
    async fn record_version_user(
        &self,
        version_id: VersionId,
        user_identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let store = &self.services.store;
        let record = match store.find_version_user(version_id, user_identifier).await? {
            Some(mut existing) => {
                existing.last_update = now;
                existing
            }
            None => VersionUserRecord {
                version_id,
                user_identifier: user_identifier.to_string(),
                last_update: now,
            },
        };
        store.merge_version_user(record).await?;
        Ok(())
    }

    /// Reindex the dataset, its permissions and the changed ancestors.
    /// Every target is attempted; failures are reported together.
    async fn synchronize_index(
        &self,
        dataset: &Dataset,
        collections: &[Collection],
    ) -> Result<(), PublishError> {
        let indexer = &self.services.indexer;
        let entity = DvObjectRef::Dataset(dataset.id);
        let mut failed_targets = Vec::new();
        let mut first_error = None;

        let target = entity.to_string();
        if let Err(e) = self
            .index_call(&target, || indexer.index_dataset(dataset, true))
            .await
        {
            failed_targets.push(target);
            first_error.get_or_insert(e);
        }

        let target = format!("permissions of {}", entity);
        match self
            .index_call(&target, || indexer.index_permissions(entity))
            .await
        {
            Ok(response) => debug!("{}", response.message),
            Err(e) => {
                failed_targets.push(target);
                first_error.get_or_insert(e);
            }
        }

        for collection in collections {
            let target = DvObjectRef::Collection(collection.id).to_string();
            if let Err(e) = self
                .index_call(&target, || indexer.index_collection(collection))
                .await
            {
                failed_targets.push(target);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            None => Ok(()),
            Some(source) => Err(PublishError::IndexSync {
                dataset: Box::new(dataset.clone()),
                failed_targets,
                source,
            }),
        }
    }

    async fn index_call<T, F, Fut>(&self, target: &str, mut operation: F) -> Result<T, IndexError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let limit = self.services.index_timeout;
        self.index_retry
            .retry(|| {
                with_timeout(limit, operation(), |after| IndexError::Timeout {
                    target: target.to_string(),
                    after,
                })
            })
            .await
    }
}
