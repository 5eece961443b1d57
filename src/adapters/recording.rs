//! Local stand-ins for the search index and the notification service
//!
//! Both record what they were asked to do and log it, so a run can be
//! inspected without external services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

use crate::core::error::{IndexError, NotificationError};
use crate::core::traits::{IndexResponse, NotificationSink, SearchIndexer};
use crate::model::{
    AuthenticatedUser, Collection, CollectionId, Dataset, DatasetId, DvObjectRef, NotificationType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IndexCall {
    Dataset { id: DatasetId, cleanup: bool },
    Collection { id: CollectionId },
    Permissions { entity: DvObjectRef },
}

/// Search indexer that records each request
#[derive(Debug, Default)]
pub struct RecordingIndexer {
    calls: Mutex<Vec<IndexCall>>,
}

impl RecordingIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: IndexCall) {
        info!("Index request: {:?}", call);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl SearchIndexer for RecordingIndexer {
    async fn index_dataset(&self, dataset: &Dataset, cleanup: bool) -> Result<(), IndexError> {
        self.record(IndexCall::Dataset {
            id: dataset.id,
            cleanup,
        });
        Ok(())
    }

    async fn index_collection(&self, collection: &Collection) -> Result<(), IndexError> {
        self.record(IndexCall::Collection { id: collection.id });
        Ok(())
    }

    async fn index_permissions(&self, entity: DvObjectRef) -> Result<IndexResponse, IndexError> {
        self.record(IndexCall::Permissions { entity });
        Ok(IndexResponse {
            message: format!("permissions indexed for {}", entity),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotification {
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub event: NotificationType,
    pub subject: DvObjectRef,
}

/// Notification sink that logs and records each notification
#[derive(Debug, Default)]
pub struct LoggingNotificationSink {
    sent: Mutex<Vec<SentNotification>>,
}

impl LoggingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn send(
        &self,
        recipient: &AuthenticatedUser,
        timestamp: DateTime<Utc>,
        event: NotificationType,
        subject: DvObjectRef,
    ) -> Result<(), NotificationError> {
        info!("Notify {} of {:?} on {}", recipient.identifier, event, subject);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification {
                recipient: recipient.identifier.clone(),
                timestamp,
                event,
                subject,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetVersion, GlobalId};

    #[tokio::test]
    async fn test_recording_indexer_keeps_order() {
        let indexer = RecordingIndexer::new();
        let dataset = Dataset::new(
            2,
            GlobalId::new("doi", "10.5072", "/", "FK2IDX"),
            1,
            DatasetVersion::draft(1),
        );

        indexer.index_dataset(&dataset, true).await.unwrap();
        let response = indexer.index_permissions(DvObjectRef::Dataset(2)).await.unwrap();
        indexer
            .index_collection(&Collection::new(1, "root", None))
            .await
            .unwrap();

        assert_eq!(response.message, "permissions indexed for dataset#2");
        assert_eq!(
            indexer.calls(),
            vec![
                IndexCall::Dataset { id: 2, cleanup: true },
                IndexCall::Permissions {
                    entity: DvObjectRef::Dataset(2)
                },
                IndexCall::Collection { id: 1 },
            ]
        );
    }
}
