//! Notification fan-out
//!
//! Dispatches one notification per account holder entitled to a
//! capability on a dataset or file. Delivery is best-effort: every failure
//! is logged and counted, none is returned to the caller.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::core::traits::{NotificationSink, RoleAssigneeResolver};
use crate::model::{DvObjectRef, NotificationType, Permission};

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutReport {
    /// Account holders a notification was attempted for
    pub recipients: Vec<String>,
    pub delivered: usize,
    pub failed: usize,
}

impl FanOutReport {
    pub fn merge(&mut self, other: FanOutReport) {
        self.recipients.extend(other.recipients);
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

pub struct NotificationFanOut {
    resolver: Arc<dyn RoleAssigneeResolver>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationFanOut {
    pub fn new(resolver: Arc<dyn RoleAssigneeResolver>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { resolver, sink }
    }

    /// Notify every holder of `capability` on `entity`
    ///
    /// Recipients are taken from the roles assigned directly on `entity`.
    /// Group expansion (and de-duplication) is left to the resolver.
    pub async fn notify_capability_holders(
        &self,
        entity: DvObjectRef,
        capability: Permission,
        event: NotificationType,
        timestamp: DateTime<Utc>,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();

        let assignments = match self.resolver.direct_role_assignments(entity).await {
            Ok(assignments) => assignments,
            Err(e) => {
                warn!("Skipping notifications for {}: {}", entity, e);
                return report;
            }
        };

        for assignment in assignments.iter().filter(|a| a.role.grants(capability)) {
            let assignee = match self.resolver.resolve_assignee(&assignment.assignee).await {
                Ok(Some(assignee)) => assignee,
                Ok(None) => {
                    warn!("Unknown assignee {} on {}", assignment.assignee, entity);
                    continue;
                }
                Err(e) => {
                    warn!("Could not resolve {} on {}: {}", assignment.assignee, entity, e);
                    continue;
                }
            };

            let holders = match self.resolver.expand_to_account_holders(&assignee).await {
                Ok(holders) => holders,
                Err(e) => {
                    warn!("Could not expand {}: {}", assignment.assignee, e);
                    continue;
                }
            };

            for holder in holders {
                report.recipients.push(holder.identifier.clone());
                match self.sink.send(&holder, timestamp, event, entity).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!("{}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        debug!(
            "{:?} on {}: {} delivered, {} failed",
            event, entity, report.delivered, report.failed
        );
        report
    }
}
