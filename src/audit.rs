//! Audit log
//!
//! Append-only record of every handbook and workflow mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Handbook structure
    SectionCreated,
    SectionRenumbered,
    DefinitionCreated,
    PolicyPublished,
    ProcedureStepRemoved,

    // Proposal lifecycle
    ProposalSubmitted,
    ProposalResubmitted,
    ProposalApproved,
    ProposalRejected,
    ProposalRevisionRequested,
    NoteAdded,

    // Apply results
    PolicyCreated,
    PolicyUpdated,
    PolicyArchived,

    // Reader questions
    RequestFiled,
    RequestResolved,
}

impl AuditEntry {
    pub fn new(action: AuditAction, resource_type: &str, resource_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id: None,
            action,
            resource_type: resource_type.to_string(),
            resource_id,
            details: None,
        }
    }

    pub fn by(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        debug!(
            "Audit: {:?} on {} {:?}",
            entry.action, entry.resource_type, entry.resource_id
        );
        let mut entries = self.entries.write().await;
        entries.push(entry);
    }

    /// Most recent entries first
    pub async fn query(
        &self,
        resource_type: Option<&str>,
        resource_id: Option<Uuid>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .filter(|e| {
                resource_type.map_or(true, |t| e.resource_type == t)
                    && resource_id.map_or(true, |id| e.resource_id == Some(id))
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_newest_first_with_filters() {
        let log = AuditLog::new();
        let proposal_id = Uuid::new_v4();
        log.record(AuditEntry::new(AuditAction::SectionCreated, "section", None))
            .await;
        log.record(AuditEntry::new(
            AuditAction::ProposalSubmitted,
            "proposal",
            Some(proposal_id),
        ))
        .await;
        log.record(
            AuditEntry::new(AuditAction::ProposalApproved, "proposal", Some(proposal_id))
                .by(Uuid::new_v4()),
        )
        .await;

        let entries = log.query(Some("proposal"), Some(proposal_id), 10).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::ProposalApproved);
        assert!(entries[0].actor_id.is_some());

        assert_eq!(log.query(None, None, 1).await.len(), 1);
    }
}
