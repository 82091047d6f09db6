//! Proposal storage
//!
//! Each proposal lives behind its own async mutex so that review decisions
//! and applies on the same proposal are serialized, while unrelated
//! proposals proceed independently.

use crate::error::{not_found_error, AppError};
use crate::proposal::{ChangeProposal, ProposalStatus, RequestKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type ProposalHandle = Arc<Mutex<ChangeProposal>>;

/// Optional filters for listing proposals
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    pub kind: Option<RequestKind>,
    pub target_policy: Option<Uuid>,
    pub submitter: Option<Uuid>,
}

impl ProposalFilter {
    fn matches(&self, p: &ChangeProposal) -> bool {
        self.status.map_or(true, |s| p.status == s)
            && self.kind.map_or(true, |k| p.request_kind == k)
            && self.target_policy.map_or(true, |t| p.target_policy == Some(t))
            && self.submitter.map_or(true, |s| p.submitter == s)
    }
}

/// Thread-safe proposal store
pub struct ProposalStore {
    proposals: Arc<RwLock<HashMap<Uuid, ProposalHandle>>>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn create(&self, proposal: ChangeProposal) -> ChangeProposal {
        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id, Arc::new(Mutex::new(proposal.clone())));
        proposal
    }

    /// Lockable handle to a single proposal
    pub async fn handle(&self, id: Uuid) -> Result<ProposalHandle, AppError> {
        let proposals = self.proposals.read().await;
        proposals
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error(format!("Proposal {} not found", id)))
    }

    pub async fn get(&self, id: Uuid) -> Result<ChangeProposal, AppError> {
        let handle = self.handle(id).await?;
        let proposal = handle.lock().await;
        Ok(proposal.clone())
    }

    /// List proposals matching the filter, oldest submission first
    pub async fn list(&self, filter: &ProposalFilter) -> Vec<ChangeProposal> {
        let handles: Vec<ProposalHandle> = {
            let proposals = self.proposals.read().await;
            proposals.values().cloned().collect()
        };

        let mut matching = Vec::new();
        for handle in handles {
            let proposal = handle.lock().await;
            if filter.matches(&proposal) {
                matching.push(proposal.clone());
            }
        }
        matching.sort_by_key(|p| p.submitted_at);
        matching
    }
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::{Section, SectionNumber};
    use crate::proposal::PolicyDraft;
    use chrono::Utc;

    fn new_proposal(title: &str) -> ChangeProposal {
        let section = Section {
            id: Uuid::new_v4(),
            title: "General".into(),
            number: SectionNumber::new(1),
            created_at: Utc::now(),
        };
        ChangeProposal::for_new(
            Uuid::new_v4(),
            &section,
            PolicyDraft {
                title: Some(title.into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = ProposalStore::new();
        let created = store.create(new_proposal("Leave")).await;

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched.proposed_title, "Leave");
    }

    #[tokio::test]
    async fn test_missing_proposal() {
        let store = ProposalStore::new();
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = ProposalStore::new();
        let first = store.create(new_proposal("One")).await;
        store.create(new_proposal("Two")).await;

        {
            let handle = store.handle(first.id).await.unwrap();
            let mut p = handle.lock().await;
            p.resolve(ProposalStatus::Rejected, Uuid::new_v4(), None, Utc::now())
                .unwrap();
        }

        let pending = store
            .list(&ProposalFilter {
                status: Some(ProposalStatus::Pending),
                ..Default::default()
            })
            .await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].proposed_title, "Two");
        assert_eq!(store.list(&ProposalFilter::default()).await.len(), 2);
    }
}
