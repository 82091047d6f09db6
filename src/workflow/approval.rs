//! Approval workflow
//!
//! Moves proposals out of `pending` and, on approval, commits them to the
//! handbook. Commits run optimistically: a read phase resolves every
//! reference and pins the section's numbering revision, the commit phase
//! re-checks it, and a moved revision retries the whole apply.

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::config::WorkflowConfig;
use crate::error::{not_found_error, validation_error, AppError};
use crate::handbook::{ArchivalEngine, DocumentStore, Handbook, NewPolicy, Policy};
use crate::proposal::{
    diff, ApplyOutcome, ChangeProposal, FieldDiff, PolicyDraft, ProposalFilter, ProposalStatus,
    ProposalStore, RequestKind,
};
use crate::workflow::identity::IdentityProvider;
use crate::workflow::notify::{self, Notification, NotificationOutcome, Notifier};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What a submitter asks for
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "requestKind", rename_all = "snake_case")]
pub enum ProposalRequest {
    #[serde(rename_all = "camelCase")]
    New {
        section_id: Uuid,
        #[serde(flatten)]
        draft: PolicyDraft,
    },
    #[serde(rename_all = "camelCase")]
    Edit {
        policy_id: Uuid,
        #[serde(flatten)]
        draft: PolicyDraft,
    },
    #[serde(rename_all = "camelCase")]
    Archive { policy_id: Uuid },
}

// =============================================================================
// APPLY
// =============================================================================

/// Commit a pending proposal's proposed state into the handbook.
///
/// Runs against a transaction's working copy; any error leaves the live
/// handbook untouched.
pub fn apply(
    handbook: &mut Handbook,
    proposal: &ChangeProposal,
    now: DateTime<Utc>,
) -> Result<ApplyOutcome, AppError> {
    proposal.ensure_pending()?;

    match proposal.request_kind {
        RequestKind::New => {
            let definitions = proposal.active_definition_ids();
            let related = proposal.related_policy_set();
            handbook.check_references(&definitions, &related)?;

            let policy = handbook.insert_policy(
                NewPolicy {
                    section_id: proposal.section_id,
                    title: proposal.proposed_title.clone(),
                    review_period: proposal.proposed_review_period,
                    purpose: proposal.proposed_purpose.clone(),
                    scope: proposal.proposed_scope.clone(),
                    statements: proposal.proposed_statements.clone(),
                    responsibilities: proposal.proposed_responsibilities.clone(),
                    owning_department: proposal.owning_department,
                    related_policies: related,
                    definitions,
                    steps: proposal.active_steps(),
                },
                now,
            )?;
            Ok(ApplyOutcome::Created {
                policy_id: policy.id,
                number: policy.number,
            })
        }
        RequestKind::Edit => {
            let target = target_of(proposal)?;
            handbook.check_references(
                &proposal.active_definition_ids(),
                &proposal.related_policy_set(),
            )?;

            let policy = handbook.policy_mut(target)?;
            for update in proposal.field_updates() {
                update.apply_to(policy);
            }
            policy.version = policy.version.bump_major();
            policy.updated_at = now;
            Ok(ApplyOutcome::Updated {
                policy_id: policy.id,
                version: policy.version,
            })
        }
        RequestKind::Archive => {
            let archived = ArchivalEngine::archive(handbook, target_of(proposal)?, now)?;
            Ok(ApplyOutcome::Archived {
                archived_id: archived.id,
                number: archived.number,
            })
        }
    }
}

fn target_of(proposal: &ChangeProposal) -> Result<Uuid, AppError> {
    proposal.target_policy.ok_or_else(|| {
        validation_error(format!("Proposal {} has no target policy", proposal.id))
    })
}

/// Read phase: every reference must resolve, and numbering-sensitive
/// requests pin the section revision they were checked against.
fn prepare(handbook: &Handbook, proposal: &ChangeProposal) -> Result<Vec<(Uuid, u64)>, AppError> {
    handbook.section(proposal.section_id)?;
    if proposal.request_kind != RequestKind::Archive {
        handbook.check_references(
            &proposal.active_definition_ids(),
            &proposal.related_policy_set(),
        )?;
    }
    if let Some(target) = proposal.target_policy {
        handbook.policy(target)?;
    }

    Ok(match proposal.request_kind {
        RequestKind::New | RequestKind::Archive => {
            vec![(proposal.section_id, handbook.revision(proposal.section_id))]
        }
        RequestKind::Edit => Vec::new(),
    })
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts
async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, AppError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!("Apply attempt {} hit a numbering conflict: {}", attempt, e);
                attempt += 1;
                tokio::task::yield_now().await;
            }
            result => return result,
        }
    }
}

// =============================================================================
// WORKFLOW
// =============================================================================

pub struct ApprovalWorkflow {
    documents: Arc<DocumentStore>,
    proposals: Arc<ProposalStore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<AuditLog>,
    config: WorkflowConfig,
}

impl ApprovalWorkflow {
    pub fn new(
        documents: Arc<DocumentStore>,
        proposals: Arc<ProposalStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<AuditLog>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            documents,
            proposals,
            identity,
            notifier,
            audit,
            config,
        }
    }

    /// Stage a new/edit/archive request as a pending proposal
    pub async fn submit(
        &self,
        submitter: Uuid,
        request: ProposalRequest,
    ) -> Result<ChangeProposal, AppError> {
        let now = Utc::now();
        let (proposal, live) = match request {
            ProposalRequest::New { section_id, mut draft } => {
                if draft.owning_department.is_none() {
                    draft.owning_department = Some(self.identity.actor(submitter).await?.department);
                }
                let section = self.documents.get_section(section_id).await?;
                (ChangeProposal::for_new(submitter, &section, draft, now)?, None)
            }
            ProposalRequest::Edit { policy_id, draft } => {
                let policy = self.documents.get_policy(policy_id).await?;
                (ChangeProposal::for_edit(submitter, &policy, draft, now)?, Some(policy))
            }
            ProposalRequest::Archive { policy_id } => {
                let policy = self.documents.get_policy(policy_id).await?;
                (ChangeProposal::for_archive(submitter, &policy, now), Some(policy))
            }
        };

        self.ensure_can_submit(submitter, &proposal, live.as_ref()).await?;
        let proposal = self.proposals.create(proposal).await;

        self.audit
            .record(
                AuditEntry::new(AuditAction::ProposalSubmitted, "proposal", Some(proposal.id))
                    .by(submitter)
                    .with_details(json!({
                        "requestKind": proposal.request_kind,
                        "policy": proposal.policy_identity(),
                    })),
            )
            .await;
        info!(
            "Proposal {} submitted ({:?} {})",
            proposal.id,
            proposal.request_kind,
            proposal.policy_identity()
        );
        Ok(proposal)
    }

    /// Approve a pending proposal and commit it
    pub async fn approve(
        &self,
        reviewer: Uuid,
        proposal_id: Uuid,
        note: Option<String>,
    ) -> Result<ChangeProposal, AppError> {
        self.ensure_can_review(reviewer).await?;
        let handle = self.proposals.handle(proposal_id).await?;
        let mut proposal = handle.lock().await;
        Self::ensure_reviewable(&proposal, reviewer)?;

        let outcome = {
            let staged: &ChangeProposal = &proposal;
            retry_on_conflict(self.config.apply_max_attempts, move |_| self.apply_once(staged))
                .await?
        };

        let now = Utc::now();
        proposal.resolve(ProposalStatus::Approved, reviewer, note, now)?;
        if let ApplyOutcome::Archived { archived_id, .. } = &outcome {
            proposal.target_policy = None;
            proposal.target_archived = Some(*archived_id);
        }
        proposal.outcome = Some(outcome.clone());

        self.audit
            .record(
                AuditEntry::new(AuditAction::ProposalApproved, "proposal", Some(proposal.id))
                    .by(reviewer),
            )
            .await;
        self.record_outcome(reviewer, &outcome).await;
        info!("Proposal {} approved by {}", proposal.id, reviewer);
        Ok(proposal.clone())
    }

    pub async fn reject(
        &self,
        reviewer: Uuid,
        proposal_id: Uuid,
        note: Option<String>,
    ) -> Result<ChangeProposal, AppError> {
        self.decline(reviewer, proposal_id, ProposalStatus::Rejected, note)
            .await
    }

    pub async fn request_revision(
        &self,
        reviewer: Uuid,
        proposal_id: Uuid,
        note: Option<String>,
    ) -> Result<ChangeProposal, AppError> {
        self.decline(reviewer, proposal_id, ProposalStatus::RevisionNeeded, note)
            .await
    }

    /// Append a note; only the submitter or a reviewer, only while pending
    pub async fn add_note(
        &self,
        author: Uuid,
        proposal_id: Uuid,
        body: String,
    ) -> Result<ChangeProposal, AppError> {
        let handle = self.proposals.handle(proposal_id).await?;
        let mut proposal = handle.lock().await;
        if proposal.submitter != author && !self.identity.can_review(author).await? {
            return Err(AppError::Forbidden(
                "Only the submitter or a reviewer may comment on a proposal".to_string(),
            ));
        }
        proposal.add_note(author, body, Utc::now())?;

        self.audit
            .record(AuditEntry::new(AuditAction::NoteAdded, "proposal", Some(proposal.id)).by(author))
            .await;
        Ok(proposal.clone())
    }

    /// Resubmit a proposal sent back for revision as a fresh pending proposal
    pub async fn resubmit(
        &self,
        submitter: Uuid,
        proposal_id: Uuid,
        draft: Option<PolicyDraft>,
    ) -> Result<ChangeProposal, AppError> {
        let previous = self.proposals.get(proposal_id).await?;
        if previous.submitter != submitter {
            return Err(AppError::Forbidden(
                "Only the original submitter may resubmit a proposal".to_string(),
            ));
        }
        if previous.status != ProposalStatus::RevisionNeeded {
            return Err(validation_error(format!(
                "Proposal {} is {}; only proposals needing revision can be resubmitted",
                previous.id, previous.status
            )));
        }
        let successors = self
            .proposals
            .list(&ProposalFilter::default())
            .await
            .into_iter()
            .filter(|p| p.supersedes == Some(previous.id))
            .count();
        if successors > 0 {
            return Err(validation_error(format!(
                "Proposal {} was already resubmitted",
                previous.id
            )));
        }

        let mut next = previous.resubmission(draft, Utc::now());
        let live = match next.target_policy {
            Some(target) => Some(self.documents.get_policy(target).await?),
            None => None,
        };
        if let Some(live) = &live {
            next.current_number = Some(live.number);
            next.current_version = Some(live.version);
            next.section_id = live.section_id;
        }
        self.ensure_can_submit(submitter, &next, live.as_ref()).await?;
        let next = self.proposals.create(next).await;

        self.audit
            .record(
                AuditEntry::new(AuditAction::ProposalResubmitted, "proposal", Some(next.id))
                    .by(submitter)
                    .with_details(json!({ "supersedes": previous.id })),
            )
            .await;
        info!("Proposal {} resubmitted as {}", previous.id, next.id);
        Ok(next)
    }

    /// Field-by-field view of what approving the proposal would change
    pub async fn diff(&self, proposal_id: Uuid) -> Result<Vec<FieldDiff>, AppError> {
        let proposal = self.proposals.get(proposal_id).await?;
        match proposal.request_kind {
            RequestKind::Archive => Ok(Vec::new()),
            RequestKind::New => Ok(diff(&proposal, None)),
            RequestKind::Edit => {
                let live = match proposal.target_policy {
                    Some(target) => self.documents.get_policy(target).await.ok(),
                    None => None,
                };
                Ok(diff(&proposal, live.as_ref()))
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn apply_once(&self, proposal: &ChangeProposal) -> Result<ApplyOutcome, AppError> {
        let expected = self.documents.read(|h| prepare(h, proposal)).await?;
        self.documents
            .transact(&expected, |h| apply(h, proposal, Utc::now()))
            .await
    }

    async fn decline(
        &self,
        reviewer: Uuid,
        proposal_id: Uuid,
        status: ProposalStatus,
        note: Option<String>,
    ) -> Result<ChangeProposal, AppError> {
        self.ensure_can_review(reviewer).await?;
        let handle = self.proposals.handle(proposal_id).await?;
        let mut proposal = handle.lock().await;
        Self::ensure_reviewable(&proposal, reviewer)?;

        proposal.resolve(status, reviewer, note.clone(), Utc::now())?;

        let (action, outcome) = match status {
            ProposalStatus::RevisionNeeded => (
                AuditAction::ProposalRevisionRequested,
                NotificationOutcome::RevisionNeeded,
            ),
            _ => (AuditAction::ProposalRejected, NotificationOutcome::Rejected),
        };
        self.audit
            .record(AuditEntry::new(action, "proposal", Some(proposal.id)).by(reviewer))
            .await;
        info!("Proposal {} marked {} by {}", proposal.id, status, reviewer);

        let notification = Notification {
            recipient: proposal.submitter,
            outcome,
            policy_identity: proposal.policy_identity(),
            notes: note.or_else(|| proposal.latest_note().map(str::to_string)),
        };
        notify::dispatch(&self.notifier, self.config.notifications_enabled, notification);
        Ok(proposal.clone())
    }

    async fn record_outcome(&self, actor: Uuid, outcome: &ApplyOutcome) {
        let entry = match outcome {
            ApplyOutcome::Created { policy_id, number } => {
                AuditEntry::new(AuditAction::PolicyCreated, "policy", Some(*policy_id))
                    .with_details(json!({ "number": number }))
            }
            ApplyOutcome::Updated { policy_id, version } => {
                AuditEntry::new(AuditAction::PolicyUpdated, "policy", Some(*policy_id))
                    .with_details(json!({ "version": version }))
            }
            ApplyOutcome::Archived {
                archived_id,
                number,
            } => AuditEntry::new(AuditAction::PolicyArchived, "archived_policy", Some(*archived_id))
                .with_details(json!({ "number": number })),
        };
        self.audit.record(entry.by(actor)).await;
    }

    /// The submitter must cover both the department owning the live target
    /// and the department the proposal would assign.
    async fn ensure_can_submit(
        &self,
        submitter: Uuid,
        proposal: &ChangeProposal,
        live: Option<&Policy>,
    ) -> Result<(), AppError> {
        let mut departments = vec![proposal.owning_department];
        if let Some(policy) = live {
            if policy.owning_department != proposal.owning_department {
                departments.push(policy.owning_department);
            }
        }
        for department in departments {
            if !self.identity.can_submit(submitter, department).await? {
                return Err(AppError::Forbidden(format!(
                    "Actor {} may not propose changes to {}",
                    submitter,
                    proposal.policy_identity()
                )));
            }
        }
        Ok(())
    }

    async fn ensure_can_review(&self, reviewer: Uuid) -> Result<(), AppError> {
        if !self.identity.can_review(reviewer).await? {
            return Err(AppError::Forbidden(format!(
                "Actor {} may not review proposals",
                reviewer
            )));
        }
        Ok(())
    }

    fn ensure_reviewable(proposal: &ChangeProposal, reviewer: Uuid) -> Result<(), AppError> {
        proposal.ensure_pending()?;
        if proposal.submitter == reviewer {
            return Err(AppError::SelfApproval(format!(
                "{} cannot review their own proposal {}",
                reviewer, proposal.id
            )));
        }
        Ok(())
    }
}

impl ApprovalWorkflow {
    pub async fn get(&self, proposal_id: Uuid) -> Result<ChangeProposal, AppError> {
        self.proposals.get(proposal_id).await
    }

    pub async fn list(&self, filter: &ProposalFilter) -> Vec<ChangeProposal> {
        self.proposals.list(filter).await
    }

    pub async fn pending_for(&self, policy_id: Uuid) -> Result<Vec<ChangeProposal>, AppError> {
        self.documents.get_policy(policy_id).await.map_err(|_| {
            not_found_error(format!("Policy {} not found", policy_id))
        })?;
        Ok(self
            .proposals
            .list(&ProposalFilter {
                status: Some(ProposalStatus::Pending),
                target_policy: Some(policy_id),
                ..Default::default()
            })
            .await)
    }
}
