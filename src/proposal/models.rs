//! Change proposal data models
//!
//! A ChangeProposal stages a new/edit/archive request against the handbook.
//! Every proposed collection is copied by value when the proposal is built,
//! so later live edits never leak into a staged change.

use crate::error::{validation_error, AppError};
use crate::handbook::{Policy, PolicyNumber, ReviewPeriod, Section, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The three supported request kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    New,
    Edit,
    Archive,
}

/// Proposal status in the approval workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    RevisionNeeded,
}

impl ProposalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ProposalStatus::Pending)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "pending"),
            ProposalStatus::Approved => write!(f, "approved"),
            ProposalStatus::Rejected => write!(f, "rejected"),
            ProposalStatus::RevisionNeeded => write!(f, "revision_needed"),
        }
    }
}

/// A staged procedure step; submitted numbers are informational only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedStep {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub step_number: u32,
    pub description: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedDefinition {
    pub id: Uuid,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalNote {
    pub author: Uuid,
    pub body: String,
    pub added_at: DateTime<Utc>,
}

/// What an approved proposal did to the handbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Created { policy_id: Uuid, number: PolicyNumber },
    Updated { policy_id: Uuid, version: Version },
    Archived { archived_id: Uuid, number: PolicyNumber },
}

/// Submitter input; any field left out defaults to the live value on edits.
///
/// Nullable fields take two levels: absent keeps the live value, an explicit
/// `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub review_period: Option<Option<ReviewPeriod>>,
    pub purpose: Option<String>,
    pub scope: Option<String>,
    pub statements: Option<String>,
    pub responsibilities: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub owning_department: Option<Option<Uuid>>,
    pub related_policy_ids: Option<Vec<Uuid>>,
    pub procedure_steps: Option<Vec<ProposedStep>>,
    pub definitions: Option<Vec<ProposedDefinition>>,
}

/// A key that is present, even as `null`, deserializes to `Some`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A staged change to the handbook (the "approval request")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeProposal {
    pub id: Uuid,
    pub request_kind: RequestKind,
    pub status: ProposalStatus,
    pub submitter: Uuid,
    pub approver: Option<Uuid>,
    /// Absent for `new`; cleared once an archive is applied
    pub target_policy: Option<Uuid>,
    pub target_archived: Option<Uuid>,
    pub section_id: Uuid,
    pub current_number: Option<PolicyNumber>,
    pub current_version: Option<Version>,
    pub owning_department: Option<Uuid>,

    pub proposed_title: String,
    pub proposed_review_period: Option<ReviewPeriod>,
    pub proposed_purpose: String,
    pub proposed_scope: String,
    pub proposed_statements: String,
    pub proposed_responsibilities: String,
    pub proposed_related_policy_ids: Vec<Uuid>,
    pub proposed_procedure_steps: Vec<ProposedStep>,
    pub proposed_definitions: Vec<ProposedDefinition>,

    pub notes: Vec<ProposalNote>,
    /// Earlier proposal this one resubmits
    pub supersedes: Option<Uuid>,
    pub outcome: Option<ApplyOutcome>,

    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ChangeProposal {
    fn blank(kind: RequestKind, submitter: Uuid, section_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_kind: kind,
            status: ProposalStatus::Pending,
            submitter,
            approver: None,
            target_policy: None,
            target_archived: None,
            section_id,
            current_number: None,
            current_version: None,
            owning_department: None,
            proposed_title: String::new(),
            proposed_review_period: None,
            proposed_purpose: String::new(),
            proposed_scope: String::new(),
            proposed_statements: String::new(),
            proposed_responsibilities: String::new(),
            proposed_related_policy_ids: Vec::new(),
            proposed_procedure_steps: Vec::new(),
            proposed_definitions: Vec::new(),
            notes: Vec::new(),
            supersedes: None,
            outcome: None,
            submitted_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// Stage a brand-new policy; no number exists until it is applied
    pub fn for_new(
        submitter: Uuid,
        section: &Section,
        draft: PolicyDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let title = draft
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| validation_error("A new policy needs a title"))?;

        let mut proposal = Self::blank(RequestKind::New, submitter, section.id, now);
        proposal.owning_department = draft.owning_department.flatten();
        proposal.proposed_title = title;
        proposal.proposed_review_period = draft.review_period.flatten();
        proposal.proposed_purpose = draft.purpose.unwrap_or_default();
        proposal.proposed_scope = draft.scope.unwrap_or_default();
        proposal.proposed_statements = draft.statements.unwrap_or_default();
        proposal.proposed_responsibilities = draft.responsibilities.unwrap_or_default();
        proposal.proposed_related_policy_ids = draft.related_policy_ids.unwrap_or_default();
        proposal.proposed_procedure_steps = draft.procedure_steps.unwrap_or_default();
        proposal.proposed_definitions = draft.definitions.unwrap_or_default();
        Ok(proposal)
    }

    /// Stage an edit; each omitted field independently takes the live value
    pub fn for_edit(
        submitter: Uuid,
        policy: &Policy,
        draft: PolicyDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if matches!(draft.title.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(validation_error("Policy title cannot be blank"));
        }

        let mut proposal = Self::blank(RequestKind::Edit, submitter, policy.section_id, now);
        proposal.target_policy = Some(policy.id);
        proposal.current_number = Some(policy.number);
        proposal.current_version = Some(policy.version);
        proposal.owning_department = draft.owning_department.unwrap_or(policy.owning_department);

        proposal.proposed_title = draft
            .title
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| policy.title.clone());
        proposal.proposed_review_period = draft.review_period.unwrap_or(policy.review_period);
        proposal.proposed_purpose = draft.purpose.unwrap_or_else(|| policy.purpose.clone());
        proposal.proposed_scope = draft.scope.unwrap_or_else(|| policy.scope.clone());
        proposal.proposed_statements = draft
            .statements
            .unwrap_or_else(|| policy.statements.clone());
        proposal.proposed_responsibilities = draft
            .responsibilities
            .unwrap_or_else(|| policy.responsibilities.clone());
        proposal.proposed_related_policy_ids = draft
            .related_policy_ids
            .unwrap_or_else(|| policy.related_policies.iter().copied().collect());
        proposal.proposed_procedure_steps = draft.procedure_steps.unwrap_or_else(|| {
            policy
                .procedure_steps
                .iter()
                .map(|s| ProposedStep {
                    id: Some(s.id),
                    step_number: s.step_number,
                    description: s.description.clone(),
                    deleted: false,
                })
                .collect()
        });
        proposal.proposed_definitions = draft.definitions.unwrap_or_else(|| {
            policy
                .definitions
                .iter()
                .map(|id| ProposedDefinition {
                    id: *id,
                    deleted: false,
                })
                .collect()
        });
        Ok(proposal)
    }

    /// Stage an archival; only identity and bookkeeping are captured
    pub fn for_archive(submitter: Uuid, policy: &Policy, now: DateTime<Utc>) -> Self {
        let mut proposal = Self::blank(RequestKind::Archive, submitter, policy.section_id, now);
        proposal.target_policy = Some(policy.id);
        proposal.current_number = Some(policy.number);
        proposal.current_version = Some(policy.version);
        proposal.owning_department = policy.owning_department;
        proposal.proposed_title = policy.title.clone();
        proposal
    }

    /// Fresh pending copy of a proposal sent back for revision
    pub fn resubmission(&self, draft: Option<PolicyDraft>, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.id = Uuid::new_v4();
        next.status = ProposalStatus::Pending;
        next.approver = None;
        next.notes = Vec::new();
        next.outcome = None;
        next.supersedes = Some(self.id);
        next.submitted_at = now;
        next.updated_at = now;
        next.resolved_at = None;

        if let Some(draft) = draft {
            if let Some(title) = draft.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
                next.proposed_title = title;
            }
            if let Some(v) = draft.review_period {
                next.proposed_review_period = v;
            }
            if let Some(v) = draft.purpose {
                next.proposed_purpose = v;
            }
            if let Some(v) = draft.scope {
                next.proposed_scope = v;
            }
            if let Some(v) = draft.statements {
                next.proposed_statements = v;
            }
            if let Some(v) = draft.responsibilities {
                next.proposed_responsibilities = v;
            }
            if let Some(v) = draft.owning_department {
                next.owning_department = v;
            }
            if let Some(v) = draft.related_policy_ids {
                next.proposed_related_policy_ids = v;
            }
            if let Some(v) = draft.procedure_steps {
                next.proposed_procedure_steps = v;
            }
            if let Some(v) = draft.definitions {
                next.proposed_definitions = v;
            }
        }
        next
    }

    /// Apply and every other transition require a pending proposal
    pub fn ensure_pending(&self) -> Result<(), AppError> {
        if !self.status.is_pending() {
            return Err(AppError::AlreadyResolved(format!(
                "{} (status: {})",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Notes may only be added while the proposal is still pending
    pub fn add_note(&mut self, author: Uuid, body: String, now: DateTime<Utc>) -> Result<(), AppError> {
        self.ensure_pending()?;
        if body.trim().is_empty() {
            return Err(validation_error("Note cannot be empty"));
        }
        self.notes.push(ProposalNote {
            author,
            body,
            added_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Record the reviewer's decision, leaving `pending` for good
    pub(crate) fn resolve(
        &mut self,
        status: ProposalStatus,
        reviewer: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.ensure_pending()?;
        if let Some(body) = note.filter(|n| !n.trim().is_empty()) {
            self.notes.push(ProposalNote {
                author: reviewer,
                body,
                added_at: now,
            });
        }
        self.status = status;
        self.approver = Some(reviewer);
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Descriptions of the steps that survive, in submitted order
    pub fn active_steps(&self) -> Vec<String> {
        self.proposed_procedure_steps
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.description.clone())
            .collect()
    }

    pub fn active_definition_ids(&self) -> BTreeSet<Uuid> {
        self.proposed_definitions
            .iter()
            .filter(|d| !d.deleted)
            .map(|d| d.id)
            .collect()
    }

    pub fn related_policy_set(&self) -> BTreeSet<Uuid> {
        self.proposed_related_policy_ids.iter().copied().collect()
    }

    /// Human-readable identity used in notifications and logs
    pub fn policy_identity(&self) -> String {
        match self.current_number {
            Some(number) => format!("{} {}", number, self.proposed_title),
            None => format!("(new) {}", self.proposed_title),
        }
    }

    /// Latest note, used as the message attached to decisions
    pub fn latest_note(&self) -> Option<&str> {
        self.notes.last().map(|n| n.body.as_str())
    }
}
