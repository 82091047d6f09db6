//! Field update operations
//!
//! An approved edit is expressed as a list of typed updates, one per mutable
//! policy field. Each update is dispatched on its kind: plain values are
//! overwritten, references are re-pointed, and collections are replaced.

use crate::handbook::{Policy, ReviewPeriod};
use crate::proposal::ChangeProposal;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ScalarUpdate {
    Title(String),
    ReviewPeriod(Option<ReviewPeriod>),
    Purpose(String),
    Scope(String),
    Statements(String),
    Responsibilities(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ReferenceUpdate {
    OwningDepartment(Option<Uuid>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum CollectionUpdate {
    RelatedPolicies(BTreeSet<Uuid>),
    /// Step descriptions in final order
    ProcedureSteps(Vec<String>),
    Definitions(BTreeSet<Uuid>),
}

/// A single field change carried by an approved edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldUpdate {
    Scalar(ScalarUpdate),
    Reference(ReferenceUpdate),
    Collection(CollectionUpdate),
}

impl FieldUpdate {
    /// Name of the policy field this update writes
    pub fn field_name(&self) -> &'static str {
        match self {
            FieldUpdate::Scalar(s) => match s {
                ScalarUpdate::Title(_) => "title",
                ScalarUpdate::ReviewPeriod(_) => "review_period",
                ScalarUpdate::Purpose(_) => "purpose",
                ScalarUpdate::Scope(_) => "scope",
                ScalarUpdate::Statements(_) => "statements",
                ScalarUpdate::Responsibilities(_) => "responsibilities",
            },
            FieldUpdate::Reference(ReferenceUpdate::OwningDepartment(_)) => "owning_department",
            FieldUpdate::Collection(c) => match c {
                CollectionUpdate::RelatedPolicies(_) => "related_policies",
                CollectionUpdate::ProcedureSteps(_) => "procedure_steps",
                CollectionUpdate::Definitions(_) => "definitions",
            },
        }
    }

    /// Write this update onto the policy
    pub fn apply_to(&self, policy: &mut Policy) {
        match self {
            FieldUpdate::Scalar(update) => match update {
                ScalarUpdate::Title(v) => policy.title = v.clone(),
                ScalarUpdate::ReviewPeriod(v) => policy.review_period = *v,
                ScalarUpdate::Purpose(v) => policy.purpose = v.clone(),
                ScalarUpdate::Scope(v) => policy.scope = v.clone(),
                ScalarUpdate::Statements(v) => policy.statements = v.clone(),
                ScalarUpdate::Responsibilities(v) => policy.responsibilities = v.clone(),
            },
            FieldUpdate::Reference(ReferenceUpdate::OwningDepartment(v)) => {
                policy.owning_department = *v;
            }
            FieldUpdate::Collection(update) => match update {
                CollectionUpdate::RelatedPolicies(ids) => policy.related_policies = ids.clone(),
                CollectionUpdate::ProcedureSteps(steps) => policy.replace_steps(steps.iter().cloned()),
                CollectionUpdate::Definitions(ids) => {
                    policy.sync_definitions(ids);
                }
            },
        }
    }

    /// Value the update would write, in the same shape as `current_value`
    pub fn proposed_value(&self) -> Value {
        match self {
            FieldUpdate::Scalar(update) => match update {
                ScalarUpdate::Title(v)
                | ScalarUpdate::Purpose(v)
                | ScalarUpdate::Scope(v)
                | ScalarUpdate::Statements(v)
                | ScalarUpdate::Responsibilities(v) => json!(v),
                ScalarUpdate::ReviewPeriod(v) => json!(v),
            },
            FieldUpdate::Reference(ReferenceUpdate::OwningDepartment(v)) => json!(v),
            FieldUpdate::Collection(update) => match update {
                CollectionUpdate::RelatedPolicies(ids) | CollectionUpdate::Definitions(ids) => {
                    json!(ids)
                }
                CollectionUpdate::ProcedureSteps(steps) => json!(steps),
            },
        }
    }

    /// Value the policy currently holds for this update's field
    pub fn current_value(&self, policy: &Policy) -> Value {
        match self {
            FieldUpdate::Scalar(update) => match update {
                ScalarUpdate::Title(_) => json!(policy.title),
                ScalarUpdate::ReviewPeriod(_) => json!(policy.review_period),
                ScalarUpdate::Purpose(_) => json!(policy.purpose),
                ScalarUpdate::Scope(_) => json!(policy.scope),
                ScalarUpdate::Statements(_) => json!(policy.statements),
                ScalarUpdate::Responsibilities(_) => json!(policy.responsibilities),
            },
            FieldUpdate::Reference(ReferenceUpdate::OwningDepartment(_)) => {
                json!(policy.owning_department)
            }
            FieldUpdate::Collection(update) => match update {
                CollectionUpdate::RelatedPolicies(_) => json!(policy.related_policies),
                CollectionUpdate::ProcedureSteps(_) => json!(policy
                    .procedure_steps
                    .iter()
                    .map(|s| s.description.as_str())
                    .collect::<Vec<_>>()),
                CollectionUpdate::Definitions(_) => json!(policy.definitions),
            },
        }
    }
}

impl ChangeProposal {
    /// Every update an approved edit writes, in a fixed field order
    pub fn field_updates(&self) -> Vec<FieldUpdate> {
        vec![
            FieldUpdate::Scalar(ScalarUpdate::Title(self.proposed_title.clone())),
            FieldUpdate::Scalar(ScalarUpdate::ReviewPeriod(self.proposed_review_period)),
            FieldUpdate::Scalar(ScalarUpdate::Purpose(self.proposed_purpose.clone())),
            FieldUpdate::Scalar(ScalarUpdate::Scope(self.proposed_scope.clone())),
            FieldUpdate::Scalar(ScalarUpdate::Statements(self.proposed_statements.clone())),
            FieldUpdate::Scalar(ScalarUpdate::Responsibilities(
                self.proposed_responsibilities.clone(),
            )),
            FieldUpdate::Reference(ReferenceUpdate::OwningDepartment(self.owning_department)),
            FieldUpdate::Collection(CollectionUpdate::RelatedPolicies(self.related_policy_set())),
            FieldUpdate::Collection(CollectionUpdate::ProcedureSteps(self.active_steps())),
            FieldUpdate::Collection(CollectionUpdate::Definitions(self.active_definition_ids())),
        ]
    }
}

/// Current-vs-proposed view of one field
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub field: &'static str,
    pub current: Value,
    pub proposed: Value,
    pub changed: bool,
}

/// Compare a proposal against the live policy it targets.
/// Without a live target (new proposals) every field shows as added.
pub fn diff(proposal: &ChangeProposal, live: Option<&Policy>) -> Vec<FieldDiff> {
    proposal
        .field_updates()
        .into_iter()
        .map(|update| {
            let proposed = update.proposed_value();
            let current = live.map_or(Value::Null, |p| update.current_value(p));
            FieldDiff {
                field: update.field_name(),
                changed: current != proposed,
                current,
                proposed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::{PolicyNumber, SectionNumber, Version};
    use crate::proposal::{PolicyDraft, ProposedStep};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn policy() -> Policy {
        let now = Utc::now();
        let mut policy = Policy {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            title: "Expenses".to_string(),
            number: PolicyNumber::new(SectionNumber::new(5), 2),
            version: Version::INITIAL,
            review_period: Some(ReviewPeriod::Quarterly),
            purpose: "Reimburse".to_string(),
            scope: "Staff".to_string(),
            statements: "Keep receipts".to_string(),
            responsibilities: "Finance".to_string(),
            owning_department: None,
            related_policies: BTreeSet::new(),
            definitions: [Uuid::new_v4(), Uuid::new_v4()].into_iter().collect(),
            procedure_steps: Vec::new(),
            seq: 1,
            published_at: now,
            updated_at: now,
        };
        policy.replace_steps(["Submit", "Approve"]);
        policy
    }

    #[test]
    fn test_collection_updates_replace_steps_and_sync_definitions() {
        let mut live = policy();
        let kept = *live.definitions.iter().next().unwrap();
        let added = Uuid::new_v4();

        FieldUpdate::Collection(CollectionUpdate::ProcedureSteps(vec![
            "Pay".to_string(),
        ]))
        .apply_to(&mut live);
        FieldUpdate::Collection(CollectionUpdate::Definitions(
            [kept, added].into_iter().collect(),
        ))
        .apply_to(&mut live);

        assert_eq!(live.procedure_steps.len(), 1);
        assert_eq!(live.procedure_steps[0].step_number, 1);
        assert_eq!(live.definitions, [kept, added].into_iter().collect());
    }

    #[test]
    fn test_diff_flags_only_changed_fields() {
        let live = policy();
        let mut steps: Vec<ProposedStep> = live
            .procedure_steps
            .iter()
            .map(|s| ProposedStep {
                id: Some(s.id),
                step_number: s.step_number,
                description: s.description.clone(),
                deleted: false,
            })
            .collect();
        steps[1].deleted = true;

        let proposal = ChangeProposal::for_edit(
            Uuid::new_v4(),
            &live,
            PolicyDraft {
                scope: Some("Contractors".into()),
                procedure_steps: Some(steps),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        let changed: Vec<&str> = diff(&proposal, Some(&live))
            .into_iter()
            .filter(|d| d.changed)
            .map(|d| d.field)
            .collect();
        assert_eq!(changed, vec!["scope", "procedure_steps"]);
    }

    #[test]
    fn test_untouched_edit_reads_back_every_field() {
        let live = policy();
        let proposal =
            ChangeProposal::for_edit(Uuid::new_v4(), &live, PolicyDraft::default(), Utc::now())
                .unwrap();

        for update in proposal.field_updates() {
            assert_eq!(
                update.current_value(&live),
                update.proposed_value(),
                "{}",
                update.field_name()
            );
        }
    }

    #[test]
    fn test_diff_without_live_target_marks_everything_new() {
        let live = policy();
        let proposal =
            ChangeProposal::for_edit(Uuid::new_v4(), &live, PolicyDraft::default(), Utc::now())
                .unwrap();

        let rows = diff(&proposal, None);
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|d| d.current == Value::Null));
    }
}
