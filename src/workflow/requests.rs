//! Policy questions
//!
//! Any reader may ask a question about a published policy. Admins and the
//! head of the department that owns the policy see it, answer it with notes
//! and mark it resolved. The asker always sees their own questions.

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::config::WorkflowConfig;
use crate::error::{validation_error, AppError};
use crate::handbook::{DocumentStore, NewPolicyRequest, PolicyNumber, PolicyRequest};
use crate::workflow::identity::IdentityProvider;
use crate::workflow::notify::{self, Notification, NotificationOutcome, Notifier};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Filter for listing questions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    pub resolved: Option<bool>,
    pub policy_id: Option<Uuid>,
}

impl RequestFilter {
    fn matches(&self, request: &PolicyRequest) -> bool {
        self.resolved.map_or(true, |r| request.resolved == r)
            && self.policy_id.map_or(true, |id| request.policy_id == id)
    }
}

pub struct RequestDesk {
    documents: Arc<DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<AuditLog>,
    config: WorkflowConfig,
}

impl RequestDesk {
    pub fn new(
        documents: Arc<DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<AuditLog>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            documents,
            identity,
            notifier,
            audit,
            config,
        }
    }

    /// File a question against a live policy and send the asker a receipt
    pub async fn file(
        &self,
        requester: Uuid,
        number: PolicyNumber,
        question: String,
    ) -> Result<PolicyRequest, AppError> {
        let actor = self.identity.actor(requester).await?;
        let policy = self.documents.find_policy_by_number(number).await?;
        let request = self
            .documents
            .file_request(NewPolicyRequest {
                policy_id: policy.id,
                requester: actor.id,
                requester_name: actor.name,
                requester_email: actor.email,
                question,
            })
            .await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::RequestFiled, "policy_request", Some(request.id))
                    .by(requester)
                    .with_details(json!({ "policy": policy.number })),
            )
            .await;
        info!(
            "Question {} filed against {} {}",
            request.id, policy.number, policy.title
        );

        let receipt = Notification {
            recipient: requester,
            outcome: NotificationOutcome::RequestReceived,
            policy_identity: format!("{} {}", policy.number, policy.title),
            notes: Some(request.question.clone()),
        };
        notify::dispatch(&self.notifier, self.config.notifications_enabled, receipt);
        Ok(request)
    }

    pub async fn get(&self, viewer: Uuid, id: Uuid) -> Result<PolicyRequest, AppError> {
        let (request, owner) = self.documents.request_with_owner(id).await?;
        if request.requester != viewer && !self.identity.can_answer(viewer, owner).await? {
            return Err(AppError::Forbidden(format!(
                "Actor {} may not view question {}",
                viewer, id
            )));
        }
        Ok(request)
    }

    /// Questions the viewer asked or may answer, newest first
    pub async fn list(
        &self,
        viewer: Uuid,
        filter: &RequestFilter,
    ) -> Result<Vec<PolicyRequest>, AppError> {
        let mut answerable: HashMap<Option<Uuid>, bool> = HashMap::new();
        let mut visible = Vec::new();
        for (request, owner) in self.documents.requests_with_owners().await {
            if !filter.matches(&request) {
                continue;
            }
            let allowed = if request.requester == viewer {
                true
            } else if let Some(allowed) = answerable.get(&owner) {
                *allowed
            } else {
                let allowed = self.identity.can_answer(viewer, owner).await?;
                answerable.insert(owner, allowed);
                allowed
            };
            if allowed {
                visible.push(request);
            }
        }
        Ok(visible)
    }

    /// Mark a batch resolved. Every question must be within the resolver's
    /// departments, otherwise none of them change.
    pub async fn resolve(
        &self,
        resolver: Uuid,
        ids: &[Uuid],
        notes: Option<String>,
    ) -> Result<Vec<PolicyRequest>, AppError> {
        if ids.is_empty() {
            return Err(validation_error("Select at least one question to resolve"));
        }
        for id in ids {
            let (_, owner) = self.documents.request_with_owner(*id).await?;
            if !self.identity.can_answer(resolver, owner).await? {
                return Err(AppError::Forbidden(format!(
                    "Actor {} may not resolve question {}",
                    resolver, id
                )));
            }
        }

        let resolved = self.documents.resolve_requests(ids, resolver, notes).await?;
        for request in &resolved {
            self.audit
                .record(
                    AuditEntry::new(
                        AuditAction::RequestResolved,
                        "policy_request",
                        Some(request.id),
                    )
                    .by(resolver),
                )
                .await;
        }
        info!("{} question(s) marked resolved by {}", resolved.len(), resolver);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::{NewPolicy, Policy, SectionNumber};
    use crate::workflow::identity::{Actor, InMemoryDirectory, Role};
    use crate::workflow::notify::testing::RecordingNotifier;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Desk {
        desk: RequestDesk,
        documents: Arc<DocumentStore>,
        admin: Uuid,
        head: Uuid,
        other_head: Uuid,
        employee: Uuid,
        owned: Policy,
        foreign: Policy,
        notifications: UnboundedReceiver<Notification>,
    }

    fn person(role: Role, department: Option<Uuid>) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            name: format!("{}", role),
            email: Some(format!("{}@example.org", role)),
            role,
            department,
        }
    }

    async fn desk() -> Desk {
        let (hr, finance) = (Uuid::new_v4(), Uuid::new_v4());
        let admin = person(Role::Admin, None);
        let head = person(Role::DepartmentHead, Some(hr));
        let other_head = person(Role::DepartmentHead, Some(finance));
        let employee = person(Role::Employee, None);
        let directory = InMemoryDirectory::with_actors(vec![
            admin.clone(),
            head.clone(),
            other_head.clone(),
            employee.clone(),
        ])
        .unwrap();

        let documents = Arc::new(DocumentStore::new());
        let section = documents
            .create_section("People".into(), SectionNumber::new(2))
            .await
            .unwrap();
        let owned = documents
            .publish_policy(NewPolicy {
                section_id: section.id,
                title: "Leave".into(),
                owning_department: Some(hr),
                ..Default::default()
            })
            .await
            .unwrap();
        let foreign = documents
            .publish_policy(NewPolicy {
                section_id: section.id,
                title: "Expenses".into(),
                owning_department: Some(finance),
                ..Default::default()
            })
            .await
            .unwrap();

        let (notifier, notifications) = RecordingNotifier::new();
        let desk = RequestDesk::new(
            Arc::clone(&documents),
            Arc::new(directory),
            Arc::new(notifier),
            Arc::new(AuditLog::new()),
            WorkflowConfig::default(),
        );

        Desk {
            desk,
            documents,
            admin: admin.id,
            head: head.id,
            other_head: other_head.id,
            employee: employee.id,
            owned,
            foreign,
            notifications,
        }
    }

    #[tokio::test]
    async fn test_filing_sends_receipt() {
        let mut d = desk().await;
        let request = d
            .desk
            .file(d.employee, d.owned.number, "Is leave carried over?".into())
            .await
            .unwrap();

        assert_eq!(request.policy_id, d.owned.id);
        assert_eq!(request.requester_email.as_deref(), Some("employee@example.org"));
        assert!(!request.resolved);

        let receipt = d.notifications.recv().await.unwrap();
        assert_eq!(
            receipt,
            Notification {
                recipient: d.employee,
                outcome: NotificationOutcome::RequestReceived,
                policy_identity: "2.1 Leave".into(),
                notes: Some("Is leave carried over?".into()),
            }
        );

        let unknown = d
            .desk
            .file(d.employee, "9.9".parse().unwrap(), "Where is this?".into())
            .await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));
        let blank = d.desk.file(d.employee, d.owned.number, " ".into()).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_visibility_follows_department() {
        let d = desk().await;
        let leave = d
            .desk
            .file(d.employee, d.owned.number, "Leave question".into())
            .await
            .unwrap();
        let expenses = d
            .desk
            .file(d.employee, d.foreign.number, "Expenses question".into())
            .await
            .unwrap();

        let ids = |requests: Vec<PolicyRequest>| -> Vec<Uuid> {
            let mut ids: Vec<Uuid> = requests.into_iter().map(|r| r.id).collect();
            ids.sort();
            ids
        };
        let mut both = vec![leave.id, expenses.id];
        both.sort();

        let filter = RequestFilter::default();
        assert_eq!(ids(d.desk.list(d.head, &filter).await.unwrap()), vec![leave.id]);
        assert_eq!(ids(d.desk.list(d.admin, &filter).await.unwrap()), both);
        assert_eq!(ids(d.desk.list(d.employee, &filter).await.unwrap()), both);

        assert!(matches!(
            d.desk.get(d.head, expenses.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(d.desk.get(d.other_head, expenses.id).await.unwrap().id, expenses.id);
    }

    #[tokio::test]
    async fn test_resolution_is_scoped_and_all_or_nothing() {
        let d = desk().await;
        let leave = d
            .desk
            .file(d.employee, d.owned.number, "Leave question".into())
            .await
            .unwrap();
        let expenses = d
            .desk
            .file(d.employee, d.foreign.number, "Expenses question".into())
            .await
            .unwrap();

        let mixed = d
            .desk
            .resolve(d.head, &[leave.id, expenses.id], Some("Answered".into()))
            .await;
        assert!(matches!(mixed, Err(AppError::Forbidden(_))));
        assert!(matches!(
            d.desk.resolve(d.employee, &[leave.id], None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(d
            .documents
            .requests_with_owners()
            .await
            .iter()
            .all(|(r, _)| !r.resolved));

        let resolved = d
            .desk
            .resolve(d.head, &[leave.id], Some("Up to five days".into()))
            .await
            .unwrap();
        assert_eq!(resolved[0].resolved_by, Some(d.head));
        assert_eq!(resolved[0].admin_notes.as_deref(), Some("Up to five days"));

        let open = d
            .desk
            .list(
                d.admin,
                &RequestFilter {
                    resolved: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, expenses.id);

        assert!(matches!(
            d.desk.resolve(d.admin, &[], None).await,
            Err(AppError::Validation(_))
        ));
    }
}
