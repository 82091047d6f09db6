//! Archival Engine
//!
//! Moves a live policy into the immutable archive and closes the numbering
//! gap it leaves behind. Runs against a transaction's working copy, so a
//! failure at any step discards the whole move.

use crate::error::AppError;
use crate::handbook::models::{ArchivedPolicy, ArchivedStep};
use crate::handbook::numbering::NumberingAllocator;
use crate::handbook::store::Handbook;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

pub struct ArchivalEngine;

impl ArchivalEngine {
    pub fn archive(
        handbook: &mut Handbook,
        policy_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ArchivedPolicy, AppError> {
        let policy = handbook.policy(policy_id)?.clone();

        let procedure_steps = policy
            .procedure_steps
            .iter()
            .map(|s| ArchivedStep {
                step_number: s.step_number,
                description: s.description.clone(),
            })
            .collect();

        // Only links to policies that stay live survive
        let related_policies = policy
            .related_policies
            .iter()
            .copied()
            .filter(|id| *id != policy_id && handbook.policy(*id).is_ok())
            .collect();

        let archived = ArchivedPolicy {
            id: Uuid::new_v4(),
            source_policy_id: policy.id,
            section_id: policy.section_id,
            number: policy.number,
            title: policy.title.clone(),
            version: policy.version,
            review_period: policy.review_period,
            purpose: policy.purpose.clone(),
            scope: policy.scope.clone(),
            statements: policy.statements.clone(),
            responsibilities: policy.responsibilities.clone(),
            owning_department: policy.owning_department,
            procedure_steps,
            definitions: policy.definitions.clone(),
            related_policies,
            published_at: policy.published_at,
            archived_at: now,
        };

        handbook.remove_policy(policy_id)?;
        let renumbered = NumberingAllocator::renumber_section(handbook, policy.section_id)?;
        handbook.insert_archived(archived.clone());

        info!(
            "Archived policy {} {} ({} sibling(s) renumbered)",
            archived.number,
            archived.title,
            renumbered.len()
        );
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::models::{NewPolicy, SectionNumber};
    use crate::handbook::store::DocumentStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: DocumentStore,
        section_id: Uuid,
        policies: Vec<Uuid>,
        definition_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = DocumentStore::new();
        let section = store
            .create_section("Operations".into(), SectionNumber::new(3))
            .await
            .unwrap();
        let definition = store
            .create_definition("PTO".into(), "Paid time off".into(), None)
            .await
            .unwrap();

        let mut policies = Vec::new();
        for title in ["First", "Second", "Third"] {
            let policy = store
                .publish_policy(NewPolicy {
                    section_id: section.id,
                    title: title.into(),
                    steps: vec![format!("{} step one", title), format!("{} step two", title)],
                    definitions: [definition.id].into_iter().collect(),
                    ..Default::default()
                })
                .await
                .unwrap();
            policies.push(policy.id);
        }

        Fixture {
            store,
            section_id: section.id,
            policies,
            definition_id: definition.id,
        }
    }

    #[tokio::test]
    async fn test_archive_middle_policy_renumbers_siblings() {
        let f = fixture().await;

        let archived = f.store.archive_policy(f.policies[1]).await.unwrap();

        assert_eq!(archived.number.to_string(), "3.2");
        assert_eq!(
            archived.procedure_steps,
            vec![
                ArchivedStep {
                    step_number: 1,
                    description: "Second step one".into()
                },
                ArchivedStep {
                    step_number: 2,
                    description: "Second step two".into()
                },
            ]
        );
        assert_eq!(archived.definitions, [f.definition_id].into_iter().collect());

        let live = f.store.list_policies(f.section_id).await.unwrap();
        let numbers: Vec<(String, String)> = live
            .iter()
            .map(|p| (p.number.to_string(), p.title.clone()))
            .collect();
        assert_eq!(
            numbers,
            vec![
                ("3.1".to_string(), "First".to_string()),
                ("3.2".to_string(), "Third".to_string())
            ]
        );
        assert!(f.store.get_policy(f.policies[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_archive_keeps_definitions_alive() {
        let f = fixture().await;

        f.store.archive_policy(f.policies[0]).await.unwrap();

        assert_eq!(f.store.list_definitions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_detaches_inbound_links_and_keeps_live_outbound() {
        let f = fixture().await;
        let referrer = f
            .store
            .publish_policy(NewPolicy {
                section_id: f.section_id,
                title: "Referrer".into(),
                related_policies: [f.policies[0], f.policies[2]].into_iter().collect(),
                ..Default::default()
            })
            .await
            .unwrap();

        let archived = f.store.archive_policy(referrer.id).await.unwrap();
        assert_eq!(
            archived.related_policies,
            [f.policies[0], f.policies[2]].into_iter().collect()
        );

        let f2 = fixture().await;
        let pointing = f2
            .store
            .publish_policy(NewPolicy {
                section_id: f2.section_id,
                title: "Pointing".into(),
                related_policies: [f2.policies[0]].into_iter().collect(),
                ..Default::default()
            })
            .await
            .unwrap();
        f2.store.archive_policy(f2.policies[0]).await.unwrap();
        let pointing = f2.store.get_policy(pointing.id).await.unwrap();
        assert!(pointing.related_policies.is_empty());
    }

    #[tokio::test]
    async fn test_failed_archive_rolls_back_everything() {
        let f = fixture().await;

        let result: Result<(), AppError> = f
            .store
            .transact(&[], |h| {
                ArchivalEngine::archive(h, f.policies[0], Utc::now())?;
                Err(AppError::Internal("storage failure".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(f.store.get_policy(f.policies[0]).await.is_ok());
        assert!(f.store.list_archived().await.is_empty());
        assert_eq!(f.store.list_policies(f.section_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_archived_copy_resolves_by_source_id() {
        let f = fixture().await;
        let archived = f.store.archive_policy(f.policies[2]).await.unwrap();

        match f.store.resolve_related(f.policies[2]).await.unwrap() {
            crate::handbook::store::RelatedDocument::Archived(found) => {
                assert_eq!(found.id, archived.id)
            }
            other => panic!("expected archived document, got {:?}", other),
        }
    }
}
