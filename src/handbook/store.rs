//! Document Store
//!
//! Owns the canonical published records and their relationships.
//! All mutations go through [`DocumentStore::transact`], which works on a
//! private copy of the handbook and only swaps it in once the mutation and
//! the numbering invariants both hold.

use crate::error::{conflict_error, not_found_error, validation_error, AppError};
use crate::handbook::archival::ArchivalEngine;
use crate::handbook::models::*;
use crate::handbook::numbering::{NumberingAllocator, Renumbered};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A related-policy id resolved against both partitions
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "document", rename_all = "snake_case")]
pub enum RelatedDocument {
    Live(Policy),
    Archived(ArchivedPolicy),
}

// =============================================================================
// HANDBOOK TABLES
// =============================================================================

/// The full set of published records
#[derive(Debug, Clone, Default)]
pub struct Handbook {
    sections: HashMap<Uuid, Section>,
    policies: HashMap<Uuid, Policy>,
    definitions: HashMap<Uuid, Definition>,
    archived: HashMap<Uuid, ArchivedPolicy>,
    requests: HashMap<Uuid, PolicyRequest>,
    /// Section id -> numbering revision
    revisions: HashMap<Uuid, u64>,
    next_seq: u64,
}

impl Handbook {
    // =========================================================================
    // LOOKUPS
    // =========================================================================

    pub fn section(&self, id: Uuid) -> Result<&Section, AppError> {
        self.sections
            .get(&id)
            .ok_or_else(|| not_found_error(format!("Section {} not found", id)))
    }

    pub(crate) fn section_mut(&mut self, id: Uuid) -> Result<&mut Section, AppError> {
        self.sections
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("Section {} not found", id)))
    }

    pub fn sections(&self) -> Vec<&Section> {
        let mut sections: Vec<&Section> = self.sections.values().collect();
        sections.sort_by_key(|s| s.number);
        sections
    }

    pub fn policy(&self, id: Uuid) -> Result<&Policy, AppError> {
        self.policies
            .get(&id)
            .ok_or_else(|| not_found_error(format!("Policy {} not found", id)))
    }

    pub(crate) fn policy_mut(&mut self, id: Uuid) -> Result<&mut Policy, AppError> {
        self.policies
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("Policy {} not found", id)))
    }

    pub fn policy_by_number(&self, number: PolicyNumber) -> Option<&Policy> {
        self.policies.values().find(|p| p.number == number)
    }

    /// Policies of a section in insertion order
    pub fn policies_in_section(&self, section_id: Uuid) -> Vec<&Policy> {
        let mut policies: Vec<&Policy> = self
            .policies
            .values()
            .filter(|p| p.section_id == section_id)
            .collect();
        policies.sort_by_key(|p| p.seq);
        policies
    }

    pub fn definition(&self, id: Uuid) -> Result<&Definition, AppError> {
        self.definitions
            .get(&id)
            .ok_or_else(|| not_found_error(format!("Definition {} not found", id)))
    }

    pub fn definitions(&self) -> Vec<&Definition> {
        let mut definitions: Vec<&Definition> = self.definitions.values().collect();
        definitions.sort_by(|a, b| a.term.cmp(&b.term));
        definitions
    }

    pub fn archived(&self, id: Uuid) -> Result<&ArchivedPolicy, AppError> {
        self.archived
            .get(&id)
            .ok_or_else(|| not_found_error(format!("Archived policy {} not found", id)))
    }

    pub fn archived_policies(&self) -> Vec<&ArchivedPolicy> {
        let mut archived: Vec<&ArchivedPolicy> = self.archived.values().collect();
        archived.sort_by_key(|a| a.archived_at);
        archived
    }

    pub fn request(&self, id: Uuid) -> Result<&PolicyRequest, AppError> {
        self.requests
            .get(&id)
            .ok_or_else(|| not_found_error(format!("Policy request {} not found", id)))
    }

    /// Questions, newest first
    pub fn requests(&self) -> Vec<&PolicyRequest> {
        let mut requests: Vec<&PolicyRequest> = self.requests.values().collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        requests
    }

    /// Department owning the policy a question was asked about
    pub fn request_owner(&self, request: &PolicyRequest) -> Option<Uuid> {
        self.policies
            .get(&request.policy_id)
            .and_then(|p| p.owning_department)
    }

    /// Current numbering revision of a section (0 for unknown sections)
    pub fn revision(&self, section_id: Uuid) -> u64 {
        self.revisions.get(&section_id).copied().unwrap_or(0)
    }

    pub(crate) fn touch_section(&mut self, section_id: Uuid) {
        *self.revisions.entry(section_id).or_insert(0) += 1;
    }

    /// Resolve a related-policy id across live and archived partitions
    pub fn resolve_related(&self, id: Uuid) -> Option<RelatedDocument> {
        if let Some(policy) = self.policies.get(&id) {
            return Some(RelatedDocument::Live(policy.clone()));
        }
        self.archived
            .get(&id)
            .or_else(|| self.archived.values().find(|a| a.source_policy_id == id))
            .map(|a| RelatedDocument::Archived(a.clone()))
    }

    /// Live policies whose related set points at `id`
    pub fn referrers(&self, id: Uuid) -> Vec<Uuid> {
        let mut referrers: Vec<&Policy> = self
            .policies
            .values()
            .filter(|p| p.related_policies.contains(&id))
            .collect();
        referrers.sort_by_key(|p| p.seq);
        referrers.into_iter().map(|p| p.id).collect()
    }

    /// Every definition and related-policy id must resolve to a live record
    pub fn check_references<'a>(
        &self,
        definitions: impl IntoIterator<Item = &'a Uuid>,
        related_policies: impl IntoIterator<Item = &'a Uuid>,
    ) -> Result<(), AppError> {
        for id in definitions {
            if !self.definitions.contains_key(id) {
                return Err(AppError::DanglingReference(format!(
                    "Definition {} does not exist",
                    id
                )));
            }
        }
        for id in related_policies {
            if !self.policies.contains_key(id) {
                return Err(AppError::DanglingReference(format!(
                    "Related policy {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    pub(crate) fn insert_section(
        &mut self,
        title: String,
        number: SectionNumber,
        now: DateTime<Utc>,
    ) -> Result<Section, AppError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(validation_error("Section title is required"));
        }
        if self.sections.values().any(|s| s.title == title) {
            return Err(validation_error(format!("Section '{}' already exists", title)));
        }
        self.ensure_section_number_free(number, None)?;

        let section = Section {
            id: Uuid::new_v4(),
            title,
            number,
            created_at: now,
        };
        self.sections.insert(section.id, section.clone());
        self.revisions.insert(section.id, 0);
        Ok(section)
    }

    fn ensure_section_number_free(
        &self,
        number: SectionNumber,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        if self
            .sections
            .values()
            .any(|s| s.number == number && Some(s.id) != except)
        {
            return Err(validation_error(format!(
                "Section number {} is already in use",
                number
            )));
        }
        Ok(())
    }

    /// Change a section's number and cascade the new prefix to its policies
    pub(crate) fn renumber_section_to(
        &mut self,
        section_id: Uuid,
        number: SectionNumber,
    ) -> Result<Vec<Renumbered>, AppError> {
        self.ensure_section_number_free(number, Some(section_id))?;
        let section = self.section_mut(section_id)?;
        if section.number == number {
            return Ok(Vec::new());
        }
        section.number = number;
        NumberingAllocator::renumber_section(self, section_id)
    }

    pub(crate) fn insert_definition(
        &mut self,
        term: String,
        body: String,
        created_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Definition, AppError> {
        if term.trim().is_empty() {
            return Err(validation_error("Definition term is required"));
        }
        let definition = Definition {
            id: Uuid::new_v4(),
            term: term.trim().to_string(),
            body,
            created_by,
            created_at: now,
        };
        self.definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    /// Publish a policy, numbering it at insert time
    pub(crate) fn insert_policy(
        &mut self,
        new: NewPolicy,
        now: DateTime<Utc>,
    ) -> Result<Policy, AppError> {
        if new.title.trim().is_empty() {
            return Err(validation_error("Policy title is required"));
        }
        self.section(new.section_id)?;
        self.check_references(&new.definitions, &new.related_policies)?;

        let number = NumberingAllocator::allocate(self, new.section_id)?;
        self.next_seq += 1;

        let mut policy = Policy {
            id: Uuid::new_v4(),
            section_id: new.section_id,
            title: new.title.trim().to_string(),
            number,
            version: Version::INITIAL,
            review_period: new.review_period,
            purpose: new.purpose,
            scope: new.scope,
            statements: new.statements,
            responsibilities: new.responsibilities,
            owning_department: new.owning_department,
            related_policies: new.related_policies,
            definitions: new.definitions,
            procedure_steps: Vec::new(),
            seq: self.next_seq,
            published_at: now,
            updated_at: now,
        };
        policy.replace_steps(new.steps);

        self.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    /// Delete a live policy with its steps and drop the inbound related links
    pub(crate) fn remove_policy(&mut self, id: Uuid) -> Result<Policy, AppError> {
        let policy = self
            .policies
            .remove(&id)
            .ok_or_else(|| not_found_error(format!("Policy {} not found", id)))?;
        for other in self.policies.values_mut() {
            other.related_policies.remove(&id);
        }
        self.requests.retain(|_, r| r.policy_id != id);
        Ok(policy)
    }

    pub(crate) fn insert_request(
        &mut self,
        new: NewPolicyRequest,
        now: DateTime<Utc>,
    ) -> Result<PolicyRequest, AppError> {
        self.policy(new.policy_id)?;
        let question = new.question.trim().to_string();
        if question.is_empty() {
            return Err(validation_error("Question cannot be empty"));
        }
        let request = PolicyRequest {
            id: Uuid::new_v4(),
            policy_id: new.policy_id,
            requester: new.requester,
            requester_name: new.requester_name,
            requester_email: new.requester_email,
            question,
            submitted_at: now,
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            admin_notes: None,
        };
        self.requests.insert(request.id, request.clone());
        Ok(request)
    }

    pub(crate) fn request_mut(&mut self, id: Uuid) -> Result<&mut PolicyRequest, AppError> {
        self.requests
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("Policy request {} not found", id)))
    }

    pub(crate) fn insert_archived(&mut self, archived: ArchivedPolicy) {
        self.archived.insert(archived.id, archived);
    }

    // =========================================================================
    // INVARIANTS
    // =========================================================================

    /// A section's policies must read 1..N under its prefix, and no live number may repeat
    fn verify_numbering(&self, section_id: Uuid) -> Result<(), AppError> {
        let section = match self.sections.get(&section_id) {
            Some(section) => section,
            None => return Ok(()),
        };
        for (index, policy) in self.policies_in_section(section_id).iter().enumerate() {
            policy.number.ensure_within(section.number)?;
            if policy.number.sequence() != index as u32 + 1 {
                return Err(conflict_error(format!(
                    "Section {} has a gap or overlap at policy {}",
                    section.number, policy.number
                )));
            }
        }
        Ok(())
    }

    fn verify_unique_numbers(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for policy in self.policies.values() {
            if !seen.insert(policy.number) {
                return Err(conflict_error(format!(
                    "Policy number {} is assigned twice",
                    policy.number
                )));
            }
        }
        Ok(())
    }

    fn sections_touched_since(&self, before: &Handbook) -> BTreeSet<Uuid> {
        self.revisions
            .iter()
            .filter(|(id, rev)| before.revision(**id) != **rev || !before.sections.contains_key(*id))
            .map(|(id, _)| *id)
            .collect()
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Thread-safe owner of the published handbook
pub struct DocumentStore {
    handbook: RwLock<Handbook>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            handbook: RwLock::new(Handbook::default()),
        }
    }

    /// Run a read-only query against a consistent view
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Handbook) -> T,
    {
        let handbook = self.handbook.read().await;
        f(&handbook)
    }

    /// Run `f` as one serializable transaction.
    ///
    /// `expected` pins section numbering revisions observed during an earlier
    /// read phase; if any moved, the transaction fails with
    /// [`AppError::NumberingConflict`] before running `f`. On any error the
    /// working copy is discarded and the store is left exactly as it was.
    pub async fn transact<T, F>(&self, expected: &[(Uuid, u64)], f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Handbook) -> Result<T, AppError> + Send,
        T: Send,
    {
        let mut handbook = self.handbook.write().await;

        for (section_id, revision) in expected {
            let current = handbook.revision(*section_id);
            if current != *revision {
                return Err(conflict_error(format!(
                    "Section {} numbering moved from revision {} to {}",
                    section_id, revision, current
                )));
            }
        }

        let mut working = handbook.clone();
        let result = f(&mut working)?;

        let touched = working.sections_touched_since(&handbook);
        if !touched.is_empty() {
            for section_id in &touched {
                working.verify_numbering(*section_id)?;
            }
            working.verify_unique_numbers()?;
        }

        *handbook = working;
        debug!("Committed transaction touching {} section(s)", touched.len());
        Ok(result)
    }

    pub async fn section_revision(&self, section_id: Uuid) -> Result<u64, AppError> {
        self.read(|h| h.section(section_id).map(|_| h.revision(section_id)))
            .await
    }

    // =========================================================================
    // SECTIONS
    // =========================================================================

    pub async fn create_section(
        &self,
        title: String,
        number: SectionNumber,
    ) -> Result<Section, AppError> {
        let section = self
            .transact(&[], |h| h.insert_section(title, number, Utc::now()))
            .await?;
        info!("Created section {} {}", section.number, section.title);
        Ok(section)
    }

    /// Change a section's number; every owned policy is renumbered under the new prefix
    pub async fn change_section_number(
        &self,
        section_id: Uuid,
        number: SectionNumber,
    ) -> Result<Vec<Renumbered>, AppError> {
        let changes = self
            .transact(&[], |h| h.renumber_section_to(section_id, number))
            .await?;
        info!(
            "Section {} moved to {} ({} policies renumbered)",
            section_id,
            number,
            changes.len()
        );
        Ok(changes)
    }

    pub async fn list_sections(&self) -> Vec<Section> {
        self.read(|h| h.sections().into_iter().cloned().collect())
            .await
    }

    pub async fn get_section(&self, id: Uuid) -> Result<Section, AppError> {
        self.read(|h| h.section(id).cloned()).await
    }

    // =========================================================================
    // POLICIES
    // =========================================================================

    /// Administrative bootstrap: publish a policy without going through review
    pub async fn publish_policy(&self, new: NewPolicy) -> Result<Policy, AppError> {
        let policy = self
            .transact(&[], |h| h.insert_policy(new, Utc::now()))
            .await?;
        info!("Published policy {} {}", policy.number, policy.title);
        Ok(policy)
    }

    pub async fn get_policy(&self, id: Uuid) -> Result<Policy, AppError> {
        self.read(|h| h.policy(id).cloned()).await
    }

    pub async fn find_policy_by_number(&self, number: PolicyNumber) -> Result<Policy, AppError> {
        self.read(|h| h.policy_by_number(number).cloned())
            .await
            .ok_or_else(|| not_found_error(format!("Policy {} not found", number)))
    }

    pub async fn list_policies(&self, section_id: Uuid) -> Result<Vec<Policy>, AppError> {
        self.read(|h| {
            h.section(section_id)?;
            Ok(h.policies_in_section(section_id).into_iter().cloned().collect())
        })
        .await
    }

    /// Remove one procedure step from a published policy and close the gap
    pub async fn remove_procedure_step(
        &self,
        policy_id: Uuid,
        step_id: Uuid,
    ) -> Result<Policy, AppError> {
        self.transact(&[], |h| {
            let policy = h.policy_mut(policy_id)?;
            policy.remove_step(step_id)?;
            policy.updated_at = Utc::now();
            Ok(policy.clone())
        })
        .await
    }

    pub async fn resolve_related(&self, id: Uuid) -> Result<RelatedDocument, AppError> {
        self.read(|h| h.resolve_related(id))
            .await
            .ok_or_else(|| not_found_error(format!("No live or archived policy {}", id)))
    }

    pub async fn referrers(&self, id: Uuid) -> Vec<Uuid> {
        self.read(|h| h.referrers(id)).await
    }

    // =========================================================================
    // DEFINITIONS
    // =========================================================================

    pub async fn create_definition(
        &self,
        term: String,
        body: String,
        created_by: Option<Uuid>,
    ) -> Result<Definition, AppError> {
        self.transact(&[], |h| h.insert_definition(term, body, created_by, Utc::now()))
            .await
    }

    pub async fn list_definitions(&self) -> Vec<Definition> {
        self.read(|h| h.definitions().into_iter().cloned().collect())
            .await
    }

    // =========================================================================
    // QUESTIONS
    // =========================================================================

    pub async fn file_request(&self, new: NewPolicyRequest) -> Result<PolicyRequest, AppError> {
        self.transact(&[], |h| h.insert_request(new, Utc::now()))
            .await
    }

    /// A question together with the department that owns its policy
    pub async fn request_with_owner(
        &self,
        id: Uuid,
    ) -> Result<(PolicyRequest, Option<Uuid>), AppError> {
        self.read(|h| {
            let request = h.request(id)?;
            Ok((request.clone(), h.request_owner(request)))
        })
        .await
    }

    /// Every question with its owning department, newest first
    pub async fn requests_with_owners(&self) -> Vec<(PolicyRequest, Option<Uuid>)> {
        self.read(|h| {
            h.requests()
                .into_iter()
                .map(|r| (r.clone(), h.request_owner(r)))
                .collect()
        })
        .await
    }

    /// Resolve a batch of questions; an unknown id leaves every one untouched
    pub async fn resolve_requests(
        &self,
        ids: &[Uuid],
        resolver: Uuid,
        notes: Option<String>,
    ) -> Result<Vec<PolicyRequest>, AppError> {
        self.transact(&[], |h| {
            let now = Utc::now();
            ids.iter()
                .map(|id| {
                    let request = h.request_mut(*id)?;
                    request.resolve(resolver, notes.clone(), now);
                    Ok(request.clone())
                })
                .collect()
        })
        .await
    }

    // =========================================================================
    // ARCHIVE
    // =========================================================================

    /// Archive a policy directly as one atomic unit
    pub async fn archive_policy(&self, policy_id: Uuid) -> Result<ArchivedPolicy, AppError> {
        self.transact(&[], |h| ArchivalEngine::archive(h, policy_id, Utc::now()))
            .await
    }

    pub async fn get_archived(&self, id: Uuid) -> Result<ArchivedPolicy, AppError> {
        self.read(|h| h.archived(id).cloned()).await
    }

    pub async fn list_archived(&self) -> Vec<ArchivedPolicy> {
        self.read(|h| h.archived_policies().into_iter().cloned().collect())
            .await
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
