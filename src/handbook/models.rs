//! Handbook data models
//!
//! Published records: sections, policies, procedure steps, definitions and
//! the frozen archive copies of retired policies.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static SECTION_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.0$").expect("section number pattern is valid"));

static POLICY_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)$").expect("policy number pattern is valid"));

// =============================================================================
// NUMBERS AND VERSIONS
// =============================================================================

/// Section number in the `N.0` format (e.g. "3.0")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionNumber(u32);

impl SectionNumber {
    pub fn new(prefix: u32) -> Self {
        Self(prefix)
    }

    /// Integer prefix shared by every policy in the section
    pub fn prefix(&self) -> u32 {
        self.0
    }
}

impl FromStr for SectionNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SECTION_NUMBER_RE.captures(s.trim()).ok_or_else(|| {
            AppError::Validation(format!(
                "Section number must be in the format N.0 (e.g. '1.0'), got '{}'",
                s
            ))
        })?;
        caps[1]
            .parse()
            .map(SectionNumber)
            .map_err(|_| AppError::Validation(format!("Section number '{}' is out of range", s)))
    }
}

impl TryFrom<String> for SectionNumber {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SectionNumber> for String {
    fn from(number: SectionNumber) -> Self {
        number.to_string()
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.0", self.0)
    }
}

/// Policy number `<section-prefix>.<sequence>` (e.g. "3.2")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyNumber {
    prefix: u32,
    sequence: u32,
}

impl PolicyNumber {
    pub fn new(section: SectionNumber, sequence: u32) -> Self {
        Self {
            prefix: section.prefix(),
            sequence,
        }
    }

    pub fn prefix(&self) -> u32 {
        self.prefix
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Check the number carries the section's integer prefix
    pub fn ensure_within(&self, section: SectionNumber) -> Result<(), AppError> {
        if self.prefix != section.prefix() {
            return Err(AppError::Validation(format!(
                "Policy number {} must match the section {} prefix",
                self, section
            )));
        }
        Ok(())
    }
}

impl FromStr for PolicyNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("Invalid policy number '{}'", s));
        let caps = POLICY_NUMBER_RE.captures(s.trim()).ok_or_else(invalid)?;
        let prefix = caps[1].parse().map_err(|_| invalid())?;
        let sequence: u32 = caps[2].parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        Ok(Self { prefix, sequence })
    }
}

impl TryFrom<String> for PolicyNumber {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PolicyNumber> for String {
    fn from(number: PolicyNumber) -> Self {
        number.to_string()
    }
}

impl fmt::Display for PolicyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.prefix, self.sequence)
    }
}

/// Policy version in `major.minor` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// Version assigned to every newly created policy
    pub const INITIAL: Version = Version { major: 1, minor: 0 };

    /// Structurally significant change: next major, minor reset
    pub fn bump_major(self) -> Self {
        Self {
            major: self.major + 1,
            minor: 0,
        }
    }
}

impl FromStr for Version {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("Version must be 'major.minor', got '{}'", s));
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// How often a policy must be reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewPeriod {
    Monthly,
    Quarterly,
    Annually,
    #[serde(rename = "Bi-Annually")]
    BiAnnually,
    Biennially,
}

// =============================================================================
// PUBLISHED RECORDS
// =============================================================================

/// Top-level numbered grouping of policies (e.g. "1.0 Employment")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub number: SectionNumber,
    pub created_at: DateTime<Utc>,
}

/// One step of a policy's procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureStep {
    pub id: Uuid,
    pub policy_id: Uuid,
    /// 1-based, gapless within the policy
    pub step_number: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub id: Uuid,
    pub term: String,
    pub body: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A single governed document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub number: PolicyNumber,
    pub version: Version,
    pub review_period: Option<ReviewPeriod>,
    pub purpose: String,
    pub scope: String,
    pub statements: String,
    pub responsibilities: String,
    pub owning_department: Option<Uuid>,
    /// Directed: "this references that"
    pub related_policies: BTreeSet<Uuid>,
    pub definitions: BTreeSet<Uuid>,
    pub procedure_steps: Vec<ProcedureStep>,
    /// Insertion order, the stable tiebreak for renumbering
    #[serde(skip)]
    pub seq: u64,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Delete every step and recreate them numbered 1..N in the given order
    pub fn replace_steps<I, S>(&mut self, descriptions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let policy_id = self.id;
        self.procedure_steps = descriptions
            .into_iter()
            .enumerate()
            .map(|(index, description)| ProcedureStep {
                id: Uuid::new_v4(),
                policy_id,
                step_number: index as u32 + 1,
                description: description.into(),
            })
            .collect();
    }

    /// Remove a single step and close the gap it leaves
    pub fn remove_step(&mut self, step_id: Uuid) -> Result<ProcedureStep, AppError> {
        let position = self
            .procedure_steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| AppError::NotFound(format!("Procedure step {} not found", step_id)))?;
        let removed = self.procedure_steps.remove(position);
        self.renumber_steps();
        Ok(removed)
    }

    fn renumber_steps(&mut self) {
        self.procedure_steps.sort_by_key(|s| s.step_number);
        for (index, step) in self.procedure_steps.iter_mut().enumerate() {
            step.step_number = index as u32 + 1;
        }
    }

    /// Symmetric add/remove against the proposed set; untouched links stay as they are.
    /// Returns the number of links added and removed.
    pub fn sync_definitions(&mut self, proposed: &BTreeSet<Uuid>) -> (usize, usize) {
        let stale: Vec<Uuid> = self.definitions.difference(proposed).copied().collect();
        let fresh: Vec<Uuid> = proposed.difference(&self.definitions).copied().collect();
        for id in &stale {
            self.definitions.remove(id);
        }
        self.definitions.extend(fresh.iter().copied());
        (fresh.len(), stale.len())
    }
}

/// Everything needed to publish a new policy; the number is allocated at insert time
#[derive(Debug, Clone, Default)]
pub struct NewPolicy {
    pub section_id: Uuid,
    pub title: String,
    pub review_period: Option<ReviewPeriod>,
    pub purpose: String,
    pub scope: String,
    pub statements: String,
    pub responsibilities: String,
    pub owning_department: Option<Uuid>,
    pub related_policies: BTreeSet<Uuid>,
    pub definitions: BTreeSet<Uuid>,
    /// Step descriptions in order; numbering is assigned on insert
    pub steps: Vec<String>,
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// A reader's question about a published policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub requester: Uuid,
    pub requester_name: String,
    pub requester_email: Option<String>,
    pub question: String,
    pub submitted_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Follow-up written by whoever handled the question
    pub admin_notes: Option<String>,
}

impl PolicyRequest {
    /// Mark answered; resolving again only refreshes the notes
    pub fn resolve(&mut self, resolver: Uuid, notes: Option<String>, now: DateTime<Utc>) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_by = Some(resolver);
            self.resolved_at = Some(now);
        }
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            self.admin_notes = Some(notes);
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPolicyRequest {
    pub policy_id: Uuid,
    pub requester: Uuid,
    pub requester_name: String,
    pub requester_email: Option<String>,
    pub question: String,
}

// =============================================================================
// ARCHIVE
// =============================================================================

/// Read-only history of a step; row identity is not kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedStep {
    pub step_number: u32,
    pub description: String,
}

/// Frozen copy of a policy at the moment it was archived
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedPolicy {
    pub id: Uuid,
    pub source_policy_id: Uuid,
    pub section_id: Uuid,
    pub number: PolicyNumber,
    pub title: String,
    pub version: Version,
    pub review_period: Option<ReviewPeriod>,
    pub purpose: String,
    pub scope: String,
    pub statements: String,
    pub responsibilities: String,
    pub owning_department: Option<Uuid>,
    pub procedure_steps: Vec<ArchivedStep>,
    pub definitions: BTreeSet<Uuid>,
    /// Live policies this one referenced when it was archived
    pub related_policies: BTreeSet<Uuid>,
    pub published_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}
