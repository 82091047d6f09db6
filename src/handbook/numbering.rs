//! Numbering Allocator
//!
//! Assigns `<section-prefix>.<sequence>` numbers and keeps every section's
//! sequence contiguous after insertions, removals and section renumbering.
//!
//! Every allocation or renumbering bumps the section's numbering revision,
//! which is what concurrent writers compare against at commit time.

use crate::error::AppError;
use crate::handbook::models::PolicyNumber;
use crate::handbook::store::Handbook;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// One policy whose number changed during a renumbering pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Renumbered {
    pub policy_id: Uuid,
    pub from: PolicyNumber,
    pub to: PolicyNumber,
}

pub struct NumberingAllocator;

impl NumberingAllocator {
    /// Number the next policy created in the section would receive
    pub fn next_number(handbook: &Handbook, section_id: Uuid) -> Result<PolicyNumber, AppError> {
        let section = handbook.section(section_id)?;
        let count = handbook.policies_in_section(section_id).len() as u32;
        Ok(PolicyNumber::new(section.number, count + 1))
    }

    /// Reserve the next number for a policy about to be inserted
    pub(crate) fn allocate(
        handbook: &mut Handbook,
        section_id: Uuid,
    ) -> Result<PolicyNumber, AppError> {
        let number = Self::next_number(handbook, section_id)?;
        handbook.touch_section(section_id);
        debug!("Allocated policy number {} in section {}", number, section_id);
        Ok(number)
    }

    /// Reassign 1..N under the section's current prefix, walking policies in insertion order.
    pub fn renumber_section(
        handbook: &mut Handbook,
        section_id: Uuid,
    ) -> Result<Vec<Renumbered>, AppError> {
        let section_number = handbook.section(section_id)?.number;
        let ordered: Vec<Uuid> = handbook
            .policies_in_section(section_id)
            .iter()
            .map(|p| p.id)
            .collect();

        let mut changes = Vec::new();
        for (index, policy_id) in ordered.into_iter().enumerate() {
            let target = PolicyNumber::new(section_number, index as u32 + 1);
            let policy = handbook.policy_mut(policy_id)?;
            if policy.number != target {
                changes.push(Renumbered {
                    policy_id,
                    from: policy.number,
                    to: target,
                });
                policy.number = target;
            }
        }

        handbook.touch_section(section_id);
        if !changes.is_empty() {
            debug!(
                "Renumbered {} policies in section {}",
                changes.len(),
                section_number
            );
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::models::{NewPolicy, SectionNumber};
    use chrono::Utc;

    fn section_with_policies(handbook: &mut Handbook, prefix: u32, count: usize) -> Uuid {
        let section = handbook
            .insert_section(format!("Section {}", prefix), SectionNumber::new(prefix), Utc::now())
            .unwrap();
        for i in 0..count {
            handbook
                .insert_policy(
                    NewPolicy {
                        section_id: section.id,
                        title: format!("Policy {}", i + 1),
                        ..Default::default()
                    },
                    Utc::now(),
                )
                .unwrap();
        }
        section.id
    }

    fn numbers(handbook: &Handbook, section_id: Uuid) -> Vec<String> {
        handbook
            .policies_in_section(section_id)
            .iter()
            .map(|p| p.number.to_string())
            .collect()
    }

    #[test]
    fn test_next_number_counts_section_members() {
        let mut handbook = Handbook::default();
        let section_id = section_with_policies(&mut handbook, 3, 2);

        let next = NumberingAllocator::next_number(&handbook, section_id).unwrap();
        assert_eq!(next.to_string(), "3.3");
    }

    #[test]
    fn test_allocate_bumps_revision() {
        let mut handbook = Handbook::default();
        let section_id = section_with_policies(&mut handbook, 1, 0);
        let before = handbook.revision(section_id);

        NumberingAllocator::allocate(&mut handbook, section_id).unwrap();

        assert!(handbook.revision(section_id) > before);
    }

    #[test]
    fn test_renumber_under_new_prefix() {
        let mut handbook = Handbook::default();
        let section_id = section_with_policies(&mut handbook, 2, 3);
        handbook.section_mut(section_id).unwrap().number = SectionNumber::new(7);

        let changes = NumberingAllocator::renumber_section(&mut handbook, section_id).unwrap();

        assert_eq!(changes.len(), 3);
        assert_eq!(numbers(&handbook, section_id), vec!["7.1", "7.2", "7.3"]);
    }

    #[test]
    fn test_renumber_closes_gap() {
        let mut handbook = Handbook::default();
        let section_id = section_with_policies(&mut handbook, 4, 3);
        let middle = handbook.policies_in_section(section_id)[1].id;
        handbook.remove_policy(middle).unwrap();

        let changes = NumberingAllocator::renumber_section(&mut handbook, section_id).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from.to_string(), "4.3");
        assert_eq!(numbers(&handbook, section_id), vec!["4.1", "4.2"]);
    }

    #[test]
    fn test_unknown_section() {
        let handbook = Handbook::default();
        assert!(matches!(
            NumberingAllocator::next_number(&handbook, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }
}
