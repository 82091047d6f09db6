//! Change proposals
//!
//! Staged new/edit/archive requests awaiting review.

pub mod changes;
pub mod models;
pub mod store;

pub use changes::{diff, CollectionUpdate, FieldDiff, FieldUpdate, ReferenceUpdate, ScalarUpdate};
pub use models::*;
pub use store::{ProposalFilter, ProposalHandle, ProposalStore};
