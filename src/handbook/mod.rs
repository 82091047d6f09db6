//! Handbook module - the published policy corpus
//!
//! Sections, policies, procedure steps and definitions, plus the numbering
//! and archival machinery that keeps them consistent.

pub mod archival;
pub mod models;
pub mod numbering;
pub mod store;

pub use archival::ArchivalEngine;
pub use models::*;
pub use numbering::{NumberingAllocator, Renumbered};
pub use store::{DocumentStore, Handbook, RelatedDocument};
