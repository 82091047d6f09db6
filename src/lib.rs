//! Policy handbook governance
//!
//! Sections of numbered policies, changed only through reviewed proposals:
//! - `handbook`: published records, numbering, archival
//! - `proposal`: staged new/edit/archive requests
//! - `workflow`: review state machine and apply

pub mod audit;
pub mod config;
pub mod error;
pub mod handbook;
pub mod models;
pub mod proposal;
pub mod routes;
pub mod state;
pub mod workflow;
