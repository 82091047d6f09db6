//! Review workflow, reader questions, and their outside collaborators

pub mod approval;
pub mod identity;
pub mod notify;
pub mod requests;

pub use approval::{apply, ApprovalWorkflow, ProposalRequest};
pub use identity::{Actor, IdentityProvider, InMemoryDirectory, Role};
pub use notify::{Notification, NotificationOutcome, Notifier, TracingNotifier};
pub use requests::{RequestDesk, RequestFilter};
