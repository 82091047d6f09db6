//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::audit::AuditLog;
use crate::config::Settings;
use crate::handbook::DocumentStore;
use crate::proposal::ProposalStore;
use crate::workflow::{ApprovalWorkflow, IdentityProvider, Notifier, RequestDesk};
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Published sections, policies, definitions and archive
    pub documents: Arc<DocumentStore>,

    /// Review state machine over `proposals`
    pub workflow: ApprovalWorkflow,

    /// Reader questions about published policies
    pub requests: RequestDesk,

    pub identity: Arc<dyn IdentityProvider>,

    pub audit: Arc<AuditLog>,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let documents = Arc::new(DocumentStore::new());
        let audit = Arc::new(AuditLog::new());
        let workflow = ApprovalWorkflow::new(
            Arc::clone(&documents),
            Arc::new(ProposalStore::new()),
            Arc::clone(&identity),
            Arc::clone(&notifier),
            Arc::clone(&audit),
            settings.workflow.clone(),
        );
        let requests = RequestDesk::new(
            Arc::clone(&documents),
            Arc::clone(&identity),
            notifier,
            Arc::clone(&audit),
            settings.workflow.clone(),
        );

        Self {
            documents,
            workflow,
            requests,
            identity,
            audit,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
