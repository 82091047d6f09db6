//! Request/response structures used by the API

use crate::audit::AuditEntry;
use crate::handbook::{
    ArchivedPolicy, Definition, Policy, PolicyRequest, RelatedDocument, Renumbered,
    ReviewPeriod, Section, SectionNumber,
};
use crate::proposal::{ChangeProposal, FieldDiff, PolicyDraft};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    #[validate(length(min = 1, max = 200, message = "Section title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(custom(function = "validate_section_number"))]
    pub number: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenumberSectionRequest {
    #[validate(custom(function = "validate_section_number"))]
    pub number: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefinitionRequest {
    #[validate(length(min = 1, max = 200, message = "Term must be between 1 and 200 characters"))]
    pub term: String,
    #[serde(default)]
    pub body: String,
}

/// Administrative seeding of a published policy
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PublishPolicyRequest {
    pub section_id: Uuid,
    #[validate(length(min = 1, max = 300, message = "Policy title must be between 1 and 300 characters"))]
    pub title: String,
    #[serde(default)]
    pub review_period: Option<ReviewPeriod>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub statements: String,
    #[serde(default)]
    pub responsibilities: String,
    #[serde(default)]
    pub owning_department: Option<Uuid>,
    #[serde(default)]
    pub related_policy_ids: Vec<Uuid>,
    #[serde(default)]
    pub definition_ids: Vec<Uuid>,
    #[serde(default)]
    #[validate(custom(function = "validate_steps"))]
    pub steps: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    #[validate(length(min = 1, max = 4000, message = "Note must be between 1 and 4000 characters"))]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubmitRequest {
    #[serde(default)]
    pub draft: Option<PolicyDraft>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FileQuestionRequest {
    #[validate(length(min = 1, max = 4000, message = "Question must be between 1 and 4000 characters"))]
    pub question: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQuestionsRequest {
    #[validate(length(min = 1, message = "Select at least one question"))]
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub limit: Option<usize>,
}

fn validate_section_number(value: &str) -> Result<(), validator::ValidationError> {
    value.parse::<SectionNumber>().map(|_| ()).map_err(|_| {
        let mut err = validator::ValidationError::new("invalid_section_number");
        err.message = Some("Section number must look like '3.0'".into());
        err
    })
}

fn validate_steps(steps: &[String]) -> Result<(), validator::ValidationError> {
    if steps.iter().any(|s| s.trim().is_empty()) {
        let mut err = validator::ValidationError::new("blank_step");
        err.message = Some("Procedure step descriptions cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub section: Section,
}

#[derive(Debug, Serialize)]
pub struct SectionListResponse {
    pub sections: Vec<Section>,
}

#[derive(Debug, Serialize)]
pub struct RenumberResponse {
    pub section: Section,
    pub renumbered: Vec<Renumbered>,
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub policy: Policy,
}

#[derive(Debug, Serialize)]
pub struct PolicyListResponse {
    pub policies: Vec<Policy>,
}

#[derive(Debug, Serialize)]
pub struct RelatedResponse {
    pub document: RelatedDocument,
    /// Live policies that list this id as related
    pub referrers: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferrerListResponse {
    pub policy_id: Uuid,
    /// Live policies listing `policy_id` as related
    pub referrers: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DefinitionResponse {
    pub definition: Definition,
}

#[derive(Debug, Serialize)]
pub struct DefinitionListResponse {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Serialize)]
pub struct ArchivedResponse {
    pub archived: ArchivedPolicy,
}

#[derive(Debug, Serialize)]
pub struct ArchivedListResponse {
    pub archived: Vec<ArchivedPolicy>,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    pub proposal: ChangeProposal,
}

#[derive(Debug, Serialize)]
pub struct ProposalListResponse {
    pub proposals: Vec<ChangeProposal>,
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub fields: Vec<FieldDiff>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub request: PolicyRequest,
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub requests: Vec<PolicyRequest>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_request_validation() {
        let ok = CreateSectionRequest {
            title: "Employment".into(),
            number: "1.0".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = CreateSectionRequest {
            title: "Employment".into(),
            number: "1.2".into(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_blank_steps_rejected() {
        let request: PublishPolicyRequest = serde_json::from_value(serde_json::json!({
            "sectionId": Uuid::new_v4(),
            "title": "Leave",
            "steps": ["Ask", "  "]
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_resolve_needs_ids() {
        let empty: ResolveQuestionsRequest =
            serde_json::from_value(serde_json::json!({ "ids": [] })).unwrap();
        assert!(empty.validate().is_err());

        let one: ResolveQuestionsRequest = serde_json::from_value(serde_json::json!({
            "ids": [Uuid::new_v4()],
            "adminNotes": "Answered by email"
        }))
        .unwrap();
        assert!(one.validate().is_ok());
        assert_eq!(one.admin_notes.as_deref(), Some("Answered by email"));
    }

    #[test]
    fn test_envelope_flattens_data() {
        let body = serde_json::to_value(SuccessResponse::with_data(
            "ok",
            DiffResponse { fields: Vec::new() },
        ))
        .unwrap();
        assert_eq!(body["success"], true);
        assert!(body["fields"].is_array());
    }
}
