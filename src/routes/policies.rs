//! Policy Routes
//!
//! Read access to live and archived policies plus administrative seeding.
//! Content changes to published policies go through proposals.

use super::{require_admin, ActorId};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{validation_error, ApiResult};
use crate::handbook::{NewPolicy, PolicyNumber};
use crate::models::{
    ArchivedListResponse, ArchivedResponse, PolicyResponse, ProposalListResponse,
    PublishPolicyRequest, ReferrerListResponse, RelatedResponse, SuccessResponse,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Publish a policy directly, bypassing review (bootstrap only)
pub async fn publish_policy(
    State(state): State<SharedState>,
    actor: ActorId,
    Json(payload): Json<PublishPolicyRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<PolicyResponse>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    require_admin(&state, actor).await?;

    let policy = state
        .documents
        .publish_policy(NewPolicy {
            section_id: payload.section_id,
            title: payload.title,
            review_period: payload.review_period,
            purpose: payload.purpose,
            scope: payload.scope,
            statements: payload.statements,
            responsibilities: payload.responsibilities,
            owning_department: payload.owning_department,
            related_policies: payload.related_policy_ids.into_iter().collect(),
            definitions: payload.definition_ids.into_iter().collect(),
            steps: payload.steps,
        })
        .await?;

    state
        .audit
        .record(
            AuditEntry::new(AuditAction::PolicyPublished, "policy", Some(policy.id))
                .by(actor.0)
                .with_details(json!({ "number": policy.number })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Policy {} published", policy.number),
            PolicyResponse { policy },
        )),
    ))
}

pub async fn get_policy(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<PolicyResponse>>> {
    let policy = state.documents.get_policy(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Policy retrieved",
        PolicyResponse { policy },
    )))
}

pub async fn get_policy_by_number(
    State(state): State<SharedState>,
    Path(number): Path<String>,
) -> ApiResult<Json<SuccessResponse<PolicyResponse>>> {
    let number: PolicyNumber = number.parse()?;
    let policy = state.documents.find_policy_by_number(number).await?;
    Ok(Json(SuccessResponse::with_data(
        "Policy retrieved",
        PolicyResponse { policy },
    )))
}

pub async fn pending_proposals(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ProposalListResponse>>> {
    let proposals = state.workflow.pending_for(id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} pending proposal(s)", proposals.len()),
        ProposalListResponse { proposals },
    )))
}

pub async fn remove_step(
    State(state): State<SharedState>,
    actor: ActorId,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<SuccessResponse<PolicyResponse>>> {
    require_admin(&state, actor).await?;
    let policy = state.documents.remove_procedure_step(id, step_id).await?;

    state
        .audit
        .record(
            AuditEntry::new(AuditAction::ProcedureStepRemoved, "policy", Some(id))
                .by(actor.0)
                .with_details(json!({ "stepId": step_id })),
        )
        .await;

    Ok(Json(SuccessResponse::with_data(
        "Procedure step removed",
        PolicyResponse { policy },
    )))
}

/// Resolve an id across the live and archived partitions
pub async fn resolve_related(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<RelatedResponse>>> {
    let document = state.documents.resolve_related(id).await?;
    let referrers = state.documents.referrers(id).await;
    Ok(Json(SuccessResponse::with_data(
        "Related document resolved",
        RelatedResponse {
            document,
            referrers,
        },
    )))
}

/// Live policies that list this one as related
pub async fn list_referrers(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ReferrerListResponse>>> {
    state.documents.resolve_related(id).await?;
    let referrers = state.documents.referrers(id).await;
    Ok(Json(SuccessResponse::with_data(
        format!("{} policy(ies) reference {}", referrers.len(), id),
        ReferrerListResponse {
            policy_id: id,
            referrers,
        },
    )))
}

pub async fn list_archived(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<ArchivedListResponse>>> {
    let archived = state.documents.list_archived().await;
    Ok(Json(SuccessResponse::with_data(
        format!("{} archived policies", archived.len()),
        ArchivedListResponse { archived },
    )))
}

pub async fn get_archived(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ArchivedResponse>>> {
    let archived = state.documents.get_archived(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Archived policy retrieved",
        ArchivedResponse { archived },
    )))
}
