//! Proposal Routes
//!
//! Submission and review of handbook change proposals.

use super::ActorId;
use crate::error::{validation_error, ApiResult};
use crate::models::{
    DecisionRequest, DiffResponse, NoteRequest, ProposalListResponse, ProposalResponse,
    ResubmitRequest, SuccessResponse,
};
use crate::proposal::ProposalFilter;
use crate::state::SharedState;
use crate::workflow::ProposalRequest;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

pub async fn submit_proposal(
    State(state): State<SharedState>,
    actor: ActorId,
    Json(request): Json<ProposalRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<ProposalResponse>>)> {
    let proposal = state.workflow.submit(actor.0, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Proposal submitted for review",
            ProposalResponse { proposal },
        )),
    ))
}

pub async fn list_proposals(
    State(state): State<SharedState>,
    Query(filter): Query<ProposalFilter>,
) -> ApiResult<Json<SuccessResponse<ProposalListResponse>>> {
    let proposals = state.workflow.list(&filter).await;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} proposal(s)", proposals.len()),
        ProposalListResponse { proposals },
    )))
}

pub async fn get_proposal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ProposalResponse>>> {
    let proposal = state.workflow.get(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal retrieved",
        ProposalResponse { proposal },
    )))
}

pub async fn diff_proposal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<DiffResponse>>> {
    let fields = state.workflow.diff(id).await?;
    let changed = fields.iter().filter(|f| f.changed).count();
    Ok(Json(SuccessResponse::with_data(
        format!("{} field(s) changed", changed),
        DiffResponse { fields },
    )))
}

pub async fn add_note(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    Json(payload): Json<NoteRequest>,
) -> ApiResult<Json<SuccessResponse<ProposalResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let proposal = state.workflow.add_note(actor.0, id, payload.body).await?;
    Ok(Json(SuccessResponse::with_data(
        "Note added",
        ProposalResponse { proposal },
    )))
}

pub async fn approve_proposal(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<SuccessResponse<ProposalResponse>>> {
    let note = payload.and_then(|Json(p)| p.note);
    let proposal = state.workflow.approve(actor.0, id, note).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal approved and applied",
        ProposalResponse { proposal },
    )))
}

pub async fn reject_proposal(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<SuccessResponse<ProposalResponse>>> {
    let note = payload.and_then(|Json(p)| p.note);
    let proposal = state.workflow.reject(actor.0, id, note).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal rejected",
        ProposalResponse { proposal },
    )))
}

pub async fn request_revision(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<SuccessResponse<ProposalResponse>>> {
    let note = payload.and_then(|Json(p)| p.note);
    let proposal = state.workflow.request_revision(actor.0, id, note).await?;
    Ok(Json(SuccessResponse::with_data(
        "Revision requested",
        ProposalResponse { proposal },
    )))
}

pub async fn resubmit_proposal(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    payload: Option<Json<ResubmitRequest>>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<ProposalResponse>>)> {
    let draft = payload.and_then(|Json(p)| p.draft);
    let proposal = state.workflow.resubmit(actor.0, id, draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Proposal resubmitted",
            ProposalResponse { proposal },
        )),
    ))
}
