//! Question Routes
//!
//! Readers ask about a policy by its number; owners list and resolve.

use super::ActorId;
use crate::error::{validation_error, ApiResult};
use crate::handbook::PolicyNumber;
use crate::models::{
    FileQuestionRequest, QuestionListResponse, QuestionResponse, ResolveQuestionsRequest,
    SuccessResponse,
};
use crate::state::SharedState;
use crate::workflow::RequestFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

pub async fn file_question(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(number): Path<String>,
    Json(payload): Json<FileQuestionRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<QuestionResponse>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let number: PolicyNumber = number.parse()?;
    let request = state
        .requests
        .file(actor.0, number, payload.question)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Question about {} received", number),
            QuestionResponse { request },
        )),
    ))
}

pub async fn list_questions(
    State(state): State<SharedState>,
    actor: ActorId,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<Json<SuccessResponse<QuestionListResponse>>> {
    let requests = state.requests.list(actor.0, &filter).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} question(s)", requests.len()),
        QuestionListResponse { requests },
    )))
}

pub async fn get_question(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<QuestionResponse>>> {
    let request = state.requests.get(actor.0, id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Question retrieved",
        QuestionResponse { request },
    )))
}

/// Mark a batch of questions resolved
pub async fn resolve_questions(
    State(state): State<SharedState>,
    actor: ActorId,
    Json(payload): Json<ResolveQuestionsRequest>,
) -> ApiResult<Json<SuccessResponse<QuestionListResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    let requests = state
        .requests
        .resolve(actor.0, &payload.ids, payload.admin_notes)
        .await?;
    Ok(Json(SuccessResponse::with_data(
        format!("{} question(s) marked resolved", requests.len()),
        QuestionListResponse { requests },
    )))
}
