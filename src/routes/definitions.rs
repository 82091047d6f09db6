//! Definition Routes

use super::{require_admin, ActorId};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{validation_error, ApiResult};
use crate::models::{
    CreateDefinitionRequest, DefinitionListResponse, DefinitionResponse, SuccessResponse,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

pub async fn list_definitions(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<DefinitionListResponse>>> {
    let definitions = state.documents.list_definitions().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} definition(s)", definitions.len()),
        DefinitionListResponse { definitions },
    )))
}

pub async fn create_definition(
    State(state): State<SharedState>,
    actor: ActorId,
    Json(payload): Json<CreateDefinitionRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<DefinitionResponse>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    require_admin(&state, actor).await?;

    let definition = state
        .documents
        .create_definition(payload.term, payload.body, Some(actor.0))
        .await?;
    state
        .audit
        .record(
            AuditEntry::new(AuditAction::DefinitionCreated, "definition", Some(definition.id))
                .by(actor.0),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Definition '{}' created", definition.term),
            DefinitionResponse { definition },
        )),
    ))
}
