//! Section Routes
//!
//! Section administration. Changing a section's number renumbers its policies.

use super::{require_admin, ActorId};
use crate::audit::{AuditAction, AuditEntry};
use crate::error::{validation_error, ApiResult};
use crate::handbook::SectionNumber;
use crate::models::{
    CreateSectionRequest, PolicyListResponse, RenumberResponse, RenumberSectionRequest,
    SectionListResponse, SectionResponse, SuccessResponse,
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

pub async fn list_sections(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<SectionListResponse>>> {
    let sections = state.documents.list_sections().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} section(s)", sections.len()),
        SectionListResponse { sections },
    )))
}

pub async fn create_section(
    State(state): State<SharedState>,
    actor: ActorId,
    Json(payload): Json<CreateSectionRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<SectionResponse>>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    require_admin(&state, actor).await?;

    let number: SectionNumber = payload.number.parse()?;
    let section = state.documents.create_section(payload.title, number).await?;

    state
        .audit
        .record(
            AuditEntry::new(AuditAction::SectionCreated, "section", Some(section.id))
                .by(actor.0)
                .with_details(json!({ "number": section.number, "title": section.title })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            format!("Section {} created", section.number),
            SectionResponse { section },
        )),
    ))
}

pub async fn get_section(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<SectionResponse>>> {
    let section = state.documents.get_section(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Section retrieved",
        SectionResponse { section },
    )))
}

pub async fn change_section_number(
    State(state): State<SharedState>,
    actor: ActorId,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenumberSectionRequest>,
) -> ApiResult<Json<SuccessResponse<RenumberResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    require_admin(&state, actor).await?;

    let number: SectionNumber = payload.number.parse()?;
    let renumbered = state.documents.change_section_number(id, number).await?;
    let section = state.documents.get_section(id).await?;

    state
        .audit
        .record(
            AuditEntry::new(AuditAction::SectionRenumbered, "section", Some(id))
                .by(actor.0)
                .with_details(json!({ "number": number, "renumbered": renumbered.len() })),
        )
        .await;

    Ok(Json(SuccessResponse::with_data(
        format!("Section is now {}", section.number),
        RenumberResponse {
            section,
            renumbered,
        },
    )))
}

pub async fn list_section_policies(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<PolicyListResponse>>> {
    let policies = state.documents.list_policies(id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} policies", policies.len()),
        PolicyListResponse { policies },
    )))
}
