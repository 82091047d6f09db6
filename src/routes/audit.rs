//! Audit Routes

use crate::error::ApiResult;
use crate::models::{AuditLogResponse, AuditQuery, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};

pub async fn get_audit_log(
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<SuccessResponse<AuditLogResponse>>> {
    let entries = state
        .audit
        .query(
            query.resource_type.as_deref(),
            query.resource_id,
            query.limit.unwrap_or(100),
        )
        .await;
    Ok(Json(SuccessResponse::with_data(
        format!("{} audit entries", entries.len()),
        AuditLogResponse { entries },
    )))
}
