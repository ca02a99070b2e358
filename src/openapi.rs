use crate::models::{AuditAction, AuditEntry};
use crate::routes::{ResetBumpParams, SuccessResponse};
use crate::error::ApiErrorBody;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::reset_bump,
        crate::routes::list_reset_logs,
    ),
    components(schemas(
        ResetBumpParams, SuccessResponse, ApiErrorBody, AuditEntry, AuditAction
    )),
    tags(
        (name = "reset_bump", description = "Staff tools for thread bump times"),
    )
)]
pub struct ApiDoc;
