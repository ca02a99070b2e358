use std::sync::Arc;
use actix_web::{http::header, web, Either, HttpRequest, HttpResponse};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::StaffUser;
use crate::bump::BumpResetOperation;
use crate::error::ApiError;
use crate::guard::StaffGuard;
use crate::repo::Repo;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reset_bump")
            .wrap(StaffGuard)
            .service(web::resource(["", "/"]).route(web::post().to(reset_bump)))
            .service(web::resource("/logs").route(web::get().to(list_reset_logs))),
    );
}

#[derive(Clone)]
pub struct AppState { pub repo: Arc<dyn Repo>, pub reset: BumpResetOperation }

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, enabled: bool) -> Self {
        let reset = BumpResetOperation::new(repo.clone(), enabled);
        Self { repo, reset }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResetBumpParams {
    /// Id of the post whose creation time becomes the thread's bump time.
    /// Accepted as a string or a JSON integer.
    #[serde(default, deserialize_with = "raw_id")]
    pub post_id: Option<String>,
    /// Name used by older clients; ignored when `post_id` is present.
    #[serde(default, rename = "postId", deserialize_with = "raw_id")]
    pub legacy_post_id: Option<String>,
}

impl ResetBumpParams {
    /// Values from `self` win over values from `other`, name by name.
    fn over(self, other: ResetBumpParams) -> Self {
        Self {
            post_id: self.post_id.or(other.post_id),
            legacy_post_id: self.legacy_post_id.or(other.legacy_post_id),
        }
    }

    fn into_post_id(self) -> Option<String> {
        self.post_id.or(self.legacy_post_id)
    }
}

// Form bodies always carry strings, JSON clients tend to send numbers. Any other JSON
// value is kept as its JSON text so the id parse rejects it instead of dropping it.
fn raw_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw { Text(String), Int(i64), Other(serde_json::Value) }

    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Other(v) => v.to_string(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: String,
}

#[utoipa::path(
    post,
    path = "/reset_bump",
    request_body(content = ResetBumpParams, content_type = "application/x-www-form-urlencoded"),
    params(ResetBumpParams),
    responses(
        (status = 200, description = "Thread bump reset", body = SuccessResponse),
        (status = 400, description = "post_id missing or not a positive integer, or unreadable body", body = ApiErrorBody),
        (status = 401, description = "Not logged in", body = ApiErrorBody),
        (status = 403, description = "Forbidden – staff only", body = ApiErrorBody),
        (status = 404, description = "Post or thread not found, or feature disabled", body = ApiErrorBody),
        (status = 500, description = "Thread update failed", body = ApiErrorBody)
    )
)]
pub async fn reset_bump(
    user: StaffUser,
    data: web::Data<AppState>,
    req: HttpRequest,
    query: Result<web::Query<ResetBumpParams>, actix_web::Error>,
    body: Result<Either<web::Form<ResetBumpParams>, web::Json<ResetBumpParams>>, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    let from_query = query
        .map_err(|_| ApiError::BadRequest("malformed query string".into()))?
        .into_inner();
    let from_body = match body {
        Ok(Either::Left(form)) => form.into_inner(),
        Ok(Either::Right(json)) => json.into_inner(),
        // a request without a content type carries no body params
        Err(_) if !req.headers().contains_key(header::CONTENT_TYPE) => ResetBumpParams::default(),
        Err(_) => return Err(ApiError::BadRequest("request body is not a valid form or JSON document".into())),
    };
    // query string wins over the body
    let raw = from_query.over(from_body).into_post_id();

    data.reset.execute(raw.as_deref(), &user.0).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: "OK".into() }))
}

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 200;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    /// Entries to return (1-200, default 50).
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/reset_bump/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Recent bump resets, newest first", body = [AuditEntry]),
        (status = 401, description = "Not logged in", body = ApiErrorBody),
        (status = 403, description = "Forbidden – staff only", body = ApiErrorBody)
    )
)]
pub async fn list_reset_logs(
    _user: StaffUser,
    data: web::Data<AppState>,
    query: web::Query<LogsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let entries = data.repo.list_audit_entries(limit).await?;
    Ok(HttpResponse::Ok().json(entries))
}
