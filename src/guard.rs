//! Staff-only gate for the reset endpoints.
//!
//! Rejects callers without a valid bearer token (401) or without a staff role (403),
//! and stores the caller's `UserIdentity` in the request extensions for `StaffUser`.

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use tracing::warn;

use crate::auth::Auth;
use crate::error::ApiError;

#[derive(Clone, Default)]
pub struct StaffGuard;

impl<S, B> Transform<S, ServiceRequest> for StaffGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = StaffGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StaffGuardMiddleware { service: Rc::new(service) }))
    }
}

pub struct StaffGuardMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for StaffGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        Box::pin(async move {
            // ensure logged in
            let claims = match req.extract::<Auth>().await {
                Ok(Auth(claims)) => claims,
                Err(e) => {
                    warn!(path = req.path(), "rejected unauthenticated request");
                    return Ok(req.error_response(e).map_into_right_body());
                }
            };
            // ensure staff
            if !claims.is_staff() {
                warn!(path = req.path(), sub = %claims.sub, "rejected non-staff request");
                return Ok(req.error_response(ApiError::Forbidden).map_into_right_body());
            }
            let identity = match claims.identity() {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(path = req.path(), "rejected token: {e}");
                    return Ok(req.error_response(ApiError::Unauthorized).map_into_right_body());
                }
            };
            req.extensions_mut().insert(identity);
            svc.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}
