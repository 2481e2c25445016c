use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use common::{
    error::{AppError, Res},
    key::{self, KeyClaims},
    misc::verify_hash,
};
use futures::future::{Ready, ok};
use sqlx::PgPool;

/// Authenticates `/v1` calls by API key. The key must exist, match its
/// stored hash and still be active; its `KeyClaims` are then handed to the
/// route as `web::ReqData`.
pub struct KeyMiddleware;

impl<S, B> Transform<S, ServiceRequest> for KeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = KeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(KeyMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct KeyMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for KeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            let claims = match key::get_key_claims_or_error(&req) {
                Ok(claims) => claims,
                Err(response) => return Ok(req.into_response(response)),
            };
            let Some(pool) = req.app_data::<web::Data<Arc<PgPool>>>().cloned() else {
                return Ok(req.error_response(AppError::Internal(
                    "Database pool not configured".to_string(),
                )));
            };

            if let Err(e) = check_key(&pool, &claims).await {
                log::warn!("Rejected API key {}: {}", claims.key_id, e);
                return Ok(req.error_response(e));
            }

            req.extensions_mut().insert(claims);
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

async fn check_key(pool: &PgPool, claims: &KeyClaims) -> Res<()> {
    let record = db::key::get_key_by_id(pool, &claims.key_id)
        .await?
        .filter(|record| record.user_id == claims.user_id)
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

    if !verify_hash(&claims.secret, &record.key_hashed) {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }
    if !record.is_active() {
        return Err(AppError::Forbidden("API key has been revoked".to_string()));
    }

    db::key::touch_last_used(pool, record.id).await
}
