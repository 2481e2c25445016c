use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use futures::future::{Ready, ok};

use common::{
    env_config::Config,
    error::{AppError, Res},
    jwt::{self, JwtClaims},
    key::KeyClaims,
};

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Decodes credentials without enforcing them. A bearer token lands in the
/// request extensions as `Res<JwtClaims>`, an `X-API-KEY` header as
/// `Res<KeyClaims>`; the auth and key middlewares decide what to reject.
pub struct ExtractionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = bearer_token(&req);
        let api_key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let secret = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| config.jwt_config.secret.clone());
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            if let Some(token) = token {
                let claims_res = match &secret {
                    Some(secret) => jwt::validate_jwt(&token, secret),
                    None => Err(AppError::Internal("JWT config not available".to_string())),
                };
                req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
            }
            if let Some(key) = api_key {
                req.extensions_mut()
                    .insert::<Res<KeyClaims>>(KeyClaims::from_key(&key));
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpRequest, HttpResponse, http::StatusCode, test};
    use uuid::Uuid;

    use super::*;

    async fn seen(req: HttpRequest) -> HttpResponse {
        let ext = req.extensions();
        let body = format!(
            "jwt={} key={}",
            ext.get::<Res<JwtClaims>>().is_some(),
            ext.get::<Res<KeyClaims>>()
                .map(|r| r.is_ok())
                .unwrap_or(false),
        );
        HttpResponse::Ok().body(body)
    }

    #[actix_web::test]
    async fn api_key_header_is_decoded() {
        let app = test::init_service(
            App::new()
                .wrap(ExtractionMiddleware)
                .route("/", web::get().to(seen)),
        )
        .await;
        let key = KeyClaims::new(Uuid::new_v4(), Uuid::new_v4()).to_key().unwrap();

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((API_KEY_HEADER, key))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "jwt=false key=true");
    }

    #[actix_web::test]
    async fn bearer_without_config_still_records_a_failure() {
        let app = test::init_service(
            App::new()
                .wrap(ExtractionMiddleware)
                .route("/", web::get().to(seen)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", "Bearer abc"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(test::read_body(res).await, "jwt=true key=false");
    }
}
