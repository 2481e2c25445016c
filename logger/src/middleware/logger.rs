use std::{rc::Rc, sync::Arc, time::Instant};

use actix_web::{
    Error, HttpMessage,
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, StatusCode},
    web,
};
use colored::{ColoredString, Colorize};
use common::{env_config::Config, jwt::JwtClaims, key::KeyClaims};
use futures::future::{LocalBoxFuture, Ready, ready};
use log::info;
use uuid::Uuid;

/// Logs one line per request once the response is ready:
/// status, method, path, elapsed time and the caller if authenticated.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_string();
        let enabled = req
            .app_data::<web::Data<Arc<Config>>>()
            .is_none_or(|config| config.console_logging_enabled);
        let started = Instant::now();
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            let res = srv.call(req).await?;

            if enabled {
                let user_id = caller(&res);
                info!(
                    "[{}] {} {} {} user_id={}",
                    colored_status(res.status()),
                    colored_method(&method),
                    path.bright_white(),
                    format!("({}ms)", started.elapsed().as_millis()).bright_black(),
                    user_id
                        .map_or("None".to_string(), |id| id.to_string())
                        .bright_blue(),
                );
            }

            Ok(res.map_into_boxed_body())
        })
    }
}

/// User behind the request, from whichever credential the auth layers
/// accepted.
fn caller<B>(res: &ServiceResponse<B>) -> Option<Uuid> {
    let ext = res.request().extensions();
    ext.get::<JwtClaims>()
        .map(|c| c.user_id)
        .or_else(|| ext.get::<KeyClaims>().map(|c| c.user_id))
}

fn colored_status(status: StatusCode) -> ColoredString {
    let code = status.as_u16().to_string();
    match status.as_u16() {
        200..=299 => code.green(),
        300..=399 => code.yellow(),
        400..=499 => code.bright_red(),
        _ => code.red(),
    }
}

fn colored_method(method: &Method) -> ColoredString {
    let name = method.as_str();
    match *method {
        Method::GET => name.blue(),
        Method::POST => name.yellow(),
        Method::PUT => name.purple(),
        Method::DELETE => name.red(),
        _ => name.normal(),
    }
}
