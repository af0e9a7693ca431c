//! Trusted-host guard and security response headers, the actix-native
//! equivalent of the teacher's `actix-cors` cross-cutting middleware.

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpResponse};
use futures_util::future::LocalBoxFuture;

use crate::config::Config;

pub struct SecurityHeaders {
    config: Rc<Config>,
}

impl SecurityHeaders {
    pub fn new(config: Config) -> Self {
        Self { config: Rc::new(config) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SecurityHeadersMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware { service, config: self.config.clone() }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: S,
    config: Rc<Config>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let config = self.config.clone();

        if !config.allowed_hosts.is_empty() {
            let host_ok = req
                .connection_info()
                .host()
                .split(':')
                .next()
                .map(|h| config.allowed_hosts.iter().any(|allowed| allowed == h))
                .unwrap_or(false);
            if !host_ok {
                let (req, _) = req.into_parts();
                let response = HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "Forbidden",
                    "reason": "untrusted_host",
                    "detail": "host not in ALLOWED_HOSTS",
                }));
                return Box::pin(async move { Ok(ServiceResponse::new(req, response).map_into_right_body()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?.map_into_left_body();
            if config.security_headers_enabled {
                let headers = res.headers_mut();
                headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
                headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
                headers.insert(HeaderName::from_static("referrer-policy"), HeaderValue::from_static("no-referrer"));
                headers.insert(
                    HeaderName::from_static("permissions-policy"),
                    HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
                );
                headers.insert(HeaderName::from_static("content-security-policy"), HeaderValue::from_static("default-src 'none'"));
                if !config.is_dev() {
                    headers.insert(
                        HeaderName::from_static("strict-transport-security"),
                        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
                    );
                }
            }
            Ok(res)
        })
    }
}
