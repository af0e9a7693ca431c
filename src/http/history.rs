use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::service::history_service::{self, TimelineScope};

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub scope: Option<String>,
}

pub async fn timeline(
    pool: web::Data<DbPool>,
    user: AuthUser,
    target_user: web::Path<Uuid>,
    query: web::Query<TimelineQuery>,
) -> Result<HttpResponse, ApiError> {
    let scope = TimelineScope::parse(query.scope.as_deref().unwrap_or("verified"))?;
    let out = history_service::timeline(&pool, user.0, target_user.into_inner(), scope).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn detail(
    pool: web::Data<DbPool>,
    user: AuthUser,
    match_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let out = history_service::detail(&pool, user.0, match_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/history")
            .route("/{target_user}", web::get().to(timeline))
            .route("/match/{match_id}", web::get().to(detail)),
    );
}
