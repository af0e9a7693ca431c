use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::service::analytics_service;

#[derive(Debug, Deserialize)]
pub struct LadderFilterQuery {
    pub ladder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub ladder: String,
}

pub async fn me(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<LadderFilterQuery>,
) -> Result<HttpResponse, ApiError> {
    let out = analytics_service::list_states(&pool, user.0, query.ladder.as_deref()).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn me_dashboard(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, ApiError> {
    let out = analytics_service::dashboard(&pool, user.0, &query.ladder).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn user_public(
    pool: web::Data<DbPool>,
    user: AuthUser,
    target_user: web::Path<Uuid>,
    query: web::Query<LadderFilterQuery>,
) -> Result<HttpResponse, ApiError> {
    let out =
        analytics_service::list_states_public(&pool, user.0, target_user.into_inner(), query.ladder.as_deref()).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/analytics")
            .route("/me", web::get().to(me))
            .route("/me/dashboard", web::get().to(me_dashboard))
            .route("/users/{user_id}", web::get().to(user_public)),
    );
}
