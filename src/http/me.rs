use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::models::profile::UpdateProfileIn;
use crate::service::profile_service;

pub async fn me(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let out = profile_service::me(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn update_profile(
    pool: web::Data<DbPool>,
    user: AuthUser,
    payload: web::Json<UpdateProfileIn>,
) -> Result<HttpResponse, ApiError> {
    let out = profile_service::update_profile(&pool, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn play_eligibility(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let out = profile_service::play_eligibility(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn ladder_states(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let out = profile_service::my_ladder_states(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

#[derive(Debug, Deserialize)]
pub struct MyMatchesQuery {
    pub ladder: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn my_matches(
    pool: web::Data<DbPool>,
    user: AuthUser,
    query: web::Query<MyMatchesQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 50);
    let offset = query.offset.unwrap_or(0).max(0);
    let out = profile_service::my_matches(&pool, user.0, query.ladder.as_deref(), query.status.as_deref(), limit, offset).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/me")
            .route("", web::get().to(me))
            .route("/profile", web::patch().to(update_profile))
            .route("/play-eligibility", web::get().to(play_eligibility))
            .route("/ladder-states", web::get().to(ladder_states))
            .route("/matches", web::get().to(my_matches)),
    );
}
