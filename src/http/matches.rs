use actix_web::{web, HttpResponse, Result};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::models::match_::{ConfirmIn, MatchCreateIn};
use crate::service::match_service;

#[derive(Debug, serde::Deserialize)]
pub struct DisputeIn {
    pub reason: Option<String>,
}

pub async fn create_match(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    payload: web::Json<MatchCreateIn>,
) -> Result<HttpResponse, ApiError> {
    let out = match_service::create_match(&pool, &config, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn get_match(pool: web::Data<DbPool>, _user: AuthUser, match_id: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let out = match_service::get_match(&pool, match_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn match_detail(
    pool: web::Data<DbPool>,
    user: AuthUser,
    match_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let out = match_service::match_detail(&pool, match_id.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn match_confirmations(
    pool: web::Data<DbPool>,
    user: AuthUser,
    match_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let out = match_service::match_confirmations(&pool, match_id.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn confirm_match(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    match_id: web::Path<Uuid>,
    payload: web::Json<ConfirmIn>,
) -> Result<HttpResponse, ApiError> {
    let out = match_service::confirm_match(&pool, &config, match_id.into_inner(), user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn dispute_match(
    pool: web::Data<DbPool>,
    user: AuthUser,
    match_id: web::Path<Uuid>,
    payload: web::Json<DisputeIn>,
) -> Result<HttpResponse, ApiError> {
    let out = match_service::dispute_match(&pool, match_id.into_inner(), user.0, payload.into_inner().reason).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/matches")
            .route("", web::post().to(create_match))
            .route("/{match_id}", web::get().to(get_match))
            .route("/{match_id}/detail", web::get().to(match_detail))
            .route("/{match_id}/confirmations", web::get().to(match_confirmations))
            .route("/{match_id}/confirm", web::post().to(confirm_match))
            .route("/{match_id}/dispute", web::post().to(dispute_match)),
    );
}
