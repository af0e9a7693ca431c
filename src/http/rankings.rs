use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::service::ranking_service;

#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub ladder: String,
    pub category_id: Uuid,
    pub country: Option<String>,
    pub city: Option<String>,
}

pub async fn rankings(
    pool: web::Data<DbPool>,
    _user: AuthUser,
    query: web::Query<RankingsQuery>,
) -> Result<HttpResponse, ApiError> {
    let out = ranking_service::rankings(&pool, &query.ladder, query.category_id, query.country.as_deref(), query.city.as_deref()).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/rankings").route("", web::get().to(rankings)));
}
