use actix_web::{web, HttpResponse, Result};

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::service::entitlements_service;

pub async fn contract(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let out = entitlements_service::get_user_contract(&pool, user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn plans(pool: web::Data<DbPool>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let contract = entitlements_service::get_user_contract(&pool, user.0).await?;
    let out = entitlements_service::get_plan_catalog(&contract.current.plan_code);
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/entitlements")
            .route("", web::get().to(contract))
            .route("/plans", web::get().to(plans)),
    );
}
