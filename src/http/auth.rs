use actix_web::{web, HttpResponse, Result};

use crate::api_error::ApiError;
use crate::config::Config;
use crate::db::DbPool;
use crate::models::user::{
    ContactChangeConfirmIn, ContactChangeRequestIn, LoginIn, LogoutIn, OtpRequestIn, PasswordResetConfirmIn,
    PasswordResetRequestIn, RefreshIn, RegisterCompleteIn,
};
use crate::auth::AuthUser;
use crate::service::auth_service;

pub async fn otp_request(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<OtpRequestIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::otp_request(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn register_complete(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<RegisterCompleteIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::register_complete(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn login(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<LoginIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::login(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn refresh(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<RefreshIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::refresh(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn logout(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<LogoutIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::logout(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn password_reset_request(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<PasswordResetRequestIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::password_reset_request(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn password_reset_confirm(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<PasswordResetConfirmIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::password_reset_confirm(&pool, &config, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn contact_change_request(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    payload: web::Json<ContactChangeRequestIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::contact_change_request(&pool, &config, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn contact_change_confirm(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    payload: web::Json<ContactChangeConfirmIn>,
) -> Result<HttpResponse, ApiError> {
    let out = auth_service::contact_change_confirm(&pool, &config, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/otp", web::post().to(otp_request))
            .route("/register/complete", web::post().to(register_complete))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))
            .route("/password-reset/request", web::post().to(password_reset_request))
            .route("/password-reset/confirm", web::post().to(password_reset_confirm))
            .route("/contact-change/request", web::post().to(contact_change_request))
            .route("/contact-change/confirm", web::post().to(contact_change_confirm)),
    );
}
