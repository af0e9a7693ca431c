use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::api_error::ApiError;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::models::billing::{CheckoutSessionIn, SimulateSubscriptionIn};
use crate::service::{billing_provider, billing_service};

pub async fn billing_me(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let out = billing_service::get_billing_summary(&pool, &config, user.0).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn create_checkout_session(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    payload: web::Json<CheckoutSessionIn>,
) -> Result<HttpResponse, ApiError> {
    let out = billing_service::create_checkout_session(&pool, &config, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn webhook(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    provider: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let provider = provider.into_inner();

    if config.billing_require_webhook_signature {
        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string())))
            .collect();
        if !billing_provider::verify_provider_webhook_request(&config, &provider, &headers, &body) {
            return Err(ApiError::unauthenticated("invalid_webhook_signature"));
        }
    }

    let raw_payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::validation("invalid_json", "webhook body is not valid JSON"))?;
    let normalized = billing_provider::normalize_provider_webhook_payload(&provider, &raw_payload)?;

    let out = billing_service::ingest_webhook_event(&pool, &config, &provider, normalized).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn simulate_subscription(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    user: AuthUser,
    payload: web::Json<SimulateSubscriptionIn>,
) -> Result<HttpResponse, ApiError> {
    if !config.is_dev() {
        return Err(ApiError::forbidden("dev_only", "subscription simulation is only available in dev"));
    }
    let plan_code = billing_service::simulate_subscription(&pool, &config, user.0, &payload).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "plan_code": plan_code })))
}

pub async fn validate_app_store_receipt(
    config: web::Data<Config>,
    payload: web::Json<crate::models::billing::StoreReceiptIn>,
) -> Result<HttpResponse, ApiError> {
    let out = billing_provider::validate_app_store_receipt(&config, &payload.receipt_data, "production").await?;
    Ok(HttpResponse::Ok().json(out))
}

pub async fn validate_google_play_purchase(
    config: web::Data<Config>,
    payload: web::Json<crate::models::billing::GooglePlayPurchaseIn>,
) -> Result<HttpResponse, ApiError> {
    let out = billing_provider::validate_google_play_purchase(&config, &payload.purchase_token, Some(&payload.subscription_id)).await?;
    Ok(HttpResponse::Ok().json(out))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/billing")
            .route("/me", web::get().to(billing_me))
            .route("/checkout-session", web::post().to(create_checkout_session))
            .route("/webhooks/{provider}", web::post().to(webhook))
            .route("/simulate-subscription", web::post().to(simulate_subscription))
            .route("/store/app-store/validate", web::post().to(validate_app_store_receipt))
            .route("/store/google-play/validate", web::post().to(validate_google_play_purchase)),
    );
}
