//! Subscription lifecycle, webhook ingestion and checkout-session issuance.
//! Grounded on `app/services/billing.py`.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::config::Config;
use crate::models::billing::{BillingMeOut, BillingSubscription, CheckoutSessionIn, CheckoutSessionOut, SimulateSubscriptionIn, WebhookIngestOut};
use crate::security::now_utc;
use crate::service::audit::audit;
use crate::service::billing_provider::{get_provider_adapter, CheckoutSessionRequest};

const VALID_PROVIDERS: [&str; 5] = ["none", "stripe", "app_store", "google_play", "manual"];
const VALID_SUBSCRIPTION_STATUS: [&str; 7] =
    ["trialing", "active", "past_due", "canceled", "incomplete", "incomplete_expired", "unpaid"];
const VALID_PLAN_CODES: [&str; 2] = ["FREE", "RIVIO_PLUS"];
const ENTITLES_PLUS_STATUSES: [&str; 3] = ["trialing", "active", "past_due"];

pub fn current_provider_code(config: &Config) -> String {
    let code = config.billing_provider.trim().to_lowercase();
    if VALID_PROVIDERS.contains(&code.as_str()) {
        code
    } else {
        "none".to_string()
    }
}

fn normalize_provider(provider: &str) -> ApiResult<String> {
    let raw = provider.trim().to_lowercase();
    if VALID_PROVIDERS.contains(&raw.as_str()) {
        Ok(raw)
    } else {
        Err(ApiError::validation("invalid_provider", "provider invalido"))
    }
}

fn normalize_plan_code(plan_code: &str) -> ApiResult<String> {
    let raw = if plan_code.trim().is_empty() { "FREE".to_string() } else { plan_code.trim().to_uppercase() };
    if VALID_PLAN_CODES.contains(&raw.as_str()) {
        Ok(raw)
    } else {
        Err(ApiError::validation("invalid_plan_code", "plan_code invalido"))
    }
}

fn normalize_status(status: &str) -> ApiResult<String> {
    let raw = if status.trim().is_empty() { "incomplete".to_string() } else { status.trim().to_lowercase() };
    if VALID_SUBSCRIPTION_STATUS.contains(&raw.as_str()) {
        Ok(raw)
    } else {
        Err(ApiError::validation("invalid_status", "status de suscripcion invalido"))
    }
}

fn entitlement_from_subscription(
    config: &Config,
    plan_code: &str,
    status: &str,
    current_period_end: Option<DateTime<Utc>>,
) -> (&'static str, bool, Option<DateTime<Utc>>) {
    if plan_code == config.billing_plus_plan_code && ENTITLES_PLUS_STATUSES.contains(&status) {
        ("RIVIO_PLUS", false, current_period_end)
    } else {
        ("FREE", true, None)
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn apply_subscription_state(
    pool: &PgPool,
    config: &Config,
    user_id: Uuid,
    provider: &str,
    provider_customer_id: Option<&str>,
    provider_subscription_id: &str,
    plan_code: &str,
    status: &str,
    cancel_at_period_end: bool,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    payload: &Value,
) -> ApiResult<String> {
    let provider = normalize_provider(provider)?;
    let plan = normalize_plan_code(plan_code)?;
    let status = normalize_status(status)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO billing_customers (user_id, provider, provider_customer_id) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE SET provider=$2, provider_customer_id=$3, updated_at=now()",
    )
    .bind(user_id)
    .bind(&provider)
    .bind(provider_customer_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO billing_subscriptions \
         (user_id, provider, provider_subscription_id, plan_code, status, cancel_at_period_end, \
          current_period_start, current_period_end, started_at, canceled_at, raw_payload) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), CASE WHEN $5 = 'canceled' THEN now() ELSE NULL END, $9) \
         ON CONFLICT (provider, provider_subscription_id) DO UPDATE SET \
         user_id=$1, plan_code=$4, status=$5, cancel_at_period_end=$6, current_period_start=$7, current_period_end=$8, \
         canceled_at=CASE WHEN $5='canceled' THEN now() ELSE billing_subscriptions.canceled_at END, \
         raw_payload=$9, updated_at=now()",
    )
    .bind(user_id)
    .bind(&provider)
    .bind(provider_subscription_id)
    .bind(&plan)
    .bind(&status)
    .bind(cancel_at_period_end)
    .bind(current_period_start)
    .bind(current_period_end)
    .bind(payload)
    .execute(&mut *tx)
    .await?;

    let (ent_plan, ads_enabled, expires_at) = entitlement_from_subscription(config, &plan, &status, current_period_end);
    sqlx::query(
        "INSERT INTO user_entitlements (user_id, plan_code, ads_enabled, activated_at, expires_at) \
         VALUES ($1, $2, $3, now(), $4) \
         ON CONFLICT (user_id) DO UPDATE SET \
         plan_code=$2, ads_enabled=$3, \
         activated_at=CASE WHEN user_entitlements.plan_code <> $2 THEN now() ELSE user_entitlements.activated_at END, \
         expires_at=$4, updated_at=now()",
    )
    .bind(user_id)
    .bind(ent_plan)
    .bind(ads_enabled)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ent_plan.to_string())
}

pub async fn create_checkout_session(
    pool: &PgPool,
    config: &Config,
    user_id: Uuid,
    payload: &CheckoutSessionIn,
) -> ApiResult<CheckoutSessionOut> {
    let provider = current_provider_code(config);

    if provider == "none" {
        let expires_at = now_utc() + Duration::minutes(30);
        let provider_checkout_id = format!("stub_{}", Uuid::new_v4().simple());
        let row = sqlx::query(
            "INSERT INTO billing_checkout_sessions \
             (user_id, provider, plan_code, status, provider_checkout_id, checkout_url, success_url, cancel_url, expires_at) \
             VALUES ($1, $2, $3, 'created', $4, NULL, $5, $6, $7) RETURNING id, status, expires_at",
        )
        .bind(user_id)
        .bind(&provider)
        .bind(&payload.plan_code)
        .bind(&provider_checkout_id)
        .bind(&payload.success_url)
        .bind(&payload.cancel_url)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        return Ok(CheckoutSessionOut {
            session_id: row.get("id"),
            provider,
            plan_code: payload.plan_code.clone(),
            status: row.get("status"),
            checkout_url: None,
            is_stub: true,
            detail: "Billing provider no configurado. Checkout en modo stub.".to_string(),
            expires_at: row.get("expires_at"),
        });
    }

    let adapter = get_provider_adapter(&provider);
    let request = CheckoutSessionRequest {
        user_id,
        plan_code: payload.plan_code.clone(),
        success_url: payload.success_url.clone(),
        cancel_url: payload.cancel_url.clone(),
    };
    let response = adapter.create_checkout_session(config, &request).await?;

    let row = sqlx::query(
        "INSERT INTO billing_checkout_sessions \
         (user_id, provider, plan_code, status, provider_checkout_id, checkout_url, success_url, cancel_url, expires_at) \
         VALUES ($1, $2, $3, 'created', $4, $5, $6, $7, $8) RETURNING id, status, expires_at",
    )
    .bind(user_id)
    .bind(&response.provider)
    .bind(&payload.plan_code)
    .bind(&response.provider_checkout_id)
    .bind(&response.checkout_url)
    .bind(&payload.success_url)
    .bind(&payload.cancel_url)
    .bind(response.expires_at)
    .fetch_one(pool)
    .await?;

    Ok(CheckoutSessionOut {
        session_id: row.get("id"),
        provider: response.provider,
        plan_code: payload.plan_code.clone(),
        status: row.get("status"),
        checkout_url: response.checkout_url,
        is_stub: false,
        detail: "Checkout creado".to_string(),
        expires_at: row.get("expires_at"),
    })
}

struct ExtractedSubscriptionData {
    user_id: Option<Uuid>,
    provider_customer_id: Option<String>,
    provider_subscription_id: String,
    plan_code: String,
    status: String,
    cancel_at_period_end: bool,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
}

fn extract_user_subscription_data(payload: &Value) -> ExtractedSubscriptionData {
    let data = payload.get("data").cloned().unwrap_or(Value::Null);
    let user_id = data.get("user_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok());
    let provider_customer_id = data.get("provider_customer_id").and_then(|v| v.as_str()).map(|s| s.to_string());
    let provider_subscription_id = data.get("provider_subscription_id").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let plan_code = data.get("plan_code").and_then(|v| v.as_str()).unwrap_or("FREE").to_string();
    let status = data.get("status").and_then(|v| v.as_str()).unwrap_or("incomplete").to_string();
    let cancel_at_period_end = data.get("cancel_at_period_end").and_then(|v| v.as_bool()).unwrap_or(false);
    let current_period_start = data
        .get("current_period_start")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    let current_period_end = data
        .get("current_period_end")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    ExtractedSubscriptionData {
        user_id,
        provider_customer_id,
        provider_subscription_id,
        plan_code,
        status,
        cancel_at_period_end,
        current_period_start,
        current_period_end,
    }
}

const PROCESS_AS_RENEWAL: [&str; 4] = ["subscription.created", "subscription.updated", "subscription.renewed", "invoice.paid"];
const PROCESS_AS_CANCELLATION: [&str; 3] = ["subscription.deleted", "subscription.canceled", "invoice.payment_failed"];

pub async fn ingest_webhook_event(pool: &PgPool, config: &Config, provider: &str, payload: Value) -> ApiResult<WebhookIngestOut> {
    let provider_norm = normalize_provider(provider)?;
    let event_id = payload.get("id").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
    let event_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
    if event_id.is_empty() || event_type.is_empty() {
        return Err(ApiError::validation("invalid_webhook_event", "Evento de webhook invalido"));
    }

    let extracted = extract_user_subscription_data(&payload);

    let inserted = sqlx::query(
        "INSERT INTO billing_webhook_events (provider, event_id, event_type, user_id, payload, status) \
         VALUES ($1, $2, $3, $4, $5, 'received') ON CONFLICT (provider, event_id) DO NOTHING RETURNING id",
    )
    .bind(&provider_norm)
    .bind(&event_id)
    .bind(&event_type)
    .bind(extracted.user_id)
    .bind(&payload)
    .fetch_optional(pool)
    .await?;

    let Some(inserted) = inserted else {
        let row = sqlx::query("SELECT status FROM billing_webhook_events WHERE provider = $1 AND event_id = $2")
            .bind(&provider_norm)
            .bind(&event_id)
            .fetch_optional(pool)
            .await?;
        let status: String = row.as_ref().map(|r| r.get::<String, _>("status")).unwrap_or_else(|| "ignored".to_string());
        return Ok(WebhookIngestOut { duplicate: true, processed: matches!(status.as_str(), "processed" | "ignored"), status });
    };

    let event_row_id: Uuid = inserted.get("id");
    let mut processed = false;
    let mut final_status = "ignored".to_string();
    let mut error_message: Option<String> = None;

    if extracted.user_id.is_none() || extracted.provider_subscription_id.is_empty() {
        final_status = "ignored".to_string();
    } else if PROCESS_AS_RENEWAL.contains(&event_type.as_str()) {
        match apply_subscription_state(
            pool,
            config,
            extracted.user_id.unwrap(),
            &provider_norm,
            extracted.provider_customer_id.as_deref(),
            &extracted.provider_subscription_id,
            &extracted.plan_code,
            &extracted.status,
            extracted.cancel_at_period_end,
            extracted.current_period_start,
            extracted.current_period_end,
            &payload,
        )
        .await
        {
            Ok(_) => {
                processed = true;
                final_status = "processed".to_string();
            }
            Err(e) => {
                final_status = "error".to_string();
                error_message = Some(e.to_string().chars().take(1000).collect());
            }
        }
    } else if PROCESS_AS_CANCELLATION.contains(&event_type.as_str()) {
        let plan_code = if extracted.plan_code.is_empty() { "FREE".to_string() } else { extracted.plan_code.clone() };
        match apply_subscription_state(
            pool,
            config,
            extracted.user_id.unwrap(),
            &provider_norm,
            extracted.provider_customer_id.as_deref(),
            &extracted.provider_subscription_id,
            &plan_code,
            "canceled",
            true,
            extracted.current_period_start,
            extracted.current_period_end,
            &payload,
        )
        .await
        {
            Ok(_) => {
                processed = true;
                final_status = "processed".to_string();
            }
            Err(e) => {
                final_status = "error".to_string();
                error_message = Some(e.to_string().chars().take(1000).collect());
            }
        }
    }

    sqlx::query("UPDATE billing_webhook_events SET status=$1, error_message=$2, processed_at=now() WHERE id=$3")
        .bind(&final_status)
        .bind(&error_message)
        .bind(event_row_id)
        .execute(pool)
        .await?;

    Ok(WebhookIngestOut { duplicate: false, processed, status: final_status })
}

pub async fn simulate_subscription(pool: &PgPool, config: &Config, actor_user_id: Uuid, payload: &SimulateSubscriptionIn) -> ApiResult<String> {
    let now = now_utc();
    let period_end = now + Duration::days(payload.period_days);
    let ent_plan = apply_subscription_state(
        pool,
        config,
        actor_user_id,
        &payload.provider,
        payload.provider_customer_id.as_deref(),
        &payload.provider_subscription_id,
        &payload.plan_code,
        &payload.status,
        payload.cancel_at_period_end,
        Some(now),
        Some(period_end),
        &serde_json::json!({"source": "simulate", "at": now.to_rfc3339()}),
    )
    .await?;

    let mut tx = pool.begin().await?;
    audit(
        &mut tx,
        Some(actor_user_id),
        "billing_subscription",
        &payload.provider_subscription_id,
        "simulated",
        serde_json::json!({
            "provider": payload.provider,
            "plan_code": payload.plan_code,
            "status": payload.status,
            "period_days": payload.period_days,
            "cancel_at_period_end": payload.cancel_at_period_end,
        }),
    )
    .await?;
    tx.commit().await?;

    Ok(ent_plan)
}

pub async fn get_billing_summary(pool: &PgPool, config: &Config, user_id: Uuid) -> ApiResult<BillingMeOut> {
    let provider_customer_id: Option<String> =
        sqlx::query_scalar::<_, Option<String>>("SELECT provider_customer_id FROM billing_customers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .flatten();

    let subscription = sqlx::query_as::<_, BillingSubscription>(
        "SELECT user_id, provider, provider_subscription_id, plan_code, status, current_period_end, \
         cancel_at_period_end, raw_payload, updated_at \
         FROM billing_subscriptions WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let entitlement_plan_code: String =
        sqlx::query_scalar("SELECT plan_code FROM user_entitlements WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or_else(|| "FREE".to_string());

    let provider = current_provider_code(config);
    Ok(BillingMeOut {
        checkout_supported: provider != "none",
        webhook_configured: config.billing_webhook_secret.is_some(),
        provider,
        provider_customer_id,
        entitlement_plan_code,
        subscription,
    })
}
