//! Outbound billing provider adapters: checkout-session creation, webhook
//! signature verification, and store receipt validation. Grounded on
//! `app/services/billing_provider.py`.

use std::collections::HashMap;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

pub struct CheckoutSessionRequest {
    pub user_id: Uuid,
    pub plan_code: String,
    pub success_url: String,
    pub cancel_url: String,
}

pub struct CheckoutSessionResponse {
    pub provider: String,
    pub provider_checkout_id: String,
    pub checkout_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreValidationResponse {
    pub provider: String,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: String,
    pub product_id: String,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub raw_payload: Value,
}

#[async_trait::async_trait]
pub trait BillingProviderAdapter: Send + Sync {
    fn provider_code(&self) -> &'static str;
    async fn create_checkout_session(&self, config: &Config, request: &CheckoutSessionRequest) -> ApiResult<CheckoutSessionResponse>;
}

pub struct StripeBillingProvider;

#[async_trait::async_trait]
impl BillingProviderAdapter for StripeBillingProvider {
    fn provider_code(&self) -> &'static str {
        "stripe"
    }

    async fn create_checkout_session(&self, _config: &Config, _request: &CheckoutSessionRequest) -> ApiResult<CheckoutSessionResponse> {
        Err(ApiError::unavailable("Stripe aun no esta conectado en este entorno"))
    }
}

pub struct NoopBillingProvider;

#[async_trait::async_trait]
impl BillingProviderAdapter for NoopBillingProvider {
    fn provider_code(&self) -> &'static str {
        "none"
    }

    async fn create_checkout_session(&self, _config: &Config, _request: &CheckoutSessionRequest) -> ApiResult<CheckoutSessionResponse> {
        Err(ApiError::unavailable("No hay proveedor de billing configurado"))
    }
}

pub fn get_provider_adapter(provider_code: &str) -> Box<dyn BillingProviderAdapter> {
    match provider_code.trim().to_lowercase().as_str() {
        "stripe" => Box::new(StripeBillingProvider),
        _ => Box::new(NoopBillingProvider),
    }
}

fn parse_sig_header(signature_header: Option<&str>) -> (i64, Vec<String>) {
    let Some(header) = signature_header else { return (0, Vec::new()) };
    let mut timestamp = 0i64;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((k, v)) = part.split_once('=') else { continue };
        let key = k.trim().to_lowercase();
        let val = v.trim();
        if key == "t" {
            timestamp = val.parse().unwrap_or(0);
        } else if key == "v1" || key == "sig" {
            signatures.push(val.to_string());
        }
    }
    (timestamp, signatures)
}

fn verify_hmac_signature(raw_body: &[u8], signature_header: Option<&str>, secret: &str, max_age_seconds: i64) -> bool {
    let (timestamp, signatures) = parse_sig_header(signature_header);
    if timestamp <= 0 || signatures.is_empty() {
        return false;
    }
    let now = Utc::now().timestamp();
    if (now - timestamp).abs() > max_age_seconds {
        return false;
    }
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());
    signatures.iter().any(|s| constant_time_eq(expected.as_bytes(), s.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub fn verify_provider_webhook_request(config: &Config, provider: &str, headers: &HashMap<String, String>, raw_body: &[u8]) -> bool {
    let provider_code = provider.trim().to_lowercase();
    let require_signature = config.billing_require_webhook_signature;
    let max_age = config.billing_webhook_max_age_seconds;

    if provider_code == "stripe" {
        let secret = config.billing_webhook_stripe_secret.clone().or_else(|| config.billing_webhook_secret.clone());
        let Some(secret) = secret else { return !require_signature };
        let sig = headers.get("stripe-signature").map(|s| s.as_str());
        return verify_hmac_signature(raw_body, sig, &secret, max_age);
    }

    let secret = match provider_code.as_str() {
        "app_store" => config.billing_webhook_app_store_secret.clone(),
        "google_play" => config.billing_webhook_google_play_secret.clone(),
        _ => config.billing_webhook_secret.clone(),
    }
    .or_else(|| config.billing_webhook_secret.clone());
    let Some(secret) = secret else { return !require_signature };
    let sig = headers.get("x-billing-signature").map(|s| s.as_str());
    verify_hmac_signature(raw_body, sig, &secret, max_age)
}

fn epoch_ms_to_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let ms: i64 = match value {
        Some(Value::String(s)) => s.parse().ok()?,
        Some(Value::Number(n)) => n.as_i64()?,
        _ => return None,
    };
    if ms == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_iso_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    let normalized = if let Some(stripped) = raw.strip_suffix('Z') { format!("{stripped}+00:00") } else { raw.to_string() };
    DateTime::parse_from_rfc3339(&normalized).ok().map(|d| d.with_timezone(&Utc))
}

pub async fn validate_app_store_receipt(config: &Config, receipt_data: &str, environment: &str) -> ApiResult<StoreValidationResponse> {
    let shared_secret = config
        .app_store_shared_secret
        .clone()
        .ok_or_else(|| ApiError::unavailable("Configura APP_STORE_SHARED_SECRET para validar recibos de App Store"))?;

    let env = environment.trim().to_lowercase();
    if !["auto", "production", "sandbox"].contains(&env.as_str()) {
        return Err(ApiError::validation("invalid_environment", "environment invalido (usa auto|production|sandbox)"));
    }

    let payload = serde_json::json!({
        "receipt-data": receipt_data,
        "password": shared_secret,
        "exclude-old-transactions": true,
    });

    let client = reqwest::Client::new();
    let mut response: Value = if env == "sandbox" {
        client.post(&config.app_store_verify_url_sandbox).json(&payload).send().await.map_err(|e| ApiError::unavailable(e.to_string()))?.json().await.map_err(|e| ApiError::unavailable(e.to_string()))?
    } else {
        let first: Value = client
            .post(&config.app_store_verify_url_prod)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| ApiError::unavailable(e.to_string()))?;
        if env == "auto" && first.get("status").and_then(|v| v.as_i64()).unwrap_or(-1) == 21007 {
            client
                .post(&config.app_store_verify_url_sandbox)
                .json(&payload)
                .send()
                .await
                .map_err(|e| ApiError::unavailable(e.to_string()))?
                .json()
                .await
                .map_err(|e| ApiError::unavailable(e.to_string()))?
        } else {
            first
        }
    };

    let status_code = response.get("status").and_then(|v| v.as_i64()).unwrap_or(-1);
    if status_code != 0 {
        return Err(ApiError::validation("app_store_receipt_rejected", format!("App Store verifyReceipt rechazo el recibo (status={status_code})")));
    }

    let mut latest_info = response.get("latest_receipt_info").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    if latest_info.is_empty() {
        latest_info = response
            .get("receipt")
            .and_then(|r| r.get("in_app"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
    }
    if latest_info.is_empty() {
        return Err(ApiError::validation("app_store_no_transactions", "No se encontraron transacciones de suscripcion en el recibo"));
    }

    let ms_of = |item: &Value, key: &str| -> i64 { item.get(key).and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_i64())).unwrap_or(0) };
    let latest = latest_info
        .iter()
        .max_by_key(|item| (ms_of(item, "expires_date_ms"), ms_of(item, "purchase_date_ms")))
        .cloned()
        .unwrap();

    let product_id = latest.get("product_id").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
    if product_id.is_empty() {
        return Err(ApiError::validation("app_store_missing_product_id", "No se pudo resolver product_id en App Store"));
    }

    let subscription_id = latest
        .get("original_transaction_id")
        .and_then(|v| v.as_str())
        .or_else(|| latest.get("transaction_id").and_then(|v| v.as_str()))
        .unwrap_or("")
        .trim()
        .to_string();
    if subscription_id.is_empty() {
        return Err(ApiError::validation("app_store_missing_subscription_id", "No se pudo resolver original_transaction_id en App Store"));
    }

    let period_start = epoch_ms_to_datetime(latest.get("purchase_date_ms"));
    let period_end = epoch_ms_to_datetime(latest.get("expires_date_ms"));
    let cancellation = latest.get("cancellation_date").is_some();
    let now = Utc::now();

    let normalized_status = if cancellation {
        "canceled"
    } else if period_end.map(|d| d > now).unwrap_or(false) {
        "active"
    } else {
        "canceled"
    };

    let provider_customer_id = latest
        .get("app_account_token")
        .and_then(|v| v.as_str())
        .or_else(|| latest.get("web_order_line_item_id").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let latest_receipt = response.get("latest_receipt").cloned().unwrap_or_else(|| Value::String(receipt_data.to_string()));
    let raw_payload = serde_json::json!({
        "source": "app_store_verify_receipt",
        "environment": env,
        "status": status_code,
        "latest_receipt": latest_receipt,
        "latest_receipt_info": latest,
    });
    let _ = response.take();

    Ok(StoreValidationResponse {
        provider: "app_store".to_string(),
        provider_customer_id,
        provider_subscription_id: subscription_id,
        product_id,
        status: normalized_status.to_string(),
        cancel_at_period_end: normalized_status == "canceled",
        current_period_start: period_start,
        current_period_end: period_end,
        raw_payload,
    })
}

async fn google_access_token(config: &Config) -> ApiResult<String> {
    let email = config
        .google_play_service_account_email
        .clone()
        .ok_or_else(|| ApiError::unavailable("Configura GOOGLE_PLAY_SERVICE_ACCOUNT_EMAIL"))?;
    let private_key = config
        .google_play_service_account_private_key_pem
        .clone()
        .ok_or_else(|| ApiError::unavailable("Configura GOOGLE_PLAY_SERVICE_ACCOUNT_PRIVATE_KEY_PEM"))?;

    let pem = private_key.replace("\\n", "\n");
    let now = Utc::now().timestamp();

    #[derive(serde::Serialize)]
    struct Claims<'a> {
        iss: &'a str,
        scope: &'a str,
        aud: &'a str,
        iat: i64,
        exp: i64,
    }
    let claims = Claims { iss: &email, scope: &config.google_play_android_publisher_scope, aud: &config.google_play_token_uri, iat: now, exp: now + 3600 };

    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| ApiError::internal(e.to_string()))?;
    let assertion = jsonwebtoken::encode(&jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let client = reqwest::Client::new();
    let mut form = HashMap::new();
    form.insert("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer");
    form.insert("assertion", assertion.as_str());
    let token_payload: Value = client
        .post(&config.google_play_token_uri)
        .form(&form)
        .send()
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?
        .json()
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?;

    token_payload
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::unavailable("No se pudo obtener access_token para Google Play"))
}

fn google_state_to_status(state: Option<&str>) -> &'static str {
    match state.unwrap_or("").trim().to_uppercase().as_str() {
        "SUBSCRIPTION_STATE_ACTIVE" => "active",
        "SUBSCRIPTION_STATE_IN_GRACE_PERIOD" | "SUBSCRIPTION_STATE_ON_HOLD" | "SUBSCRIPTION_STATE_PAUSED" => "past_due",
        "SUBSCRIPTION_STATE_PENDING" => "incomplete",
        "SUBSCRIPTION_STATE_CANCELED" | "SUBSCRIPTION_STATE_EXPIRED" => "canceled",
        _ => "incomplete",
    }
}

pub async fn validate_google_play_purchase(config: &Config, purchase_token: &str, package_name: Option<&str>) -> ApiResult<StoreValidationResponse> {
    let pkg = package_name
        .map(|s| s.to_string())
        .or_else(|| config.google_play_package_name.clone())
        .ok_or_else(|| ApiError::unavailable("Configura GOOGLE_PLAY_PACKAGE_NAME para validar suscripciones Google Play"))?;

    let access_token = google_access_token(config).await?;
    let url = format!(
        "https://androidpublisher.googleapis.com/androidpublisher/v3/applications/{}/purchases/subscriptionsv2/tokens/{}",
        urlencoding(&pkg),
        urlencoding(purchase_token),
    );

    let client = reqwest::Client::new();
    let response: Value = client
        .get(&url)
        .bearer_auth(access_token)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?
        .json()
        .await
        .map_err(|e| ApiError::unavailable(e.to_string()))?;

    let line_items = response.get("lineItems").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    if line_items.is_empty() {
        return Err(ApiError::validation("google_play_no_line_items", "Google Play no devolvio lineItems para la compra"));
    }

    let expiry_of = |item: &Value| parse_iso_datetime(item.get("expiryTime").and_then(|v| v.as_str()));
    let latest_item = line_items.iter().max_by_key(|item| expiry_of(item).unwrap_or_else(|| Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())).cloned().unwrap();

    let product_id = latest_item.get("productId").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
    if product_id.is_empty() {
        return Err(ApiError::validation("google_play_missing_product_id", "Google Play no devolvio productId"));
    }

    let period_start = parse_iso_datetime(latest_item.get("startTime").and_then(|v| v.as_str()));
    let period_end = parse_iso_datetime(latest_item.get("expiryTime").and_then(|v| v.as_str()));
    let status = google_state_to_status(response.get("subscriptionState").and_then(|v| v.as_str()));
    let provider_subscription_id = response.get("latestOrderId").and_then(|v| v.as_str()).unwrap_or(purchase_token).trim().to_string();

    let external_ids = response.get("externalAccountIdentifiers").cloned().unwrap_or(Value::Null);
    let provider_customer_id = external_ids
        .get("obfuscatedExternalAccountId")
        .and_then(|v| v.as_str())
        .or_else(|| external_ids.get("obfuscatedExternalProfileId").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let cancel_at_period_end = response.get("canceledStateContext").is_some() || status == "canceled";

    Ok(StoreValidationResponse {
        provider: "google_play".to_string(),
        provider_customer_id,
        provider_subscription_id,
        product_id,
        status: status.to_string(),
        cancel_at_period_end,
        current_period_start: period_start,
        current_period_end: period_end,
        raw_payload: serde_json::json!({
            "source": "google_play_subscriptions_v2",
            "package_name": pkg,
            "purchase_token": purchase_token,
            "response": response,
        }),
    })
}

fn urlencoding(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn decode_jws_unverified(token: Option<&str>) -> Value {
    let Some(token) = token else { return Value::Null };
    let Some(middle) = token.split('.').nth(1) else { return Value::Null };
    let Ok(decoded) = URL_SAFE_NO_PAD.decode(middle) else { return Value::Null };
    serde_json::from_slice(&decoded).unwrap_or(Value::Null)
}

fn to_iso_from_ms(value: Option<&Value>) -> Option<String> {
    epoch_ms_to_datetime(value).map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn google_notification_type_to_status(notification_type: i64) -> &'static str {
    let raw = match notification_type {
        1 | 2 | 4 | 6 | 9 => "active",
        3 => "canceled",
        5 => "past_due",
        7 | 8 => "canceled",
        10 | 11 => "paused",
        12 | 13 => "revoked",
        _ => "incomplete",
    };
    match raw {
        "paused" => "past_due",
        "revoked" | "expired" => "canceled",
        other => other,
    }
}

/// Reduces a raw provider-specific webhook body to the `{id, type, data}`
/// shape `ingest_webhook_event` expects, grounded on
/// `normalize_provider_webhook_payload`.
pub fn normalize_provider_webhook_payload(provider: &str, payload: &Value) -> ApiResult<Value> {
    let code = provider.trim().to_lowercase();

    if let (Some(id), Some(kind)) = (payload.get("id"), payload.get("type")) {
        return Ok(serde_json::json!({
            "id": id.as_str().unwrap_or_default(),
            "type": kind.as_str().unwrap_or_default(),
            "data": payload.get("data").cloned().unwrap_or(serde_json::json!({})),
        }));
    }

    if code == "app_store" {
        let signed_payload = payload.get("signedPayload").and_then(|v| v.as_str());
        let claims = decode_jws_unverified(signed_payload);
        let notif_uuid = claims
            .get("notificationUUID")
            .and_then(|v| v.as_str())
            .or_else(|| payload.get("notificationUUID").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("app_store_{}", Utc::now().timestamp()));
        let notif_type = claims.get("notificationType").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        let subtype = claims.get("subtype").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let data_claim = claims.get("data").cloned().unwrap_or(Value::Null);
        let signed_tx = data_claim.get("signedTransactionInfo").and_then(|v| v.as_str());
        let tx_claims = decode_jws_unverified(signed_tx);

        let product_id = tx_claims.get("productId").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let original_tx_id = tx_claims
            .get("originalTransactionId")
            .and_then(|v| v.as_str())
            .or_else(|| tx_claims.get("transactionId").and_then(|v| v.as_str()))
            .unwrap_or("")
            .to_string();
        let app_account_token = tx_claims.get("appAccountToken").and_then(|v| v.as_str());
        let expires_at = to_iso_from_ms(tx_claims.get("expiresDate"));
        let purchase_at = to_iso_from_ms(tx_claims.get("purchaseDate"));

        let status = match notif_type.to_uppercase().as_str() {
            "SUBSCRIBED" | "DID_RENEW" | "DID_RECOVER" => "active",
            "DID_FAIL_TO_RENEW" => "past_due",
            "EXPIRED" | "REFUND" | "REVOKE" | "GRACE_PERIOD_EXPIRED" => "canceled",
            _ => "incomplete",
        };

        return Ok(serde_json::json!({
            "id": notif_uuid,
            "type": format!("app_store.{}", notif_type.to_lowercase()),
            "data": {
                "user_id": app_account_token,
                "provider_customer_id": app_account_token,
                "provider_subscription_id": original_tx_id,
                "plan_code": Value::Null,
                "product_id": product_id,
                "status": status,
                "cancel_at_period_end": status == "canceled",
                "current_period_start": purchase_at,
                "current_period_end": expires_at,
                "subtype": subtype,
            },
        }));
    }

    if code == "google_play" {
        let msg = payload.get("message").cloned().unwrap_or(Value::Null);
        let message_id = msg
            .get("messageId")
            .and_then(|v| v.as_str())
            .or_else(|| payload.get("messageId").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("google_play_{}", Utc::now().timestamp()));

        let mut decoded = Value::Null;
        if let Some(encoded) = msg.get("data").and_then(|v| v.as_str()) {
            if let Ok(raw) = STANDARD.decode(encoded) {
                decoded = serde_json::from_slice(&raw).unwrap_or(Value::Null);
            }
        }
        if decoded.is_null() && payload.get("subscriptionNotification").is_some() {
            decoded = payload.clone();
        }

        let sub_n = decoded.get("subscriptionNotification").cloned().unwrap_or(Value::Null);
        let purchase_token = sub_n
            .get("purchaseToken")
            .and_then(|v| v.as_str())
            .or_else(|| decoded.get("purchaseToken").and_then(|v| v.as_str()))
            .unwrap_or("")
            .to_string();
        let subscription_id = sub_n
            .get("subscriptionId")
            .and_then(|v| v.as_str())
            .or_else(|| decoded.get("subscriptionId").and_then(|v| v.as_str()))
            .unwrap_or("")
            .to_string();
        let notification_type = sub_n
            .get("notificationType")
            .or_else(|| decoded.get("notificationType"))
            .and_then(|v| v.as_i64());
        let status = google_notification_type_to_status(notification_type.unwrap_or(0));

        return Ok(serde_json::json!({
            "id": message_id,
            "type": "google_play.subscription_notification",
            "data": {
                "user_id": Value::Null,
                "provider_customer_id": Value::Null,
                "provider_subscription_id": if subscription_id.is_empty() { purchase_token.clone() } else { subscription_id.clone() },
                "purchase_token": purchase_token,
                "package_name": decoded.get("packageName").and_then(|v| v.as_str()).unwrap_or(""),
                "product_id": subscription_id,
                "status": status,
                "cancel_at_period_end": status == "canceled",
                "current_period_start": Value::Null,
                "current_period_end": Value::Null,
            },
        }));
    }

    Err(ApiError::validation("unsupported_webhook_provider", "Formato de webhook no soportado para provider"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_round_trips() {
        let now = Utc::now().timestamp();
        let body = b"{\"id\":\"evt_1\"}";
        let secret = "whsec_test";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{now}.").as_bytes());
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        let header = format!("t={now},v1={sig}");
        assert!(verify_hmac_signature(body, Some(&header), secret, 300));
    }

    #[test]
    fn hmac_signature_rejects_stale_timestamp() {
        let stale = Utc::now().timestamp() - 10_000;
        let header = format!("t={stale},v1=deadbeef");
        assert!(!verify_hmac_signature(b"body", Some(&header), "secret", 300));
    }

    #[test]
    fn google_notification_mapping_normalizes_paused_and_revoked() {
        assert_eq!(google_notification_type_to_status(10), "past_due");
        assert_eq!(google_notification_type_to_status(12), "canceled");
        assert_eq!(google_notification_type_to_status(2), "active");
    }
}
