use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BillingCustomer {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_customer_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BillingSubscription {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_subscription_id: String,
    pub plan_code: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub raw_payload: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BillingWebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BillingCheckoutSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub plan_code: String,
    pub status: String,
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionIn {
    pub plan_code: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionOut {
    pub session_id: Uuid,
    pub provider: String,
    pub plan_code: String,
    pub status: String,
    pub checkout_url: Option<String>,
    pub is_stub: bool,
    pub detail: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateSubscriptionIn {
    pub provider: String,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: String,
    pub plan_code: String,
    pub status: String,
    pub period_days: i64,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookIngestOut {
    pub duplicate: bool,
    pub processed: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreValidationOut {
    pub valid: bool,
    pub plan_code: Option<String>,
    pub status: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreReceiptIn {
    pub receipt_data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GooglePlayPurchaseIn {
    pub purchase_token: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingMeOut {
    pub provider: String,
    pub provider_customer_id: Option<String>,
    pub entitlement_plan_code: String,
    pub checkout_supported: bool,
    pub webhook_configured: bool,
    pub subscription: Option<BillingSubscription>,
}
