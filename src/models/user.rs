use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Blocked,
    PendingDeletion,
    Deleted,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone_e164: Option<String>,
    pub email: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Phone,
    Email,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Phone => "phone",
            ContactKind::Email => "email",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ContactKind,
    pub value: String,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthCredential {
    pub user_id: Uuid,
    pub password_hash: String,
    pub password_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "otp_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Register,
    PasswordReset,
    ContactChange,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Register => "register",
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::ContactChange => "contact_change",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthOtp {
    pub id: Uuid,
    pub contact_kind: ContactKind,
    pub contact_value: String,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthLoginAttempt {
    pub login_key_hash: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Response shape for `/auth/*` endpoints that mint or rotate tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TokenOut {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtpRequestOut {
    pub ok: bool,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleOkOut {
    pub ok: bool,
}

// ---- Request DTOs ----

#[derive(Debug, Clone, Deserialize)]
pub struct OtpRequestIn {
    pub phone_e164: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub purpose: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCompleteIn {
    pub phone_e164: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub code: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginIn {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshIn {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoutIn {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequestIn {
    pub phone_e164: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirmIn {
    pub phone_e164: Option<String>,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactChangeRequestIn {
    pub kind: String,
    pub new_value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactChangeConfirmIn {
    pub kind: String,
    pub new_value: String,
    pub code: String,
}
