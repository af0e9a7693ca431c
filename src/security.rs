use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// JWT claims shared by access and refresh tokens. Access tokens omit
/// `sid`; refresh tokens always carry it so a session row can be located.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("wrong token type")]
    WrongType,
    #[error("missing session id")]
    MissingSid,
}

pub fn create_access_token(config: &Config, user_id: Uuid) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user_id.to_string(),
        token_type: "access".to_string(),
        exp: (now_utc() + Duration::minutes(config.jwt_access_minutes)).timestamp(),
        sid: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| TokenError::Invalid)
}

pub fn create_refresh_token(config: &Config, user_id: Uuid, sid: Uuid) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user_id.to_string(),
        token_type: "refresh".to_string(),
        exp: (now_utc() + Duration::days(config.jwt_refresh_days)).timestamp(),
        sid: Some(sid.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| TokenError::Invalid)
}

pub fn decode_token(config: &Config, token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| TokenError::Invalid)?;
    Ok(data.claims)
}

pub fn decode_access_token(config: &Config, token: &str) -> Result<Claims, TokenError> {
    let claims = decode_token(config, token)?;
    if claims.token_type != "access" {
        return Err(TokenError::WrongType);
    }
    Ok(claims)
}

pub fn decode_refresh_token(config: &Config, token: &str) -> Result<Claims, TokenError> {
    let claims = decode_token(config, token)?;
    if claims.token_type != "refresh" {
        return Err(TokenError::WrongType);
    }
    if claims.sid.is_none() {
        return Err(TokenError::MissingSid);
    }
    Ok(claims)
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Peppered SHA-256, used for OTP codes, refresh-token hashes, and
/// login-attempt keys. Never reversible, never logged in the clear.
fn peppered_hash(pepper: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pepper.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            env: "test".to_string(),
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            jwt_access_minutes: 60,
            jwt_refresh_days: 30,
            otp_ttl_minutes: 10,
            otp_pepper: "test-pepper".to_string(),
            otp_request_cooldown_seconds: 120,
            confirm_window_hours: 48,
            provisional_matches: 5,
            provisional_cap: 30,
            max_score_proposals: 2,
            db_pool_size: 5,
            api_workers: 2,
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            allowed_hosts: vec![],
            security_headers_enabled: true,
            cors_allowed_origins: vec!["*".to_string()],
            billing_provider: "none".to_string(),
            billing_webhook_secret: None,
            billing_require_webhook_signature: false,
            billing_webhook_max_age_seconds: 300,
            billing_webhook_stripe_secret: None,
            billing_webhook_app_store_secret: None,
            billing_webhook_google_play_secret: None,
            billing_plus_plan_code: "RIVIO_PLUS".to_string(),
            app_store_shared_secret: None,
            app_store_verify_url_prod: String::new(),
            app_store_verify_url_sandbox: String::new(),
            google_play_package_name: None,
            google_play_service_account_email: None,
            google_play_service_account_private_key_pem: None,
            google_play_token_uri: String::new(),
            google_play_android_publisher_scope: String::new(),
        }
    }

    #[test]
    fn access_token_round_trips_and_rejects_as_refresh() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = create_access_token(&config, user_id).unwrap();
        let claims = decode_access_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(decode_refresh_token(&config, &token).is_err());
    }

    #[test]
    fn refresh_token_carries_session_id() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let token = create_refresh_token(&config, user_id, sid).unwrap();
        let claims = decode_refresh_token(&config, &token).unwrap();
        assert_eq!(claims.sid, Some(sid.to_string()));
    }

    #[test]
    fn peppered_hash_is_deterministic_and_pepper_sensitive() {
        let config = test_config();
        let a = otp_hash(&config, "123456");
        let b = otp_hash(&config, "123456");
        assert_eq!(a, b);

        let mut other = config.clone();
        other.otp_pepper = "different-pepper".to_string();
        assert_ne!(a, otp_hash(&other, "123456"));
    }

    #[test]
    fn random_otp_code_is_six_digits() {
        let code = random_otp_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}

pub fn otp_hash(config: &Config, code: &str) -> String {
    peppered_hash(&config.otp_pepper, code)
}

pub fn hash_refresh_token(config: &Config, token: &str) -> String {
    peppered_hash(&config.jwt_secret, token)
}

/// Hash used for audit-log entity ids and login-attempt dedup keys, so
/// raw phone numbers/emails never land in a queryable column or log line.
pub fn pii_hash(config: &Config, value: &str) -> String {
    peppered_hash(&config.otp_pepper, value)
}

pub fn random_otp_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

pub fn random_alias_suffix() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    hex::encode(bytes)
}
