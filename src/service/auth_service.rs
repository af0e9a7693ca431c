//! Identity & session lifecycle. Grounded on `app/modules/auth/api.py`:
//! contact normalization, OTP request/consume with `FOR UPDATE` locking,
//! password auth with login-attempt throttling, and rotating refresh
//! sessions. One DB transaction per public function; callers commit.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::config::Config;
use crate::models::user::*;
use crate::security;

use super::audit::audit;

pub fn normalize_phone(
    phone_e164: Option<&str>,
    country_code: Option<&str>,
    phone_number: Option<&str>,
) -> ApiResult<String> {
    if let Some(raw) = phone_e164 {
        let mut raw = raw.trim().to_string();
        if !raw.starts_with('+') {
            raw = format!("+{raw}");
        }
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(ApiError::validation("invalid_phone", "invalid phone number"));
        }
        return Ok(format!("+{digits}"));
    }
    let cc: String = country_code.unwrap_or("").trim().replace('+', "");
    let nsn: String = phone_number
        .unwrap_or("")
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if cc.is_empty() || nsn.is_empty() {
        return Err(ApiError::validation("invalid_phone", "country_code and phone_number are required"));
    }
    Ok(format!("+{cc}{nsn}"))
}

pub fn normalize_email(email: Option<&str>) -> ApiResult<String> {
    let raw = email.unwrap_or("").trim().to_lowercase();
    let valid = raw.contains('@') && raw.split('@').next_back().map(|d| d.contains('.')).unwrap_or(false);
    if raw.is_empty() || !valid {
        return Err(ApiError::validation("invalid_email", "invalid email address"));
    }
    Ok(raw)
}

pub fn resolve_contact(
    phone_e164: Option<&str>,
    country_code: Option<&str>,
    phone_number: Option<&str>,
    email: Option<&str>,
) -> ApiResult<(ContactKind, String)> {
    if let Some(e) = email {
        if !e.trim().is_empty() {
            return Ok((ContactKind::Email, normalize_email(Some(e))?));
        }
    }
    Ok((ContactKind::Phone, normalize_phone(phone_e164, country_code, phone_number)?))
}

pub fn parse_identifier(identifier: &str) -> ApiResult<(ContactKind, String)> {
    let value = identifier.trim();
    if value.contains('@') {
        Ok((ContactKind::Email, normalize_email(Some(value))?))
    } else {
        Ok((ContactKind::Phone, normalize_phone(Some(value), None, None)?))
    }
}

async fn get_identity(
    tx: &mut Transaction<'_, Postgres>,
    kind: ContactKind,
    value: &str,
) -> ApiResult<Option<AuthIdentity>> {
    let row = sqlx::query_as::<_, AuthIdentity>(
        "SELECT id, user_id, kind, value, is_verified, verified_at FROM auth_identities WHERE kind = $1 AND value = $2",
    )
    .bind(kind)
    .bind(value)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

async fn request_otp(
    tx: &mut Transaction<'_, Postgres>,
    config: &Config,
    kind: ContactKind,
    value: &str,
    purpose: OtpPurpose,
) -> ApiResult<OtpRequestOut> {
    let last_created_at = sqlx::query(
        "SELECT created_at FROM auth_otps WHERE contact_kind = $1 AND contact_value = $2 AND purpose = $3 \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(kind)
    .bind(value)
    .bind(purpose)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = last_created_at {
        let created_at: chrono::DateTime<Utc> = row.try_get("created_at")?;
        let cooldown_until = created_at + Duration::seconds(config.otp_request_cooldown_seconds);
        if Utc::now() < cooldown_until {
            return Err(ApiError::rate_limited("otp_cooldown", "you must wait before requesting a new code"));
        }
    }

    let code = security::random_otp_code();
    let code_hash = security::otp_hash(config, &code);
    let expires_at = Utc::now() + Duration::minutes(config.otp_ttl_minutes);

    sqlx::query(
        "INSERT INTO auth_otps (id, contact_kind, contact_value, purpose, code_hash, expires_at, attempts, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 0, now())",
    )
    .bind(Uuid::new_v4())
    .bind(kind)
    .bind(value)
    .bind(purpose)
    .bind(&code_hash)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    let entity_id = format!("{}_sha256:{}", kind.as_str(), security::pii_hash(config, value));
    audit(tx, None, "auth", &entity_id, "otp_requested", json!({ "purpose": purpose.as_str() })).await?;

    let mut out = OtpRequestOut { ok: true, purpose: purpose.as_str().to_string(), dev_code: None };
    if config.is_dev() {
        out.dev_code = Some(code);
    }
    Ok(out)
}

async fn consume_otp(
    tx: &mut Transaction<'_, Postgres>,
    config: &Config,
    kind: ContactKind,
    value: &str,
    purpose: OtpPurpose,
    code: &str,
) -> ApiResult<()> {
    let row = sqlx::query(
        "SELECT id, code_hash, expires_at, attempts, consumed_at FROM auth_otps \
         WHERE contact_kind = $1 AND contact_value = $2 AND purpose = $3 \
         ORDER BY created_at DESC LIMIT 1 FOR UPDATE",
    )
    .bind(kind)
    .bind(value)
    .bind(purpose)
    .fetch_optional(&mut **tx)
    .await?;

    let row = row.ok_or_else(|| ApiError::validation("otp_not_found", "no code was requested for this contact"))?;

    let id: Uuid = row.try_get("id")?;
    let code_hash: String = row.try_get("code_hash")?;
    let expires_at: chrono::DateTime<Utc> = row.try_get("expires_at")?;
    let attempts: i32 = row.try_get("attempts")?;
    let consumed_at: Option<chrono::DateTime<Utc>> = row.try_get("consumed_at")?;

    if consumed_at.is_some() {
        return Err(ApiError::validation("already_used", "this code has already been used"));
    }
    if Utc::now() > expires_at {
        return Err(ApiError::validation("expired", "this code has expired"));
    }
    if attempts >= 5 {
        return Err(ApiError::validation("too_many_attempts", "too many incorrect attempts"));
    }
    if security::otp_hash(config, code) != code_hash {
        sqlx::query("UPDATE auth_otps SET attempts = attempts + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        return Err(ApiError::validation("invalid_code", "incorrect code"));
    }

    sqlx::query("UPDATE auth_otps SET consumed_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn create_session_tokens(
    tx: &mut Transaction<'_, Postgres>,
    config: &Config,
    user_id: Uuid,
) -> ApiResult<TokenOut> {
    let sid = Uuid::new_v4();
    let refresh_token = security::create_refresh_token(config, user_id, sid)
        .map_err(|_| ApiError::internal("failed to mint refresh token"))?;
    let refresh_hash = security::hash_refresh_token(config, &refresh_token);
    let expires_at = Utc::now() + Duration::days(config.jwt_refresh_days);

    sqlx::query(
        "INSERT INTO auth_sessions (id, user_id, refresh_hash, expires_at, created_at) VALUES ($1, $2, $3, $4, now())",
    )
    .bind(sid)
    .bind(user_id)
    .bind(&refresh_hash)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    let access_token = security::create_access_token(config, user_id)
        .map_err(|_| ApiError::internal("failed to mint access token"))?;
    Ok(TokenOut { access_token, refresh_token })
}

pub async fn otp_request(pool: &PgPool, config: &Config, payload: &OtpRequestIn) -> ApiResult<OtpRequestOut> {
    let (kind, value) = resolve_contact(
        payload.phone_e164.as_deref(),
        payload.country_code.as_deref(),
        payload.phone_number.as_deref(),
        payload.email.as_deref(),
    )?;
    let purpose = parse_purpose(&payload.purpose)?;

    let mut tx = pool.begin().await?;

    if purpose == OtpPurpose::PasswordReset {
        let ident = get_identity(&mut tx, kind, &value).await?;
        if ident.as_ref().map(|i| i.is_verified) != Some(true) {
            tx.commit().await?;
            return Ok(OtpRequestOut { ok: true, purpose: purpose.as_str().to_string(), dev_code: None });
        }
    }

    let out = request_otp(&mut tx, config, kind, &value, purpose).await?;
    tx.commit().await?;
    Ok(out)
}

fn parse_purpose(s: &str) -> ApiResult<OtpPurpose> {
    match s {
        "register" => Ok(OtpPurpose::Register),
        "password_reset" => Ok(OtpPurpose::PasswordReset),
        "contact_change" => Ok(OtpPurpose::ContactChange),
        _ => Err(ApiError::validation("invalid_purpose", "unknown OTP purpose")),
    }
}

pub async fn register_complete(pool: &PgPool, config: &Config, payload: &RegisterCompleteIn) -> ApiResult<TokenOut> {
    let (kind, value) = resolve_contact(
        payload.phone_e164.as_deref(),
        payload.country_code.as_deref(),
        payload.phone_number.as_deref(),
        payload.email.as_deref(),
    )?;

    let mut tx = pool.begin().await?;
    consume_otp(&mut tx, config, kind, &value, OtpPurpose::Register, &payload.code).await?;

    let ident = get_identity(&mut tx, kind, &value).await?;
    let user_id = if let Some(ident) = ident {
        let has_credential = sqlx::query("SELECT 1 FROM auth_credentials WHERE user_id = $1")
            .bind(ident.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if has_credential.is_some() {
            return Err(ApiError::conflict("conflict_registered", "this account is already registered"));
        }
        sqlx::query("UPDATE auth_identities SET is_verified = true, verified_at = now() WHERE id = $1")
            .bind(ident.id)
            .execute(&mut *tx)
            .await?;
        ident.user_id
    } else {
        let user_id: Uuid = match kind {
            ContactKind::Phone => {
                sqlx::query_scalar("INSERT INTO users (id, phone_e164, status, created_at) VALUES ($1, $2, 'active', now()) RETURNING id")
                    .bind(Uuid::new_v4())
                    .bind(&value)
                    .fetch_one(&mut *tx)
                    .await?
            }
            ContactKind::Email => {
                sqlx::query_scalar("INSERT INTO users (id, email, status, created_at) VALUES ($1, $2, 'active', now()) RETURNING id")
                    .bind(Uuid::new_v4())
                    .bind(&value)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };
        sqlx::query(
            "INSERT INTO auth_identities (id, user_id, kind, value, is_verified, verified_at) \
             VALUES ($1, $2, $3, $4, true, now())",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(&value)
        .execute(&mut *tx)
        .await?;
        user_id
    };

    match kind {
        ContactKind::Phone => {
            sqlx::query("UPDATE users SET phone_e164 = COALESCE(phone_e164, $1) WHERE id = $2")
                .bind(&value)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        ContactKind::Email => {
            sqlx::query("UPDATE users SET email = COALESCE(email, $1) WHERE id = $2")
                .bind(&value)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let password_hash = security::hash_password(&payload.password).map_err(|_| ApiError::internal("failed to hash password"))?;
    sqlx::query(
        "INSERT INTO auth_credentials (user_id, password_hash, password_updated_at) VALUES ($1, $2, now())",
    )
    .bind(user_id)
    .bind(&password_hash)
    .execute(&mut *tx)
    .await?;

    ensure_profile_with_alias(&mut tx, user_id, kind, &value).await?;

    let tokens = create_session_tokens(&mut tx, config, user_id).await?;
    audit(&mut tx, Some(user_id), "auth", &user_id.to_string(), "register_completed", json!({ "contact_kind": kind.as_str() })).await?;
    tx.commit().await?;
    Ok(tokens)
}

async fn ensure_profile_with_alias(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    kind: ContactKind,
    value: &str,
) -> ApiResult<()> {
    let exists = sqlx::query("SELECT 1 FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let suffix = match kind {
        ContactKind::Email => value.split('@').next().unwrap_or("").chars().take(4).collect::<String>(),
        ContactKind::Phone => {
            let len = value.len();
            value[len.saturating_sub(4)..].to_string()
        }
    };
    let base_alias = format!("player_{suffix}");

    for attempt in 0..20 {
        let alias = if attempt == 0 { base_alias.clone() } else { format!("{base_alias}_{}", security::random_alias_suffix()) };
        let row = sqlx::query(
            "INSERT INTO user_profiles (user_id, alias, gender, is_public) VALUES ($1, $2, 'U', true) \
             ON CONFLICT DO NOTHING RETURNING 1",
        )
        .bind(user_id)
        .bind(&alias)
        .fetch_optional(&mut **tx)
        .await?;
        if row.is_some() {
            return Ok(());
        }
    }
    Err(ApiError::conflict("alias_unavailable", "could not assign a profile alias"))
}

pub async fn login(pool: &PgPool, config: &Config, payload: &LoginIn) -> ApiResult<TokenOut> {
    let (kind, value) = parse_identifier(&payload.identifier)?;
    let login_key_hash = security::pii_hash(config, &format!("{}:{}", kind.as_str(), value));

    let mut tx = pool.begin().await?;

    let failed: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM auth_login_attempts WHERE login_key_hash = $1 AND success = false \
         AND created_at >= (now() - interval '15 minutes')",
    )
    .bind(&login_key_hash)
    .fetch_one(&mut *tx)
    .await?;
    if failed >= 8 {
        return Err(ApiError::rate_limited("login_rate_limited", "too many login attempts, try again later"));
    }

    let ident = get_identity(&mut tx, kind, &value).await?;
    let Some(ident) = ident.filter(|i| i.is_verified) else {
        record_login_attempt(&mut tx, &login_key_hash, false).await?;
        tx.commit().await?;
        return Err(ApiError::unauthenticated("invalid_credentials"));
    };

    let cred = sqlx::query_as::<_, AuthCredential>(
        "SELECT user_id, password_hash, password_updated_at FROM auth_credentials WHERE user_id = $1",
    )
    .bind(ident.user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let valid = cred.as_ref().map(|c| security::verify_password(&payload.password, &c.password_hash)).unwrap_or(false);
    if !valid {
        record_login_attempt(&mut tx, &login_key_hash, false).await?;
        tx.commit().await?;
        return Err(ApiError::unauthenticated("invalid_credentials"));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, phone_e164, email, status, created_at, last_login_at FROM users WHERE id = $1",
    )
    .bind(ident.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::unauthenticated("invalid_credentials"))?;

    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("blocked", "this account is blocked"));
    }

    record_login_attempt(&mut tx, &login_key_hash, true).await?;
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(ident.user_id)
        .execute(&mut *tx)
        .await?;

    let tokens = create_session_tokens(&mut tx, config, ident.user_id).await?;
    audit(&mut tx, Some(ident.user_id), "auth", &ident.user_id.to_string(), "login", json!({})).await?;
    tx.commit().await?;
    Ok(tokens)
}

async fn record_login_attempt(tx: &mut Transaction<'_, Postgres>, login_key_hash: &str, success: bool) -> ApiResult<()> {
    sqlx::query("INSERT INTO auth_login_attempts (login_key_hash, success, created_at) VALUES ($1, $2, now())")
        .bind(login_key_hash)
        .bind(success)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn password_reset_request(pool: &PgPool, config: &Config, payload: &PasswordResetRequestIn) -> ApiResult<OtpRequestOut> {
    let (kind, value) = resolve_contact(
        payload.phone_e164.as_deref(),
        payload.country_code.as_deref(),
        payload.phone_number.as_deref(),
        payload.email.as_deref(),
    )?;
    let mut tx = pool.begin().await?;
    let ident = get_identity(&mut tx, kind, &value).await?;
    if ident.as_ref().map(|i| i.is_verified) != Some(true) {
        tx.commit().await?;
        return Ok(OtpRequestOut { ok: true, purpose: "password_reset".to_string(), dev_code: None });
    }
    let out = request_otp(&mut tx, config, kind, &value, OtpPurpose::PasswordReset).await?;
    tx.commit().await?;
    Ok(out)
}

pub async fn password_reset_confirm(pool: &PgPool, config: &Config, payload: &PasswordResetConfirmIn) -> ApiResult<SimpleOkOut> {
    let (kind, value) = resolve_contact(
        payload.phone_e164.as_deref(),
        payload.country_code.as_deref(),
        payload.phone_number.as_deref(),
        payload.email.as_deref(),
    )?;
    let mut tx = pool.begin().await?;
    consume_otp(&mut tx, config, kind, &value, OtpPurpose::PasswordReset, &payload.code).await?;

    let ident = get_identity(&mut tx, kind, &value).await?
        .ok_or_else(|| ApiError::validation("identity_not_found", "no identity found for this contact"))?;

    let password_hash = security::hash_password(&payload.new_password).map_err(|_| ApiError::internal("failed to hash password"))?;
    let existing = sqlx::query("SELECT 1 FROM auth_credentials WHERE user_id = $1")
        .bind(ident.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        sqlx::query("UPDATE auth_credentials SET password_hash = $1, password_updated_at = now() WHERE user_id = $2")
            .bind(&password_hash)
            .bind(ident.user_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("INSERT INTO auth_credentials (user_id, password_hash, password_updated_at) VALUES ($1, $2, now())")
            .bind(ident.user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE auth_sessions SET revoked_at = now(), revoked_reason = 'password_reset' WHERE user_id = $1 AND revoked_at IS NULL")
        .bind(ident.user_id)
        .execute(&mut *tx)
        .await?;

    audit(&mut tx, Some(ident.user_id), "auth", &ident.user_id.to_string(), "password_reset", json!({})).await?;
    tx.commit().await?;
    Ok(SimpleOkOut { ok: true })
}

pub async fn refresh(pool: &PgPool, config: &Config, payload: &RefreshIn) -> ApiResult<TokenOut> {
    let claims = security::decode_refresh_token(config, &payload.refresh_token)
        .map_err(|_| ApiError::unauthenticated("invalid_refresh_token"))?;
    let sid: Uuid = claims.sid.as_deref().and_then(|s| s.parse().ok())
        .ok_or_else(|| ApiError::unauthenticated("invalid_refresh_token"))?;
    let claimed_user_id: Uuid = claims.sub.parse().map_err(|_| ApiError::unauthenticated("invalid_refresh_token"))?;

    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, AuthSession>(
        "SELECT id, user_id, refresh_hash, expires_at, revoked_at, revoked_reason, replaced_by, created_at \
         FROM auth_sessions WHERE id = $1 FOR UPDATE",
    )
    .bind(sid)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::unauthenticated("session_not_found"))?;

    if session.user_id != claimed_user_id {
        return Err(ApiError::unauthenticated("session_not_found"));
    }
    if session.revoked_at.is_some() {
        return Err(ApiError::unauthenticated("session_revoked"));
    }
    if Utc::now() > session.expires_at {
        return Err(ApiError::unauthenticated("session_expired"));
    }
    if session.refresh_hash != security::hash_refresh_token(config, &payload.refresh_token) {
        return Err(ApiError::unauthenticated("invalid_refresh_token"));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, phone_e164, email, status, created_at, last_login_at FROM users WHERE id = $1",
    )
    .bind(session.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::unauthenticated("user_not_found"))?;
    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("blocked", "this account is blocked"));
    }

    let new_tokens = create_session_tokens(&mut tx, config, session.user_id).await?;
    let new_claims = security::decode_refresh_token(config, &new_tokens.refresh_token)
        .map_err(|_| ApiError::internal("failed to decode freshly minted refresh token"))?;
    let new_sid: Uuid = new_claims.sid.as_deref().and_then(|s| s.parse().ok())
        .ok_or_else(|| ApiError::internal("new session missing sid"))?;

    sqlx::query("UPDATE auth_sessions SET revoked_at = now(), revoked_reason = 'rotated', replaced_by = $1 WHERE id = $2")
        .bind(new_sid)
        .bind(sid)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(new_tokens)
}

pub async fn logout(pool: &PgPool, config: &Config, payload: &LogoutIn) -> ApiResult<SimpleOkOut> {
    let Ok(claims) = security::decode_refresh_token(config, &payload.refresh_token) else {
        return Ok(SimpleOkOut { ok: true });
    };
    let Some(sid) = claims.sid.as_deref().and_then(|s| s.parse::<Uuid>().ok()) else {
        return Ok(SimpleOkOut { ok: true });
    };

    let mut tx = pool.begin().await?;
    let row = sqlx::query("SELECT refresh_hash FROM auth_sessions WHERE id = $1 FOR UPDATE")
        .bind(sid)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(row) = row {
        let refresh_hash: String = row.try_get("refresh_hash")?;
        if refresh_hash == security::hash_refresh_token(config, &payload.refresh_token) {
            sqlx::query("UPDATE auth_sessions SET revoked_at = now(), revoked_reason = 'logout' WHERE id = $1")
                .bind(sid)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;
    Ok(SimpleOkOut { ok: true })
}

pub async fn contact_change_request(pool: &PgPool, config: &Config, user_id: Uuid, payload: &ContactChangeRequestIn) -> ApiResult<OtpRequestOut> {
    let kind = match payload.kind.as_str() {
        "phone" => ContactKind::Phone,
        "email" => ContactKind::Email,
        _ => return Err(ApiError::validation("invalid_kind", "kind must be phone or email")),
    };
    let value = match kind {
        ContactKind::Phone => normalize_phone(Some(&payload.new_value), None, None)?,
        ContactKind::Email => normalize_email(Some(&payload.new_value))?,
    };
    let mut tx = pool.begin().await?;
    let in_use = sqlx::query("SELECT 1 FROM auth_identities WHERE kind = $1 AND value = $2 AND user_id <> $3")
        .bind(kind)
        .bind(&value)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if in_use.is_some() {
        return Err(ApiError::conflict("contact_in_use", "this contact is already in use"));
    }
    let out = request_otp(&mut tx, config, kind, &value, OtpPurpose::ContactChange).await?;
    tx.commit().await?;
    Ok(out)
}

pub async fn contact_change_confirm(pool: &PgPool, config: &Config, user_id: Uuid, payload: &ContactChangeConfirmIn) -> ApiResult<SimpleOkOut> {
    let kind = match payload.kind.as_str() {
        "phone" => ContactKind::Phone,
        "email" => ContactKind::Email,
        _ => return Err(ApiError::validation("invalid_kind", "kind must be phone or email")),
    };
    let value = match kind {
        ContactKind::Phone => normalize_phone(Some(&payload.new_value), None, None)?,
        ContactKind::Email => normalize_email(Some(&payload.new_value))?,
    };

    let mut tx = pool.begin().await?;
    consume_otp(&mut tx, config, kind, &value, OtpPurpose::ContactChange, &payload.code).await?;

    let in_use = sqlx::query("SELECT 1 FROM auth_identities WHERE kind = $1 AND value = $2 AND user_id <> $3")
        .bind(kind)
        .bind(&value)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if in_use.is_some() {
        return Err(ApiError::conflict("contact_in_use", "this contact is already in use"));
    }

    let existing = sqlx::query_as::<_, AuthIdentity>(
        "SELECT id, user_id, kind, value, is_verified, verified_at FROM auth_identities WHERE user_id = $1 AND kind = $2",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(existing) = existing {
        sqlx::query("UPDATE auth_identities SET value = $1, is_verified = true, verified_at = now() WHERE id = $2")
            .bind(&value)
            .bind(existing.id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO auth_identities (id, user_id, kind, value, is_verified, verified_at) VALUES ($1, $2, $3, $4, true, now())",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(&value)
        .execute(&mut *tx)
        .await?;
    }

    match kind {
        ContactKind::Phone => {
            sqlx::query("UPDATE users SET phone_e164 = $1 WHERE id = $2").bind(&value).bind(user_id).execute(&mut *tx).await?;
        }
        ContactKind::Email => {
            sqlx::query("UPDATE users SET email = $1 WHERE id = $2").bind(&value).bind(user_id).execute(&mut *tx).await?;
        }
    }

    audit(&mut tx, Some(user_id), "auth", &user_id.to_string(), "contact_changed", json!({ "kind": kind.as_str() })).await?;
    tx.commit().await?;
    Ok(SimpleOkOut { ok: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_phone_with_plus() {
        assert_eq!(normalize_phone(Some("+1 (415) 555-0100"), None, None).unwrap(), "+14155550100");
    }

    #[test]
    fn normalizes_phone_from_parts() {
        assert_eq!(normalize_phone(None, Some("+54"), Some("9 11 2345-6789")).unwrap(), "+5491123456789");
    }

    #[test]
    fn rejects_bad_email() {
        assert!(normalize_email(Some("not-an-email")).is_err());
    }

    #[test]
    fn parses_identifier_as_email_when_at_present() {
        let (kind, value) = parse_identifier("Player@Example.com").unwrap();
        assert_eq!(kind, ContactKind::Email);
        assert_eq!(value, "player@example.com");
    }

    #[test]
    fn parses_identifier_as_phone_otherwise() {
        let (kind, _) = parse_identifier("+14155550100").unwrap();
        assert_eq!(kind, ContactKind::Phone);
    }
}
