//! Self-profile read/update, play eligibility, and per-ladder standings.
//! Grounded on `app/modules/me/api.py`.

use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::models::profile::{Gender, UpdateProfileIn};
use crate::models::user::{User, UserStatus};

use super::audit::audit;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileOut {
    pub alias: String,
    pub gender: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeOut {
    pub id: Uuid,
    pub phone_e164: Option<String>,
    pub email: Option<String>,
    pub status: UserStatus,
    pub profile: Option<ProfileOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayEligibilityOut {
    pub can_play: bool,
    pub can_create_match: bool,
    pub can_be_invited: bool,
    pub missing: Vec<&'static str>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LadderStateOut {
    pub ladder_code: String,
    pub category_id: Uuid,
    pub category_code: String,
    pub rating: i32,
    pub verified_matches: i32,
    pub is_provisional: bool,
    pub trust_score: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyMatchRowOut {
    pub id: Uuid,
    pub ladder_code: String,
    pub category_code: String,
    pub club_id: Option<Uuid>,
    pub club_name: Option<String>,
    pub played_at: chrono::DateTime<chrono::Utc>,
    pub status: String,
    pub confirmation_deadline: chrono::DateTime<chrono::Utc>,
    pub confirmed_count: i32,
    pub has_dispute: bool,
    pub my_team_no: i16,
    pub my_confirmation_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyMatchesOut {
    pub rows: Vec<MyMatchRowOut>,
    pub limit: i64,
    pub offset: i64,
    pub next_offset: Option<i64>,
}

async fn load_profile(pool: &PgPool, user_id: Uuid) -> ApiResult<Option<ProfileOut>> {
    let row = sqlx::query("SELECT alias, gender, is_public FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| ProfileOut {
        alias: r.get("alias"),
        gender: r.get::<Gender, _>("gender").to_string(),
        is_public: r.get("is_public"),
    }))
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::U => "U",
        };
        write!(f, "{s}")
    }
}

pub async fn me(pool: &PgPool, user_id: Uuid) -> ApiResult<MeOut> {
    let user = sqlx::query_as::<_, User>("SELECT id, phone_e164, email, status, created_at, last_login_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let profile = load_profile(pool, user_id).await?;

    Ok(MeOut { id: user.id, phone_e164: user.phone_e164, email: user.email, status: user.status, profile })
}

fn is_placeholder_alias(alias: &str) -> bool {
    alias.starts_with("player_")
}

pub async fn play_eligibility(pool: &PgPool, user_id: Uuid) -> ApiResult<PlayEligibilityOut> {
    let prof = sqlx::query("SELECT alias, gender FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let Some(prof) = prof else {
        return Ok(PlayEligibilityOut {
            can_play: false,
            can_create_match: false,
            can_be_invited: false,
            missing: vec!["perfil"],
            message: Some("Debes completar tu perfil para poder jugar.".to_string()),
        });
    };

    let alias: String = prof.get("alias");
    let gender: Gender = prof.get("gender");

    let mut missing: Vec<&'static str> = Vec::new();
    if is_placeholder_alias(&alias) {
        missing.push("usuario");
    }
    if gender != Gender::M && gender != Gender::F {
        missing.push("género");
    }

    let required_ladders: &[&str] = match gender {
        Gender::M => &["HM", "MX"],
        Gender::F => &["WM", "MX"],
        Gender::U => &[],
    };

    if !required_ladders.is_empty() {
        let have: Vec<String> = sqlx::query_scalar(
            "SELECT ladder_code FROM user_ladder_state WHERE user_id = $1 AND ladder_code = ANY($2)",
        )
        .bind(user_id)
        .bind(required_ladders)
        .fetch_all(pool)
        .await?;
        if required_ladders.iter().any(|l| !have.iter().any(|h| h == l)) {
            missing.push("categoría");
        }
    }

    let can_play = missing.is_empty();
    let message = if can_play {
        None
    } else {
        Some("Completa tu perfil (usuario, género y categoría) para crear o participar en partidos.".to_string())
    };

    Ok(PlayEligibilityOut { can_play, can_create_match: can_play, can_be_invited: can_play, missing, message })
}

async fn category_id_by_code(pool: &PgPool, ladder_code: &str, code: &str) -> ApiResult<Uuid> {
    sqlx::query_scalar("SELECT id FROM categories WHERE ladder_code = $1 AND code = $2")
        .bind(ladder_code)
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::validation("invalid_category_code", format!("invalid category code '{code}' for ladder '{ladder_code}'")))
}

async fn mx_code_from_map(pool: &PgPool, gender: &str, primary_code: &str) -> ApiResult<String> {
    sqlx::query_scalar("SELECT mx_code FROM mx_category_map WHERE gender = $1 AND primary_code = $2")
        .bind(gender)
        .bind(primary_code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::validation("missing_mx_mapping", "MX mapping missing for gender/category"))
}

async fn upsert_ladder_state(pool: &PgPool, user_id: Uuid, ladder_code: &str, category_id: Uuid) -> ApiResult<()> {
    let existing = sqlx::query("SELECT verified_matches, category_id FROM user_ladder_state WHERE user_id = $1 AND ladder_code = $2")
        .bind(user_id)
        .bind(ladder_code)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let verified_matches: i32 = row.get("verified_matches");
        let current_cat: Uuid = row.get("category_id");
        if current_cat == category_id {
            return Ok(());
        }
        if verified_matches > 0 {
            return Err(ApiError::validation(
                "category_locked",
                format!("cannot change category for ladder {ladder_code} after verified matches"),
            ));
        }
        sqlx::query("UPDATE user_ladder_state SET category_id = $1, updated_at = now() WHERE user_id = $2 AND ladder_code = $3")
            .bind(category_id)
            .bind(user_id)
            .bind(ladder_code)
            .execute(pool)
            .await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO user_ladder_state (user_id, ladder_code, category_id, rating, verified_matches, is_provisional, trust_score) \
         VALUES ($1, $2, $3, 1000, 0, true, 100)",
    )
    .bind(user_id)
    .bind(ladder_code)
    .bind(category_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_profile(pool: &PgPool, user_id: Uuid, payload: &UpdateProfileIn) -> ApiResult<MeOut> {
    let prof = sqlx::query("SELECT alias, gender, is_public FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::validation("missing_profile", "profile missing"))?;

    if let Some(alias) = &payload.alias {
        let taken: Option<i32> = sqlx::query_scalar("SELECT 1 FROM user_profiles WHERE lower(alias) = lower($1) AND user_id <> $2")
            .bind(alias)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        if taken.is_some() {
            return Err(ApiError::validation("alias_taken", "alias already taken"));
        }
    }

    let mut tx = pool.begin().await?;

    if payload.alias.is_some() || payload.gender.is_some() || payload.is_public.is_some() || payload.country.is_some()
        || payload.city.is_some() || payload.handedness.is_some() || payload.preferred_side.is_some()
    {
        sqlx::query(
            "UPDATE user_profiles SET \
             alias = COALESCE($1, alias), gender = COALESCE($2, gender), is_public = COALESCE($3, is_public), \
             country = COALESCE($4, country), city = COALESCE($5, city), handedness = COALESCE($6, handedness), \
             preferred_side = COALESCE($7, preferred_side), updated_at = now() \
             WHERE user_id = $8",
        )
        .bind(&payload.alias)
        .bind(payload.gender)
        .bind(payload.is_public)
        .bind(&payload.country)
        .bind(&payload.city)
        .bind(&payload.handedness)
        .bind(&payload.preferred_side)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    let gender_eff: Gender = payload.gender.unwrap_or_else(|| prof.get("gender"));

    if let Some(primary_category_code) = &payload.primary_category_code {
        if gender_eff != Gender::M && gender_eff != Gender::F {
            return Err(ApiError::validation("gender_required", "debes definir tu género (M o F) antes de elegir categoría"));
        }
        let primary_ladder = if gender_eff == Gender::M { "HM" } else { "WM" };
        let primary_cat_id = category_id_by_code(pool, primary_ladder, primary_category_code).await?;
        upsert_ladder_state(pool, user_id, primary_ladder, primary_cat_id).await?;

        let mx_code = mx_code_from_map(pool, gender_eff.to_string().as_str(), primary_category_code).await?;
        let mx_cat_id = category_id_by_code(pool, "MX", &mx_code).await?;
        upsert_ladder_state(pool, user_id, "MX", mx_cat_id).await?;
    }

    audit(
        &mut tx,
        Some(user_id),
        "profile",
        &user_id.to_string(),
        "updated",
        serde_json::json!({
            "alias": payload.alias,
            "gender": payload.gender,
            "is_public": payload.is_public,
            "primary_category_code": payload.primary_category_code,
        }),
    )
    .await?;

    tx.commit().await?;

    me(pool, user_id).await
}

pub async fn my_ladder_states(pool: &PgPool, user_id: Uuid) -> ApiResult<Vec<LadderStateOut>> {
    let rows = sqlx::query(
        "SELECT s.ladder_code, s.category_id, c.code as category_code, s.rating, s.verified_matches, s.is_provisional, s.trust_score \
         FROM user_ladder_state s JOIN categories c ON c.id = s.category_id WHERE s.user_id = $1 ORDER BY s.ladder_code",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| LadderStateOut {
            ladder_code: r.get("ladder_code"),
            category_id: r.get("category_id"),
            category_code: r.get("category_code"),
            rating: r.get("rating"),
            verified_matches: r.get("verified_matches"),
            is_provisional: r.get("is_provisional"),
            trust_score: r.get("trust_score"),
        })
        .collect())
}

pub async fn my_matches(
    pool: &PgPool,
    user_id: Uuid,
    ladder: Option<&str>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> ApiResult<MyMatchesOut> {
    let rows = sqlx::query(
        "SELECT m.id, m.ladder_code, c.code as category_code, m.club_id, cl.name as club_name, \
         m.played_at, m.status::text as status, m.confirmation_deadline, m.confirmed_count, m.has_dispute, \
         mp.team_no as my_team_no, COALESCE(mc.status::text, 'pending') as my_confirmation_status \
         FROM matches m \
         JOIN match_participants mp ON mp.match_id = m.id AND mp.user_id = $1 \
         JOIN categories c ON c.id = m.category_id \
         LEFT JOIN clubs cl ON cl.id = m.club_id \
         LEFT JOIN match_confirmations mc ON mc.match_id = m.id AND mc.user_id = $1 \
         WHERE ($2::text IS NULL OR m.ladder_code = $2) AND ($3::text IS NULL OR m.status::text = $3) \
         ORDER BY m.played_at DESC, m.created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(user_id)
    .bind(ladder)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let out_rows: Vec<MyMatchRowOut> = rows
        .iter()
        .map(|r| MyMatchRowOut {
            id: r.get("id"),
            ladder_code: r.get("ladder_code"),
            category_code: r.get("category_code"),
            club_id: r.get("club_id"),
            club_name: r.get("club_name"),
            played_at: r.get("played_at"),
            status: r.get("status"),
            confirmation_deadline: r.get("confirmation_deadline"),
            confirmed_count: r.get("confirmed_count"),
            has_dispute: r.get("has_dispute"),
            my_team_no: r.get("my_team_no"),
            my_confirmation_status: r.get("my_confirmation_status"),
        })
        .collect();

    let next_offset = if out_rows.len() as i64 == limit { Some(offset + limit) } else { None };
    Ok(MyMatchesOut { rows: out_rows, limit, offset, next_offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_alias_detection() {
        assert!(is_placeholder_alias("player_8421"));
        assert!(!is_placeholder_alias("nico"));
    }
}
