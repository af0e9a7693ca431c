//! Match creation and the confirmation state machine. Grounded on
//! `app/modules/matches/api.py` for creation, block rules, category
//! derivation and Elo application; the proposal/appeal/dispute layer of
//! the confirmation protocol follows its description directly, reusing
//! that file's locking and audit conventions.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::config::Config;
use crate::models::ladder::LadderCode;
use crate::models::match_::*;

use super::audit::audit;
use super::elo::{clamp_provisional, compute_elo, effective_k, k_factor_for};
use super::score::{extract_score_features, mov_weight_from_features, validate_score};

async fn assert_is_participant(tx: &mut Transaction<'_, Postgres>, match_id: Uuid, user_id: Uuid) -> ApiResult<()> {
    let ok = sqlx::query("SELECT 1 FROM match_participants WHERE match_id = $1 AND user_id = $2")
        .bind(match_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    if ok.is_none() {
        return Err(ApiError::forbidden("not_participant", "you are not a participant in this match"));
    }
    Ok(())
}

async fn assert_block_rules(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> ApiResult<()> {
    let pending: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM matches WHERE created_by = $1 AND status = 'pending_confirm' AND confirmation_deadline >= now()",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let expired_effective: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM matches WHERE created_by = $1 AND status = 'pending_confirm' \
         AND confirmation_deadline < now() AND created_at >= (now() - interval '30 days')",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let expired_materialized: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM matches WHERE created_by = $1 AND status = 'expired' \
         AND created_at >= (now() - interval '30 days')",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    let expired = expired_effective + expired_materialized;
    if pending >= 2 || expired >= 1 {
        return Err(ApiError::forbidden("create_blocked", "blocked from creating new matches (pending/expired limit)"));
    }
    Ok(())
}

struct ParticipantProfile {
    user_id: Uuid,
    gender: String,
}

async fn fetch_profiles(tx: &mut Transaction<'_, Postgres>, participant_ids: &[Uuid]) -> ApiResult<Vec<ParticipantProfile>> {
    let rows = sqlx::query("SELECT user_id, gender FROM user_profiles WHERE user_id = ANY($1)")
        .bind(participant_ids)
        .fetch_all(&mut **tx)
        .await?;
    if rows.len() != 4 {
        return Err(ApiError::validation("missing_profile", "all participants must have profiles"));
    }
    let profiles: Vec<ParticipantProfile> = rows
        .into_iter()
        .map(|r| ParticipantProfile { user_id: r.get("user_id"), gender: r.get::<String, _>("gender") })
        .collect();
    if profiles.iter().any(|p| p.gender != "M" && p.gender != "F") {
        return Err(ApiError::validation("missing_profile", "participants must have gender M/F"));
    }
    Ok(profiles)
}

fn determine_ladder_from_genders(genders: &[&str]) -> ApiResult<LadderCode> {
    let m = genders.iter().filter(|&&g| g == "M").count();
    let f = genders.iter().filter(|&&g| g == "F").count();
    if m == 4 && f == 0 {
        Ok(LadderCode::Hm)
    } else if f == 4 && m == 0 {
        Ok(LadderCode::Wm)
    } else if m == 2 && f == 2 {
        Ok(LadderCode::Mx)
    } else {
        Err(ApiError::validation("invalid_gender_mix", "use 4M (HM), 4F (WM) or 2M2F (MX)"))
    }
}

async fn require_ladder_states(tx: &mut Transaction<'_, Postgres>, ladder_code: LadderCode, participant_ids: &[Uuid]) -> ApiResult<()> {
    let cnt: i64 = sqlx::query_scalar("SELECT count(*) FROM user_ladder_state WHERE ladder_code = $1 AND user_id = ANY($2)")
        .bind(ladder_code.as_str())
        .bind(participant_ids)
        .fetch_one(&mut **tx)
        .await?;
    if cnt != 4 {
        return Err(ApiError::validation(
            "missing_ladder_state",
            format!("all participants must have ladder state for {}", ladder_code.as_str()),
        ));
    }
    Ok(())
}

async fn derive_match_category_id(tx: &mut Transaction<'_, Postgres>, ladder_code: LadderCode, participant_ids: &[Uuid]) -> ApiResult<Uuid> {
    let rows = sqlx::query(
        "SELECT c.sort_order FROM user_ladder_state s JOIN categories c ON c.id = s.category_id \
         WHERE s.ladder_code = $1 AND s.user_id = ANY($2)",
    )
    .bind(ladder_code.as_str())
    .bind(participant_ids)
    .fetch_all(&mut **tx)
    .await?;
    if rows.len() != 4 {
        return Err(ApiError::validation("missing_ladder_state", "missing ladder state/category for participants"));
    }
    let mut sort_orders: Vec<i32> = rows.iter().map(|r| r.get::<i32, _>("sort_order")).collect();
    sort_orders.sort_unstable();
    let median_val = (sort_orders[1] + sort_orders[2]) as f64 / 2.0;
    let target = median_val.ceil() as i32;

    let cats = sqlx::query("SELECT id, sort_order FROM categories WHERE ladder_code = $1")
        .bind(ladder_code.as_str())
        .fetch_all(&mut **tx)
        .await?;
    if cats.is_empty() {
        return Err(ApiError::validation("no_categories", "no categories for ladder"));
    }
    let best = cats
        .iter()
        .min_by_key(|c| {
            let sort_order: i32 = c.get("sort_order");
            ((sort_order - target).abs(), sort_order)
        })
        .unwrap();
    Ok(best.get("id"))
}

pub async fn create_match(pool: &PgPool, config: &Config, creator_id: Uuid, payload: &MatchCreateIn) -> ApiResult<MatchOut> {
    if payload.participants.len() != 4 {
        return Err(ApiError::validation("invalid_participants", "must include exactly 4 participants"));
    }
    let participant_ids: Vec<Uuid> = payload.participants.iter().map(|p| p.user_id).collect();
    let mut unique_ids = participant_ids.clone();
    unique_ids.sort();
    unique_ids.dedup();
    if unique_ids.len() != 4 {
        return Err(ApiError::validation("invalid_participants", "participants must be unique"));
    }
    if !participant_ids.contains(&creator_id) {
        return Err(ApiError::validation("invalid_participants", "creator must be a participant"));
    }
    let t1 = payload.participants.iter().filter(|p| p.team_no == 1).count();
    let t2 = payload.participants.iter().filter(|p| p.team_no == 2).count();
    if t1 != 2 || t2 != 2 {
        return Err(ApiError::validation("invalid_participants", "each team must have 2 participants"));
    }

    let winner_team = validate_score(&payload.score)?;
    if let Some(claimed) = payload.winner_team_no {
        if claimed != winner_team {
            return Err(ApiError::validation("winner_mismatch", "winner_team_no does not match derived winner from sets"));
        }
    }

    let mut tx = pool.begin().await?;
    assert_block_rules(&mut tx, creator_id).await?;

    if let Some(club_id) = payload.club_id {
        let ok = sqlx::query("SELECT 1 FROM clubs WHERE id = $1 AND is_active = true")
            .bind(club_id)
            .fetch_optional(&mut *tx)
            .await?;
        if ok.is_none() {
            return Err(ApiError::validation("invalid_club", "club not found or inactive"));
        }
    }

    let profiles = fetch_profiles(&mut tx, &participant_ids).await?;
    let genders: Vec<&str> = profiles.iter().map(|p| p.gender.as_str()).collect();
    let ladder_code = determine_ladder_from_genders(&genders)?;

    require_ladder_states(&mut tx, ladder_code, &participant_ids).await?;
    let category_id = derive_match_category_id(&mut tx, ladder_code, &participant_ids).await?;

    let deadline = Utc::now() + Duration::hours(config.confirm_window_hours);

    let match_id: Uuid = sqlx::query_scalar(
        "INSERT INTO matches (id, ladder_code, category_id, club_id, played_at, created_by, status, confirmation_deadline, \
         confirmed_count, has_dispute, anti_farming_weight, proposal_count, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'pending_confirm', $7, 0, false, 1.0, 0, now()) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(ladder_code.as_str())
    .bind(category_id)
    .bind(payload.club_id)
    .bind(payload.played_at)
    .bind(creator_id)
    .bind(deadline)
    .fetch_one(&mut *tx)
    .await?;

    for p in &payload.participants {
        sqlx::query("INSERT INTO match_participants (match_id, user_id, team_no) VALUES ($1, $2, $3)")
            .bind(match_id)
            .bind(p.user_id)
            .bind(p.team_no)
            .execute(&mut *tx)
            .await?;
    }

    let score_value = serde_json::to_value(&payload.score).map_err(|e| ApiError::internal(e.to_string()))?;
    sqlx::query("INSERT INTO match_scores (match_id, score_json, winner_team_no) VALUES ($1, $2, $3)")
        .bind(match_id)
        .bind(&score_value)
        .bind(winner_team)
        .execute(&mut *tx)
        .await?;

    for p in &payload.participants {
        if p.user_id == creator_id {
            sqlx::query(
                "INSERT INTO match_confirmations (match_id, user_id, status, decided_at, source) \
                 VALUES ($1, $2, 'confirmed', now(), 'creator')",
            )
            .bind(match_id)
            .bind(p.user_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("INSERT INTO match_confirmations (match_id, user_id, status) VALUES ($1, $2, 'pending')")
                .bind(match_id)
                .bind(p.user_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    sqlx::query("UPDATE matches SET confirmed_count = 1 WHERE id = $1")
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

    audit(
        &mut tx,
        Some(creator_id),
        "match",
        &match_id.to_string(),
        "created",
        json!({
            "ladder_code": ladder_code.as_str(),
            "category_id": category_id,
            "club_id": payload.club_id,
            "participants": participant_ids,
        }),
    )
    .await?;

    tx.commit().await?;
    get_match(pool, match_id).await
}

pub(crate) fn effective_status(status: MatchStatus, confirmation_deadline: chrono::DateTime<Utc>) -> MatchStatus {
    if status == MatchStatus::PendingConfirm && Utc::now() > confirmation_deadline {
        MatchStatus::Expired
    } else {
        status
    }
}

pub async fn get_match(pool: &PgPool, match_id: Uuid) -> ApiResult<MatchOut> {
    let m = sqlx::query_as::<_, Match>(
        "SELECT id, ladder_code, category_id, club_id, played_at, created_by, status, confirmation_deadline, \
         confirmed_count, has_dispute, rank_processed_at, anti_farming_weight, proposed_score_json, \
         proposed_winner_team_no, proposed_by, proposed_at, proposal_count, created_at \
         FROM matches WHERE id = $1",
    )
    .bind(match_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(MatchOut {
        id: m.id,
        ladder_code: m.ladder_code,
        category_id: m.category_id,
        club_id: m.club_id,
        played_at: m.played_at,
        created_by: m.created_by,
        status: effective_status(m.status, m.confirmation_deadline).as_str().to_string(),
        confirmation_deadline: m.confirmation_deadline,
        confirmed_count: m.confirmed_count,
        has_dispute: m.has_dispute,
    })
}

pub async fn match_confirmations(pool: &PgPool, match_id: Uuid, actor: Uuid) -> ApiResult<MatchConfirmationsOut> {
    let mut tx = pool.begin().await?;
    assert_is_participant(&mut tx, match_id, actor).await?;

    let m = sqlx::query("SELECT status, confirmation_deadline, has_dispute FROM matches WHERE id = $1")
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let status: MatchStatus = m.get("status");
    let confirmation_deadline: chrono::DateTime<Utc> = m.get("confirmation_deadline");
    let has_dispute: bool = m.get("has_dispute");
    let status = effective_status(status, confirmation_deadline);

    let rows = sqlx::query(
        "SELECT mp.user_id, up.alias, mp.team_no, COALESCE(mc.status::text, 'pending') as status, mc.decided_at \
         FROM match_participants mp JOIN user_profiles up ON up.user_id = mp.user_id \
         LEFT JOIN match_confirmations mc ON mc.match_id = mp.match_id AND mc.user_id = mp.user_id \
         WHERE mp.match_id = $1 ORDER BY mp.team_no, up.alias",
    )
    .bind(match_id)
    .fetch_all(&mut *tx)
    .await?;

    let confirmed_count = rows.iter().filter(|r| r.get::<String, _>("status") == "confirmed").count() as i32;

    let out_rows = rows
        .iter()
        .map(|r| MatchConfirmationRowOut {
            user_id: r.get("user_id"),
            alias: r.get("alias"),
            team_no: r.get("team_no"),
            status: r.get("status"),
            decided_at: r.get("decided_at"),
        })
        .collect();

    tx.commit().await?;

    Ok(MatchConfirmationsOut {
        match_id,
        status: status.as_str().to_string(),
        confirmation_deadline,
        confirmed_count,
        has_dispute,
        rows: out_rows,
    })
}

pub async fn match_detail(pool: &PgPool, match_id: Uuid, actor: Uuid) -> ApiResult<MatchDetailOut> {
    let mut tx = pool.begin().await?;
    assert_is_participant(&mut tx, match_id, actor).await?;

    let row = sqlx::query(
        "SELECT m.id, m.ladder_code, m.category_id, c.code as category_code, m.club_id, cl.name as club_name, \
         m.played_at, m.created_by, m.status, m.confirmation_deadline, m.confirmed_count, m.has_dispute \
         FROM matches m JOIN categories c ON c.id = m.category_id LEFT JOIN clubs cl ON cl.id = m.club_id \
         WHERE m.id = $1",
    )
    .bind(match_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(ApiError::not_found)?;

    let status: MatchStatus = row.get("status");
    let confirmation_deadline: chrono::DateTime<Utc> = row.get("confirmation_deadline");
    let status = effective_status(status, confirmation_deadline);

    let parts = sqlx::query(
        "SELECT mp.user_id, up.alias, mp.team_no FROM match_participants mp \
         JOIN user_profiles up ON up.user_id = mp.user_id WHERE mp.match_id = $1 ORDER BY mp.team_no, up.alias",
    )
    .bind(match_id)
    .fetch_all(&mut *tx)
    .await?;

    let score = sqlx::query("SELECT score_json, winner_team_no FROM match_scores WHERE match_id = $1")
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::internal("missing match score for existing match"))?;

    tx.commit().await?;

    Ok(MatchDetailOut {
        id: row.get("id"),
        ladder_code: row.get("ladder_code"),
        category_id: row.get("category_id"),
        category_code: row.get("category_code"),
        club_id: row.get("club_id"),
        club_name: row.get("club_name"),
        played_at: row.get("played_at"),
        created_by: row.get("created_by"),
        status: status.as_str().to_string(),
        confirmation_deadline,
        confirmed_count: row.get("confirmed_count"),
        has_dispute: row.get("has_dispute"),
        participants: parts
            .iter()
            .map(|p| MatchParticipantOut { user_id: p.get("user_id"), alias: p.get("alias"), team_no: p.get("team_no") })
            .collect(),
        score: MatchScoreOut { score_json: score.get("score_json"), winner_team_no: score.get("winner_team_no") },
    })
}

pub async fn confirm_match(pool: &PgPool, config: &Config, match_id: Uuid, actor: Uuid, payload: &ConfirmIn) -> ApiResult<Value> {
    if payload.status != "confirmed" {
        return Err(ApiError::validation("invalid_status", "status must be confirmed"));
    }

    let mut tx = pool.begin().await?;
    assert_is_participant(&mut tx, match_id, actor).await?;

    let m = sqlx::query(
        "SELECT status, confirmation_deadline, proposed_score_json, proposal_count FROM matches WHERE id = $1 FOR UPDATE",
    )
    .bind(match_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(ApiError::not_found)?;

    let status: MatchStatus = m.get("status");
    let confirmation_deadline: chrono::DateTime<Utc> = m.get("confirmation_deadline");

    if status == MatchStatus::Expired || status == MatchStatus::Void {
        return Err(ApiError::conflict("not_confirmable", "match is not confirmable"));
    }

    if status == MatchStatus::PendingConfirm && Utc::now() > confirmation_deadline {
        sqlx::query("UPDATE matches SET status = 'expired' WHERE id = $1 AND status = 'pending_confirm'")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        return Err(ApiError::conflict("expired", "confirmation window expired"));
    }

    if status != MatchStatus::PendingConfirm {
        return Err(ApiError::conflict("not_confirmable", "match is not confirmable"));
    }

    let proposed_score_json: Option<Value> = m.get("proposed_score_json");
    let proposal_count: i32 = m.get("proposal_count");

    if let Some(incoming) = &payload.score_json {
        let incoming_value = serde_json::to_value(incoming).map_err(|e| ApiError::internal(e.to_string()))?;
        let active_score: Value = match &proposed_score_json {
            Some(v) => v.clone(),
            None => {
                sqlx::query_scalar("SELECT score_json FROM match_scores WHERE match_id = $1")
                    .bind(match_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        if incoming_value != active_score {
            if proposal_count >= config.max_score_proposals {
                return Err(ApiError::conflict("proposal_limit_reached", "maximum score proposals reached"));
            }
            let derived_winner = validate_score(incoming)?;

            sqlx::query(
                "UPDATE matches SET proposed_score_json = $1, proposed_winner_team_no = $2, proposed_by = $3, \
                 proposed_at = now(), proposal_count = proposal_count + 1 WHERE id = $4",
            )
            .bind(&incoming_value)
            .bind(derived_winner)
            .bind(actor)
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE match_confirmations SET status = 'pending', decided_at = NULL WHERE match_id = $1")
                .bind(match_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE match_confirmations SET status = 'confirmed', decided_at = now(), note = $1, source = $2 \
                 WHERE match_id = $3 AND user_id = $4",
            )
            .bind(&payload.note)
            .bind(&payload.source)
            .bind(match_id)
            .bind(actor)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE matches SET confirmed_count = 1 WHERE id = $1")
                .bind(match_id)
                .execute(&mut *tx)
                .await?;

            audit(&mut tx, Some(actor), "match", &match_id.to_string(), "score_proposed", json!({ "proposal_count": proposal_count + 1 })).await?;

            tx.commit().await?;
            return Ok(json!({ "ok": true, "confirmed_count": 1, "teams_confirmed": 1, "proposed": true }));
        }
    }

    sqlx::query(
        "UPDATE match_confirmations SET status = 'confirmed', decided_at = now(), note = $1, source = $2 \
         WHERE match_id = $3 AND user_id = $4",
    )
    .bind(&payload.note)
    .bind(&payload.source)
    .bind(match_id)
    .bind(actor)
    .execute(&mut *tx)
    .await?;

    let confirmed_count: i64 = sqlx::query_scalar("SELECT count(*) FROM match_confirmations WHERE match_id = $1 AND status = 'confirmed'")
        .bind(match_id)
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query("UPDATE matches SET confirmed_count = $1 WHERE id = $2")
        .bind(confirmed_count as i32)
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

    let teams_confirmed: i64 = sqlx::query_scalar(
        "SELECT count(DISTINCT mp.team_no) FROM match_confirmations mc \
         JOIN match_participants mp ON mp.match_id = mc.match_id AND mp.user_id = mc.user_id \
         WHERE mc.match_id = $1 AND mc.status = 'confirmed'",
    )
    .bind(match_id)
    .fetch_one(&mut *tx)
    .await?;

    if teams_confirmed >= 2 {
        let current_status: MatchStatus =
            sqlx::query_scalar("SELECT status FROM matches WHERE id = $1").bind(match_id).fetch_one(&mut *tx).await?;
        if current_status != MatchStatus::Verified {
            if let Some(proposed) = proposed_score_json {
                let proposed_winner: i16 =
                    sqlx::query_scalar("SELECT proposed_winner_team_no FROM matches WHERE id = $1").bind(match_id).fetch_one(&mut *tx).await?;
                sqlx::query("UPDATE match_scores SET score_json = $1, winner_team_no = $2 WHERE match_id = $3")
                    .bind(&proposed)
                    .bind(proposed_winner)
                    .bind(match_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE matches SET proposed_score_json = NULL, proposed_winner_team_no = NULL, proposed_by = NULL, proposed_at = NULL WHERE id = $1",
                )
                .bind(match_id)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("UPDATE matches SET status = 'verified' WHERE id = $1")
                .bind(match_id)
                .execute(&mut *tx)
                .await?;

            audit(
                &mut tx,
                None,
                "match",
                &match_id.to_string(),
                "verified",
                json!({ "confirmed_count": confirmed_count, "teams_confirmed": teams_confirmed }),
            )
            .await?;

            apply_ranking_for_match(&mut tx, config, match_id).await?;
            audit(&mut tx, Some(actor), "confirmation", &format!("{match_id}:{actor}"), "confirmed", json!({})).await?;
            tx.commit().await?;
            super::analytics_service::apply_verified_match_analytics(pool, match_id).await?;
            return Ok(json!({ "ok": true, "confirmed_count": confirmed_count, "teams_confirmed": teams_confirmed }));
        }
    }

    audit(&mut tx, Some(actor), "confirmation", &format!("{match_id}:{actor}"), "confirmed", json!({})).await?;
    tx.commit().await?;

    Ok(json!({ "ok": true, "confirmed_count": confirmed_count, "teams_confirmed": teams_confirmed }))
}

/// Applies the Elo engine to a freshly verified match. Atomic with
/// ratification (runs in the caller's transaction) and idempotent via
/// `rank_processed_at`.
async fn apply_ranking_for_match(tx: &mut Transaction<'_, Postgres>, config: &Config, match_id: Uuid) -> ApiResult<()> {
    let m = sqlx::query(
        "SELECT ladder_code, category_id, status, has_dispute, rank_processed_at FROM matches WHERE id = $1 FOR UPDATE",
    )
    .bind(match_id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(m) = m else { return Ok(()) };

    let rank_processed_at: Option<chrono::DateTime<Utc>> = m.get("rank_processed_at");
    if rank_processed_at.is_some() {
        return Ok(());
    }
    let status: MatchStatus = m.get("status");
    let has_dispute: bool = m.get("has_dispute");
    if status != MatchStatus::Verified || has_dispute {
        return Ok(());
    }
    let ladder_code: String = m.get("ladder_code");
    let category_id: Uuid = m.get("category_id");

    let score_row = sqlx::query("SELECT score_json, winner_team_no FROM match_scores WHERE match_id = $1")
        .bind(match_id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(score_row) = score_row else { return Ok(()) };
    let winner_team: i16 = score_row.get("winner_team_no");
    let score_json: Value = score_row.get("score_json");
    let score: ScoreJson = serde_json::from_value(score_json).map_err(|e| ApiError::internal(e.to_string()))?;

    let parts = sqlx::query("SELECT user_id, team_no FROM match_participants WHERE match_id = $1 ORDER BY team_no")
        .bind(match_id)
        .fetch_all(&mut **tx)
        .await?;
    if parts.len() != 4 {
        return Ok(());
    }
    let team1_ids: Vec<Uuid> = parts.iter().filter(|p| p.get::<i16, _>("team_no") == 1).map(|p| p.get("user_id")).collect();
    let team2_ids: Vec<Uuid> = parts.iter().filter(|p| p.get::<i16, _>("team_no") == 2).map(|p| p.get("user_id")).collect();
    let all_ids: Vec<Uuid> = team1_ids.iter().chain(team2_ids.iter()).copied().collect();

    let states = sqlx::query(
        "SELECT user_id, rating, verified_matches FROM user_ladder_state WHERE ladder_code = $1 AND user_id = ANY($2) FOR UPDATE",
    )
    .bind(&ladder_code)
    .bind(&all_ids)
    .fetch_all(&mut **tx)
    .await?;

    if states.len() != 4 {
        audit(tx, None, "ranking", &match_id.to_string(), "skipped_missing_ladder_state", json!({ "ladder": ladder_code })).await?;
        return Ok(());
    }

    let rating_of = |uid: Uuid| -> (i32, i32) {
        let row = states.iter().find(|s| s.get::<Uuid, _>("user_id") == uid).unwrap();
        (row.get("rating"), row.get("verified_matches"))
    };

    let t1_rating: f64 = team1_ids.iter().map(|&u| rating_of(u).0 as f64).sum::<f64>() / 2.0;
    let t2_rating: f64 = team2_ids.iter().map(|&u| rating_of(u).0 as f64).sum::<f64>() / 2.0;

    let features = extract_score_features(&score);
    let mov_w = mov_weight_from_features(&features);
    let anti_farming_w = 1.0;
    let weight_total = anti_farming_w * mov_w;

    let k_vals: Vec<i32> = all_ids.iter().map(|&u| k_factor_for(rating_of(u).1)).collect();
    let k_eff = effective_k([k_vals[0], k_vals[1], k_vals[2], k_vals[3]]);

    let elo = compute_elo(t1_rating, t2_rating, winner_team, k_eff, weight_total);

    for (team_ids, delta) in [(team1_ids, elo.delta_team1), (team2_ids, elo.delta_team2)] {
        for uid in team_ids {
            let (old, vm) = rating_of(uid);
            let d = if vm < config.provisional_matches {
                clamp_provisional(delta, config.provisional_cap)
            } else {
                delta
            };
            let new_rating = old + d;
            let new_vm = vm + 1;

            sqlx::query(
                "UPDATE user_ladder_state SET rating = $1, verified_matches = $2, is_provisional = $3, updated_at = now() \
                 WHERE user_id = $4 AND ladder_code = $5",
            )
            .bind(new_rating)
            .bind(new_vm)
            .bind(new_vm < config.provisional_matches)
            .bind(uid)
            .bind(&ladder_code)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                "INSERT INTO rating_events (id, match_id, ladder_code, category_id, user_id, old_rating, new_rating, delta, k_factor, weight, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())",
            )
            .bind(Uuid::new_v4())
            .bind(match_id)
            .bind(&ladder_code)
            .bind(category_id)
            .bind(uid)
            .bind(old)
            .bind(new_rating)
            .bind(d)
            .bind(k_eff)
            .bind(weight_total)
            .execute(&mut **tx)
            .await?;
        }
    }

    sqlx::query("UPDATE matches SET rank_processed_at = now() WHERE id = $1")
        .bind(match_id)
        .execute(&mut **tx)
        .await?;

    audit(
        tx,
        None,
        "ranking",
        &match_id.to_string(),
        "applied",
        json!({
            "k": k_eff,
            "winner_team": winner_team,
            "mov_w": (mov_w * 1000.0).round() / 1000.0,
            "sets_played": features.sets_played,
            "games_margin": features.games_margin,
            "total_games": features.total_games,
        }),
    )
    .await?;

    Ok(())
}

pub async fn dispute_match(pool: &PgPool, match_id: Uuid, actor: Uuid, reason: Option<String>) -> ApiResult<SimpleOkOutLocal> {
    let mut tx = pool.begin().await?;
    assert_is_participant(&mut tx, match_id, actor).await?;

    let status: Option<MatchStatus> = sqlx::query_scalar("SELECT status FROM matches WHERE id = $1 FOR UPDATE")
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?;
    let status = status.ok_or_else(ApiError::not_found)?;
    if status == MatchStatus::Verified && sqlx::query_scalar::<_, Option<chrono::DateTime<Utc>>>(
        "SELECT rank_processed_at FROM matches WHERE id = $1",
    )
    .bind(match_id)
    .fetch_one(&mut *tx)
    .await?
    .is_some()
    {
        return Err(ApiError::conflict("already_ranked", "match has already been ranked"));
    }

    sqlx::query("UPDATE matches SET status = 'disputed', has_dispute = true WHERE id = $1")
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO match_disputes (id, match_id, user_id, reason, status, created_at) VALUES ($1, $2, $3, $4, 'open', now())",
    )
    .bind(Uuid::new_v4())
    .bind(match_id)
    .bind(actor)
    .bind(&reason)
    .execute(&mut *tx)
    .await?;

    audit(&mut tx, Some(actor), "match", &match_id.to_string(), "disputed", json!({ "reason": reason })).await?;
    tx.commit().await?;
    Ok(SimpleOkOutLocal { ok: true })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SimpleOkOutLocal {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn gender_mix_maps_to_correct_ladder() {
        assert_eq!(determine_ladder_from_genders(&["M", "M", "M", "M"]).unwrap(), LadderCode::Hm);
        assert_eq!(determine_ladder_from_genders(&["F", "F", "F", "F"]).unwrap(), LadderCode::Wm);
        assert_eq!(determine_ladder_from_genders(&["M", "M", "F", "F"]).unwrap(), LadderCode::Mx);
    }

    #[test]
    fn lopsided_gender_mix_is_rejected() {
        assert!(determine_ladder_from_genders(&["M", "M", "M", "F"]).is_err());
        assert!(determine_ladder_from_genders(&["M", "F", "F", "F"]).is_err());
    }

    #[test]
    fn effective_status_expires_past_deadline_only_when_still_pending() {
        let past = Utc::now() - Duration::hours(1);
        let future = Utc::now() + Duration::hours(1);

        assert_eq!(effective_status(MatchStatus::PendingConfirm, past), MatchStatus::Expired);
        assert_eq!(effective_status(MatchStatus::PendingConfirm, future), MatchStatus::PendingConfirm);
        assert_eq!(effective_status(MatchStatus::Verified, past), MatchStatus::Verified);
    }
}
