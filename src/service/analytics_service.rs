//! Incremental analytics projector. Grounded on `app/services/analytics.py`:
//! same bit-packed recent/rolling form, same partner/rival upserts, same
//! idempotency fence via `UserAnalyticsMatchApplied(user_id, match_id)`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::models::analytics::{AnalyticsDashboardOut, QualityBucket, UserAnalyticsPartnerStats, UserAnalyticsRivalStats, UserAnalyticsState};

const MAX_RECENT_FORM: u32 = 20;
const MAX_ROLLING_FORM: u32 = 50;
const RIVAL_BUCKET_DELTA: i32 = 75;

fn pct(part: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        ((part as f64) * 100.0 / (total as f64) * 100.0).round() / 100.0
    }
}

fn quality_bucket(self_old: Option<i32>, opponent_avg: Option<i32>) -> QualityBucket {
    match (self_old, opponent_avg) {
        (Some(self_old), Some(opp)) => {
            let diff = opp - self_old;
            if diff >= RIVAL_BUCKET_DELTA {
                QualityBucket::Stronger
            } else if diff <= -RIVAL_BUCKET_DELTA {
                QualityBucket::Weaker
            } else {
                QualityBucket::Similar
            }
        }
        _ => QualityBucket::Similar,
    }
}

struct ParticipantResult {
    user_id: Uuid,
    team_no: i16,
    is_win: bool,
}

struct VerifiedMatchContext {
    match_id: Uuid,
    ladder_code: String,
    played_at: DateTime<Utc>,
    is_close_match: bool,
    participants: Vec<ParticipantResult>,
}

#[derive(Default, Clone, Copy)]
struct RatingMeta {
    old_rating: Option<i32>,
    new_rating: Option<i32>,
    delta: Option<i32>,
}

async fn load_verified_match_context(tx: &mut Transaction<'_, Postgres>, match_id: Uuid) -> ApiResult<Option<VerifiedMatchContext>> {
    let rows = sqlx::query(
        "SELECT m.id as match_id, m.ladder_code, m.played_at, ms.winner_team_no, ms.score_json, mp.user_id, mp.team_no \
         FROM matches m JOIN match_scores ms ON ms.match_id = m.id JOIN match_participants mp ON mp.match_id = m.id \
         WHERE m.id = $1 AND m.status = 'verified' ORDER BY mp.team_no, mp.user_id",
    )
    .bind(match_id)
    .fetch_all(&mut **tx)
    .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let winner_team_no: i16 = rows[0].get("winner_team_no");
    let score_json: serde_json::Value = rows[0].get("score_json");
    let sets_len = score_json.get("sets").and_then(|s| s.as_array()).map(|a| a.len()).unwrap_or(0);
    let is_close_match = sets_len >= 3;
    let ladder_code: String = rows[0].get("ladder_code");
    let played_at: DateTime<Utc> = rows[0].get("played_at");

    let participants = rows
        .iter()
        .map(|r| {
            let team_no: i16 = r.get("team_no");
            ParticipantResult { user_id: r.get("user_id"), team_no, is_win: team_no == winner_team_no }
        })
        .collect();

    Ok(Some(VerifiedMatchContext { match_id, ladder_code, played_at, is_close_match, participants }))
}

async fn load_rating_map(
    tx: &mut Transaction<'_, Postgres>,
    match_id: Uuid,
    ladder_code: &str,
    participant_ids: &[Uuid],
) -> ApiResult<HashMap<Uuid, RatingMeta>> {
    let rows = sqlx::query(
        "SELECT user_id, old_rating, new_rating, delta FROM rating_events \
         WHERE match_id = $1 AND ladder_code = $2 AND user_id = ANY($3)",
    )
    .bind(match_id)
    .bind(ladder_code)
    .bind(participant_ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut out: HashMap<Uuid, RatingMeta> = rows
        .into_iter()
        .map(|r| {
            let user_id: Uuid = r.get("user_id");
            (
                user_id,
                RatingMeta { old_rating: r.get("old_rating"), new_rating: r.get("new_rating"), delta: r.get("delta") },
            )
        })
        .collect();

    let missing: Vec<Uuid> = participant_ids.iter().filter(|id| !out.contains_key(id)).copied().collect();
    if !missing.is_empty() {
        let state_rows = sqlx::query("SELECT user_id, rating FROM user_ladder_state WHERE ladder_code = $1 AND user_id = ANY($2)")
            .bind(ladder_code)
            .bind(&missing)
            .fetch_all(&mut **tx)
            .await?;
        for r in state_rows {
            let user_id: Uuid = r.get("user_id");
            let rating: i32 = r.get("rating");
            out.insert(user_id, RatingMeta { old_rating: Some(rating), new_rating: Some(rating), delta: Some(0) });
        }
        for id in missing {
            out.entry(id).or_insert(RatingMeta { old_rating: None, new_rating: None, delta: None });
        }
    }
    Ok(out)
}

async fn upsert_partner_stats(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    ladder_code: &str,
    partner_user_id: Option<Uuid>,
    is_win: bool,
    played_at: DateTime<Utc>,
) -> ApiResult<()> {
    let Some(partner_user_id) = partner_user_id else { return Ok(()) };
    let wins = if is_win { 1 } else { 0 };
    let losses = if is_win { 0 } else { 1 };
    sqlx::query(
        "INSERT INTO user_analytics_partner_stats (user_id, ladder_code, partner_user_id, matches, wins, losses, win_rate, last_played_at, updated_at) \
         VALUES ($1, $2, $3, 1, $4, $5, $6, $7, now()) \
         ON CONFLICT (user_id, ladder_code, partner_user_id) DO UPDATE SET \
         matches = user_analytics_partner_stats.matches + 1, \
         wins = user_analytics_partner_stats.wins + $4, \
         losses = user_analytics_partner_stats.losses + $5, \
         win_rate = ROUND(((user_analytics_partner_stats.wins + $4) * 100.0) / (user_analytics_partner_stats.matches + 1), 2), \
         last_played_at = GREATEST(COALESCE(user_analytics_partner_stats.last_played_at, $7), $7), \
         updated_at = now()",
    )
    .bind(user_id)
    .bind(ladder_code)
    .bind(partner_user_id)
    .bind(wins)
    .bind(losses)
    .bind(pct(wins, 1))
    .bind(played_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_rival_stats(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    ladder_code: &str,
    rival_user_id: Uuid,
    is_win: bool,
    played_at: DateTime<Utc>,
) -> ApiResult<()> {
    let wins = if is_win { 1 } else { 0 };
    let losses = if is_win { 0 } else { 1 };
    sqlx::query(
        "INSERT INTO user_analytics_rival_stats (user_id, ladder_code, rival_user_id, matches, wins, losses, win_rate, last_played_at, updated_at) \
         VALUES ($1, $2, $3, 1, $4, $5, $6, $7, now()) \
         ON CONFLICT (user_id, ladder_code, rival_user_id) DO UPDATE SET \
         matches = user_analytics_rival_stats.matches + 1, \
         wins = user_analytics_rival_stats.wins + $4, \
         losses = user_analytics_rival_stats.losses + $5, \
         win_rate = ROUND(((user_analytics_rival_stats.wins + $4) * 100.0) / (user_analytics_rival_stats.matches + 1), 2), \
         last_played_at = GREATEST(COALESCE(user_analytics_rival_stats.last_played_at, $7), $7), \
         updated_at = now()",
    )
    .bind(user_id)
    .bind(ladder_code)
    .bind(rival_user_id)
    .bind(wins)
    .bind(losses)
    .bind(pct(wins, 1))
    .bind(played_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn load_activity_windows(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    ladder_code: &str,
    played_at: DateTime<Utc>,
) -> ApiResult<(i32, i32, i32)> {
    let cut_7 = played_at - Duration::days(7);
    let cut_30 = played_at - Duration::days(30);
    let cut_90 = played_at - Duration::days(90);
    let row = sqlx::query(
        "SELECT \
         count(*) FILTER (WHERE played_at >= $3 AND played_at <= $2) as c7, \
         count(*) FILTER (WHERE played_at >= $4 AND played_at <= $2) as c30, \
         count(*) FILTER (WHERE played_at >= $5 AND played_at <= $2) as c90 \
         FROM user_analytics_match_applied WHERE user_id = $1 AND ladder_code = $6 AND played_at <= $2",
    )
    .bind(user_id)
    .bind(played_at)
    .bind(cut_7)
    .bind(cut_30)
    .bind(cut_90)
    .bind(ladder_code)
    .fetch_one(&mut **tx)
    .await?;
    Ok((row.get::<i64, _>("c7") as i32, row.get::<i64, _>("c30") as i32, row.get::<i64, _>("c90") as i32))
}

#[allow(clippy::too_many_arguments)]
async fn apply_participant_result(
    tx: &mut Transaction<'_, Postgres>,
    match_id: Uuid,
    ladder_code: &str,
    played_at: DateTime<Utc>,
    user_id: Uuid,
    is_win: bool,
    is_close_match: bool,
    teammate_user_id: Option<Uuid>,
    opponent_user_ids: &[Uuid],
    opponent_avg_rating: Option<i32>,
    quality: QualityBucket,
    rating_before: Option<i32>,
    rating_after: Option<i32>,
    rating_delta: Option<i32>,
    enforce_idempotency: bool,
) -> ApiResult<()> {
    let opp_a = opponent_user_ids.first().copied();
    let opp_b = opponent_user_ids.get(1).copied();

    if enforce_idempotency {
        let inserted = sqlx::query(
            "INSERT INTO user_analytics_match_applied \
             (user_id, match_id, ladder_code, is_win, is_close_match, teammate_user_id, opponent_a_user_id, opponent_b_user_id, \
              opponent_avg_rating, quality_bucket, rating_before, rating_after, rating_delta, played_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (user_id, match_id) DO NOTHING RETURNING 1",
        )
        .bind(user_id)
        .bind(match_id)
        .bind(ladder_code)
        .bind(is_win)
        .bind(is_close_match)
        .bind(teammate_user_id)
        .bind(opp_a)
        .bind(opp_b)
        .bind(opponent_avg_rating)
        .bind(quality)
        .bind(rating_before)
        .bind(rating_after)
        .bind(rating_delta)
        .bind(played_at)
        .fetch_optional(&mut **tx)
        .await?;
        if inserted.is_none() {
            return Ok(());
        }
    } else {
        sqlx::query(
            "INSERT INTO user_analytics_match_applied \
             (user_id, match_id, ladder_code, is_win, is_close_match, teammate_user_id, opponent_a_user_id, opponent_b_user_id, \
              opponent_avg_rating, quality_bucket, rating_before, rating_after, rating_delta, played_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (user_id, match_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(match_id)
        .bind(ladder_code)
        .bind(is_win)
        .bind(is_close_match)
        .bind(teammate_user_id)
        .bind(opp_a)
        .bind(opp_b)
        .bind(opponent_avg_rating)
        .bind(quality)
        .bind(rating_before)
        .bind(rating_after)
        .bind(rating_delta)
        .bind(played_at)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query("INSERT INTO user_analytics_state (user_id, ladder_code) VALUES ($1, $2) ON CONFLICT (user_id, ladder_code) DO NOTHING")
        .bind(user_id)
        .bind(ladder_code)
        .execute(&mut **tx)
        .await?;

    let st = sqlx::query_as::<_, UserAnalyticsState>(
        "SELECT * FROM user_analytics_state WHERE user_id = $1 AND ladder_code = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(ladder_code)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(st) = st else { return Ok(()) };

    let total = st.total_verified_matches as i64 + 1;
    let wins = st.wins as i64 + if is_win { 1 } else { 0 };
    let losses = st.losses as i64 + if is_win { 0 } else { 1 };
    let win_rate = pct(wins, total);

    let new_type = if is_win { "W" } else { "L" };
    let prev_len = st.current_streak_len;
    let streak_len = if st.current_streak_type.as_deref() == Some(new_type) && prev_len > 0 { prev_len + 1 } else { 1 };
    let mut best_win = st.best_win_streak;
    let mut best_loss = st.best_loss_streak;
    if new_type == "W" {
        best_win = best_win.max(streak_len);
    } else {
        best_loss = best_loss.max(streak_len);
    }

    let recent_mask = (1i64 << MAX_RECENT_FORM) - 1;
    let new_recent_bits = ((st.recent_form_bits << 1) | (is_win as i64)) & recent_mask;
    let new_recent_size = (st.recent_form_size + 1).min(MAX_RECENT_FORM as i32);

    let roll_mask = (1i64 << MAX_ROLLING_FORM) - 1;
    let new_roll_bits = ((st.rolling_bits_50 << 1) | (is_win as i64)) & roll_mask;
    let new_roll_size = (st.rolling_size_50 + 1).min(MAX_ROLLING_FORM as i32);

    let recent_10_matches = new_recent_size.min(10);
    let recent_10_wins = popcount_window(new_recent_bits, recent_10_matches);
    let recent_10_win_rate = pct(recent_10_wins as i64, recent_10_matches as i64);

    let roll_5_n = new_roll_size.min(5);
    let rolling_5_win_rate = pct(popcount_window(new_roll_bits, roll_5_n) as i64, roll_5_n as i64);

    let roll_20_n = new_roll_size.min(20);
    let rolling_20_win_rate = pct(popcount_window(new_roll_bits, roll_20_n) as i64, roll_20_n as i64);

    let roll_50_n = new_roll_size.min(50);
    let rolling_50_win_rate = pct(popcount_window(new_roll_bits, roll_50_n) as i64, roll_50_n as i64);

    let close_matches = st.close_matches + if is_close_match { 1 } else { 0 };
    let close_match_rate = pct(close_matches as i64, total);

    let mut vs_stronger_matches = st.vs_stronger_matches;
    let mut vs_stronger_wins = st.vs_stronger_wins;
    let mut vs_similar_matches = st.vs_similar_matches;
    let mut vs_similar_wins = st.vs_similar_wins;
    let mut vs_weaker_matches = st.vs_weaker_matches;
    let mut vs_weaker_wins = st.vs_weaker_wins;
    match quality {
        QualityBucket::Stronger => {
            vs_stronger_matches += 1;
            vs_stronger_wins += is_win as i32;
        }
        QualityBucket::Weaker => {
            vs_weaker_matches += 1;
            vs_weaker_wins += is_win as i32;
        }
        QualityBucket::Similar => {
            vs_similar_matches += 1;
            vs_similar_wins += is_win as i32;
        }
    }
    let vs_stronger_win_rate = pct(vs_stronger_wins as i64, vs_stronger_matches as i64);
    let vs_similar_win_rate = pct(vs_similar_wins as i64, vs_similar_matches as i64);
    let vs_weaker_win_rate = pct(vs_weaker_wins as i64, vs_weaker_matches as i64);

    let (matches_7d, matches_30d, matches_90d) = load_activity_windows(tx, user_id, ladder_code, played_at).await?;

    let mut current_rating = rating_after;
    if current_rating.is_none() {
        current_rating = sqlx::query_scalar("SELECT rating FROM user_ladder_state WHERE user_id = $1 AND ladder_code = $2")
            .bind(user_id)
            .bind(ladder_code)
            .fetch_optional(&mut **tx)
            .await?;
    }
    let peak_rating = match (st.peak_rating, current_rating) {
        (Some(p), Some(c)) => Some(p.max(c)),
        (None, Some(c)) => Some(c),
        (p, None) => p,
    };

    sqlx::query(
        "UPDATE user_analytics_state SET \
         total_verified_matches=$1, wins=$2, losses=$3, win_rate=$4, current_streak_type=$5, current_streak_len=$6, \
         best_win_streak=$7, best_loss_streak=$8, recent_form_bits=$9, recent_form_size=$10, \
         recent_10_matches=$11, recent_10_wins=$12, recent_10_win_rate=$13, rolling_bits_50=$14, rolling_size_50=$15, \
         rolling_5_win_rate=$16, rolling_20_win_rate=$17, rolling_50_win_rate=$18, matches_7d=$19, matches_30d=$20, matches_90d=$21, \
         close_matches=$22, close_match_rate=$23, vs_stronger_matches=$24, vs_stronger_wins=$25, vs_stronger_win_rate=$26, \
         vs_similar_matches=$27, vs_similar_wins=$28, vs_similar_win_rate=$29, vs_weaker_matches=$30, vs_weaker_wins=$31, vs_weaker_win_rate=$32, \
         current_rating=$33, peak_rating=$34, last_match_id=$35, last_match_at=$36, updated_at=now() \
         WHERE user_id=$37 AND ladder_code=$38",
    )
    .bind(total as i32)
    .bind(wins as i32)
    .bind(losses as i32)
    .bind(win_rate)
    .bind(new_type)
    .bind(streak_len)
    .bind(best_win)
    .bind(best_loss)
    .bind(new_recent_bits)
    .bind(new_recent_size)
    .bind(recent_10_matches)
    .bind(recent_10_wins)
    .bind(recent_10_win_rate)
    .bind(new_roll_bits)
    .bind(new_roll_size)
    .bind(rolling_5_win_rate)
    .bind(rolling_20_win_rate)
    .bind(rolling_50_win_rate)
    .bind(matches_7d)
    .bind(matches_30d)
    .bind(matches_90d)
    .bind(close_matches)
    .bind(close_match_rate)
    .bind(vs_stronger_matches)
    .bind(vs_stronger_wins)
    .bind(vs_stronger_win_rate)
    .bind(vs_similar_matches)
    .bind(vs_similar_wins)
    .bind(vs_similar_win_rate)
    .bind(vs_weaker_matches)
    .bind(vs_weaker_wins)
    .bind(vs_weaker_win_rate)
    .bind(current_rating)
    .bind(peak_rating)
    .bind(match_id)
    .bind(played_at)
    .bind(user_id)
    .bind(ladder_code)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE user_analytics_match_applied SET rolling_10_win_rate=$1, rolling_20_win_rate=$2, rolling_50_win_rate=$3, \
         streak_type_after=$4, streak_len_after=$5 WHERE user_id=$6 AND match_id=$7",
    )
    .bind(recent_10_win_rate)
    .bind(rolling_20_win_rate)
    .bind(rolling_50_win_rate)
    .bind(new_type)
    .bind(streak_len)
    .bind(user_id)
    .bind(match_id)
    .execute(&mut **tx)
    .await?;

    upsert_partner_stats(tx, user_id, ladder_code, teammate_user_id, is_win, played_at).await?;
    let mut rivals: Vec<Uuid> = opponent_user_ids.to_vec();
    rivals.sort();
    rivals.dedup();
    for rival in rivals {
        upsert_rival_stats(tx, user_id, ladder_code, rival, is_win, played_at).await?;
    }

    Ok(())
}

fn popcount_window(bits: i64, n: i32) -> i32 {
    if n <= 0 {
        return 0;
    }
    let mask = (1i64 << n) - 1;
    (bits & mask).count_ones() as i32
}

pub async fn apply_verified_match_analytics(pool: &PgPool, match_id: Uuid) -> ApiResult<()> {
    let mut tx = pool.begin().await?;
    let Some(ctx) = load_verified_match_context(&mut tx, match_id).await? else {
        return Ok(());
    };
    run_projection(&mut tx, &ctx, true).await?;
    tx.commit().await?;
    Ok(())
}

async fn run_projection(tx: &mut Transaction<'_, Postgres>, ctx: &VerifiedMatchContext, enforce_idempotency: bool) -> ApiResult<()> {
    let participant_ids: Vec<Uuid> = ctx.participants.iter().map(|p| p.user_id).collect();
    let ratings = load_rating_map(tx, ctx.match_id, &ctx.ladder_code, &participant_ids).await?;

    let mut by_team: HashMap<i16, Vec<Uuid>> = HashMap::new();
    for p in &ctx.participants {
        by_team.entry(p.team_no).or_default().push(p.user_id);
    }

    for p in &ctx.participants {
        let teammates: Vec<Uuid> = by_team.get(&p.team_no).into_iter().flatten().filter(|&&u| u != p.user_id).copied().collect();
        let opponents: Vec<Uuid> = by_team
            .iter()
            .filter(|(&tno, _)| tno != p.team_no)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        let opp_old: Vec<i32> = opponents.iter().filter_map(|u| ratings.get(u).and_then(|m| m.old_rating)).collect();
        let opp_avg = if opp_old.is_empty() {
            None
        } else {
            Some((opp_old.iter().sum::<i32>() as f64 / opp_old.len() as f64).round() as i32)
        };
        let self_meta = ratings.get(&p.user_id).copied().unwrap_or_default();
        let quality = quality_bucket(self_meta.old_rating, opp_avg);

        apply_participant_result(
            tx,
            ctx.match_id,
            &ctx.ladder_code,
            ctx.played_at,
            p.user_id,
            p.is_win,
            ctx.is_close_match,
            teammates.first().copied(),
            &opponents[..opponents.len().min(2)],
            opp_avg,
            quality,
            self_meta.old_rating,
            self_meta.new_rating,
            self_meta.delta,
            enforce_idempotency,
        )
        .await?;
    }
    Ok(())
}

/// Truncates all four analytics tables and replays every verified match in
/// `(played_at, created_at, id)` order, reusing the incremental function
/// with idempotency disabled.
pub async fn rebuild_analytics(pool: &PgPool) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_analytics_rival_stats").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM user_analytics_partner_stats").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM user_analytics_match_applied").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM user_analytics_state").execute(&mut *tx).await?;

    let rows = sqlx::query(
        "SELECT m.id as match_id, m.ladder_code, m.played_at, ms.winner_team_no, ms.score_json, mp.user_id, mp.team_no \
         FROM matches m JOIN match_scores ms ON ms.match_id = m.id JOIN match_participants mp ON mp.match_id = m.id \
         WHERE m.status = 'verified' ORDER BY m.played_at, m.created_at, m.id, mp.team_no, mp.user_id",
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut grouped: indexmap_like::OrderedMap<Uuid, VerifiedMatchContext> = indexmap_like::OrderedMap::new();
    for r in rows {
        let match_id: Uuid = r.get("match_id");
        let winner_team_no: i16 = r.get("winner_team_no");
        let score_json: serde_json::Value = r.get("score_json");
        let sets_len = score_json.get("sets").and_then(|s| s.as_array()).map(|a| a.len()).unwrap_or(0);
        let team_no: i16 = r.get("team_no");
        let entry = grouped.entry(match_id).or_insert_with(|| VerifiedMatchContext {
            match_id,
            ladder_code: r.get("ladder_code"),
            played_at: r.get("played_at"),
            is_close_match: sets_len >= 3,
            participants: Vec::new(),
        });
        entry.participants.push(ParticipantResult { user_id: r.get("user_id"), team_no, is_win: team_no == winner_team_no });
    }

    for ctx in grouped.into_values() {
        run_projection(&mut tx, &ctx, false).await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_state(pool: &PgPool, user_id: Uuid, ladder_code: &str) -> ApiResult<Option<UserAnalyticsState>> {
    let row = sqlx::query_as::<_, UserAnalyticsState>("SELECT * FROM user_analytics_state WHERE user_id = $1 AND ladder_code = $2")
        .bind(user_id)
        .bind(ladder_code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn dashboard(pool: &PgPool, user_id: Uuid, ladder_code: &str) -> ApiResult<AnalyticsDashboardOut> {
    let state = get_state(pool, user_id, ladder_code).await?;
    let top_partners = sqlx::query_as::<_, UserAnalyticsPartnerStats>(
        "SELECT * FROM user_analytics_partner_stats WHERE user_id = $1 AND ladder_code = $2 ORDER BY matches DESC LIMIT 5",
    )
    .bind(user_id)
    .bind(ladder_code)
    .fetch_all(pool)
    .await?;
    let top_rivals = sqlx::query_as::<_, UserAnalyticsRivalStats>(
        "SELECT * FROM user_analytics_rival_stats WHERE user_id = $1 AND ladder_code = $2 ORDER BY matches DESC LIMIT 5",
    )
    .bind(user_id)
    .bind(ladder_code)
    .fetch_all(pool)
    .await?;
    Ok(AnalyticsDashboardOut { state, top_partners, top_rivals })
}

const ALL_LADDERS: [&str; 3] = ["HM", "WM", "MX"];

/// Per-ladder state list for `user_id`, filtered to `ladder` if given,
/// else every ladder the user has a row for.
pub async fn list_states(pool: &PgPool, user_id: Uuid, ladder: Option<&str>) -> ApiResult<Vec<UserAnalyticsState>> {
    let mut out = Vec::new();
    match ladder {
        Some(code) => {
            if let Some(state) = get_state(pool, user_id, code).await? {
                out.push(state);
            }
        }
        None => {
            for code in ALL_LADDERS {
                if let Some(state) = get_state(pool, user_id, code).await? {
                    out.push(state);
                }
            }
        }
    }
    Ok(out)
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileVisibility {
    is_public: bool,
}

async fn assert_target_visible(pool: &PgPool, viewer: Uuid, target_user: Uuid) -> ApiResult<()> {
    if viewer == target_user {
        return Ok(());
    }
    let profile = sqlx::query_as::<_, ProfileVisibility>("SELECT is_public FROM user_profiles WHERE user_id = $1")
        .bind(target_user)
        .fetch_optional(pool)
        .await?;
    match profile {
        Some(p) if p.is_public => Ok(()),
        _ => Err(ApiError::not_found()),
    }
}

/// Public counterpart of [`list_states`]: visible to any authenticated
/// viewer when `target_user`'s profile is public, or to the target
/// themselves regardless of visibility.
pub async fn list_states_public(
    pool: &PgPool,
    viewer: Uuid,
    target_user: Uuid,
    ladder: Option<&str>,
) -> ApiResult<Vec<UserAnalyticsState>> {
    assert_target_visible(pool, viewer, target_user).await?;
    list_states(pool, target_user, ladder).await
}

/// Minimal insertion-ordered map so `rebuild_analytics` replays matches in
/// the order they were queried without pulling in a dedicated crate for it.
mod indexmap_like {
    use std::collections::HashMap;
    use std::hash::Hash;

    pub struct OrderedMap<K, V> {
        order: Vec<K>,
        map: HashMap<K, V>,
    }

    impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
        pub fn new() -> Self {
            Self { order: Vec::new(), map: HashMap::new() }
        }

        pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
            if !self.map.contains_key(&key) {
                self.order.push(key.clone());
            }
            Entry { map: &mut self.map, key }
        }

        pub fn into_values(self) -> impl Iterator<Item = V> {
            let mut map = self.map;
            self.order.into_iter().filter_map(move |k| map.remove(&k))
        }
    }

    pub struct Entry<'a, K, V> {
        map: &'a mut HashMap<K, V>,
        key: K,
    }

    impl<'a, K: Eq + Hash + Clone, V> Entry<'a, K, V> {
        pub fn or_insert_with(self, f: impl FnOnce() -> V) -> &'a mut V {
            self.map.entry(self.key).or_insert_with(f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_bucket_thresholds() {
        assert_eq!(quality_bucket(Some(1000), Some(1080)), QualityBucket::Stronger);
        assert_eq!(quality_bucket(Some(1000), Some(920)), QualityBucket::Weaker);
        assert_eq!(quality_bucket(Some(1000), Some(1050)), QualityBucket::Similar);
        assert_eq!(quality_bucket(None, None), QualityBucket::Similar);
    }

    #[test]
    fn popcount_window_counts_only_masked_bits() {
        // 0b1011 with window 3 should only look at the low 3 bits (0b011 = 2 ones)
        assert_eq!(popcount_window(0b1011, 3), 2);
        assert_eq!(popcount_window(0b1011, 4), 3);
        assert_eq!(popcount_window(0, 5), 0);
    }

    #[test]
    fn pct_rounds_to_two_decimals() {
        assert_eq!(pct(1, 3), 33.33);
        assert_eq!(pct(0, 0), 0.0);
    }
}
