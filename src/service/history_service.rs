//! Personal timeline and public verified view, grounded on
//! `app/modules/history/api.py`. Visibility rule: a viewer sees any scope
//! of their own matches; viewing someone else's history is limited to the
//! `verified` scope and only if that profile is public.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};
use crate::models::match_::{HistoryDetailOut, HistoryParticipantOut, Match, MatchConfirmation, MatchParticipant, MatchScore, MatchStatus, MatchScoreOut, TimelineRowOut};
use crate::service::match_service::effective_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineScope {
    Verified,
    Pending,
    All,
}

impl TimelineScope {
    pub fn parse(raw: &str) -> ApiResult<Self> {
        match raw {
            "verified" => Ok(TimelineScope::Verified),
            "pending" => Ok(TimelineScope::Pending),
            "all" => Ok(TimelineScope::All),
            _ => Err(ApiError::validation("invalid_scope", "scope must be verified, pending, or all")),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileVisibility {
    is_public: bool,
}

async fn assert_viewable(pool: &PgPool, viewer: Uuid, target_user: Uuid, scope: TimelineScope) -> ApiResult<()> {
    if viewer == target_user {
        return Ok(());
    }
    if scope != TimelineScope::Verified {
        return Err(ApiError::not_found());
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

fn status_reason(status: MatchStatus, effective: MatchStatus) -> &'static str {
    if status == effective {
        match effective {
            MatchStatus::PendingConfirm => "awaiting_confirmation",
            MatchStatus::Verified => "ratified",
            MatchStatus::Disputed => "disputed",
            MatchStatus::Expired => "expired_at_write",
            MatchStatus::Void => "void",
        }
    } else {
        "expired_past_deadline_unflushed"
    }
}

pub async fn timeline(pool: &PgPool, viewer: Uuid, target_user: Uuid, scope: TimelineScope) -> ApiResult<Vec<TimelineRowOut>> {
    assert_viewable(pool, viewer, target_user, scope).await?;

    let rows = sqlx::query(
        "SELECT m.id as match_id, m.ladder_code, m.played_at, m.status, m.confirmation_deadline, m.rank_processed_at, \
         m.created_by, mp.team_no, ms.winner_team_no, cb.alias as created_by_alias \
         FROM matches m \
         JOIN match_participants mp ON mp.match_id = m.id AND mp.user_id = $1 \
         LEFT JOIN match_scores ms ON ms.match_id = m.id \
         LEFT JOIN user_profiles cb ON cb.user_id = m.created_by \
         ORDER BY m.played_at DESC",
    )
    .bind(target_user)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::new();
    for r in rows {
        let status: MatchStatus = r.get("status");
        let deadline: chrono::DateTime<chrono::Utc> = r.get("confirmation_deadline");
        let effective = effective_status(status, deadline);

        let in_scope = match scope {
            TimelineScope::Verified => effective == MatchStatus::Verified,
            TimelineScope::Pending => effective == MatchStatus::PendingConfirm,
            TimelineScope::All => true,
        };
        if !in_scope {
            continue;
        }

        let match_id: Uuid = r.get("match_id");
        let focus_team_no: i16 = r.get("team_no");
        let winner_team_no: Option<i16> = r.get("winner_team_no");
        let rank_processed_at: Option<chrono::DateTime<chrono::Utc>> = r.get("rank_processed_at");

        let rival_rows = sqlx::query(
            "SELECT up.alias, up.is_public FROM match_participants mp \
             JOIN user_profiles up ON up.user_id = mp.user_id \
             WHERE mp.match_id = $1 AND mp.team_no <> $2",
        )
        .bind(match_id)
        .bind(focus_team_no)
        .fetch_all(pool)
        .await?;

        let rival_aliases: Vec<String> = rival_rows
            .into_iter()
            .map(|rr| {
                let is_public: bool = rr.get("is_public");
                if viewer == target_user || is_public {
                    rr.get::<String, _>("alias")
                } else {
                    "[private]".to_string()
                }
            })
            .collect();

        out.push(TimelineRowOut {
            match_id,
            ladder_code: r.get("ladder_code"),
            played_at: r.get("played_at"),
            status: effective.as_str().to_string(),
            status_reason: status_reason(status, effective).to_string(),
            ranking_impact: effective == MatchStatus::Verified && rank_processed_at.is_some(),
            focus_team_no,
            winner_team_no,
            rival_aliases,
            created_by_alias: r.get("created_by_alias"),
        });
    }

    Ok(out)
}

pub async fn detail(pool: &PgPool, viewer: Uuid, match_id: Uuid) -> ApiResult<HistoryDetailOut> {
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

    let participants = sqlx::query_as::<_, MatchParticipant>("SELECT match_id, user_id, team_no FROM match_participants WHERE match_id = $1")
        .bind(match_id)
        .fetch_all(pool)
        .await?;

    let viewer_participation = participants.iter().find(|p| p.user_id == viewer);
    let effective = effective_status(m.status, m.confirmation_deadline);

    if viewer_participation.is_none() {
        if effective != MatchStatus::Verified {
            return Err(ApiError::not_found());
        }
        let target_is_public: bool = sqlx::query_scalar("SELECT is_public FROM user_profiles WHERE user_id = $1")
            .bind(m.created_by)
            .fetch_optional(pool)
            .await?
            .unwrap_or(false);
        if !target_is_public {
            return Err(ApiError::not_found());
        }
    }

    let focus_team_no = viewer_participation.map(|p| p.team_no);

    let confirmations = sqlx::query_as::<_, MatchConfirmation>(
        "SELECT match_id, user_id, status, decided_at, note, source FROM match_confirmations WHERE match_id = $1",
    )
    .bind(match_id)
    .fetch_all(pool)
    .await?;

    let mut participant_rows = Vec::new();
    let mut teammate_aliases = Vec::new();
    let mut rival_aliases = Vec::new();

    for p in &participants {
        let row = sqlx::query("SELECT alias, gender, is_public FROM user_profiles WHERE user_id = $1")
            .bind(p.user_id)
            .fetch_optional(pool)
            .await?;
        let Some(row) = row else { continue };
        let is_public: bool = row.get("is_public");
        let visible_to_viewer = viewer_participation.is_some() || is_public;
        let alias: String = if visible_to_viewer { row.get("alias") } else { "[private]".to_string() };
        let gender: Option<String> = if viewer_participation.is_some() {
            Some(row.get::<crate::models::profile::Gender, _>("gender").as_str().to_string())
        } else {
            None
        };
        let confirmation_status = confirmations
            .iter()
            .find(|c| c.user_id == p.user_id)
            .map(|c| match c.status {
                crate::models::match_::ConfirmationStatus::Pending => "pending",
                crate::models::match_::ConfirmationStatus::Confirmed => "confirmed",
                crate::models::match_::ConfirmationStatus::Disputed => "disputed",
            })
            .unwrap_or("pending")
            .to_string();

        if let Some(focus) = focus_team_no {
            if p.user_id != viewer {
                if p.team_no == focus {
                    teammate_aliases.push(alias.clone());
                } else {
                    rival_aliases.push(alias.clone());
                }
            }
        }

        participant_rows.push(HistoryParticipantOut { user_id: p.user_id, alias, team_no: p.team_no, confirmation_status, gender });
    }

    let score = sqlx::query_as::<_, MatchScore>("SELECT match_id, score_json, winner_team_no FROM match_scores WHERE match_id = $1")
        .bind(match_id)
        .fetch_optional(pool)
        .await?
        .map(|s| MatchScoreOut { score_json: s.score_json, winner_team_no: s.winner_team_no });

    Ok(HistoryDetailOut {
        match_id: m.id,
        ladder_code: m.ladder_code,
        played_at: m.played_at,
        status: effective.as_str().to_string(),
        status_reason: status_reason(m.status, effective).to_string(),
        ranking_impact: effective == MatchStatus::Verified && m.rank_processed_at.is_some(),
        participants: participant_rows,
        teammate_aliases,
        rival_aliases,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parses_known_values_and_rejects_others() {
        assert!(matches!(TimelineScope::parse("verified"), Ok(TimelineScope::Verified)));
        assert!(matches!(TimelineScope::parse("pending"), Ok(TimelineScope::Pending)));
        assert!(matches!(TimelineScope::parse("all"), Ok(TimelineScope::All)));
        assert!(TimelineScope::parse("bogus").is_err());
    }

    #[test]
    fn status_reason_flags_lazy_expiry_distinctly_from_materialized() {
        assert_eq!(status_reason(MatchStatus::PendingConfirm, MatchStatus::Expired), "expired_past_deadline_unflushed");
        assert_eq!(status_reason(MatchStatus::Expired, MatchStatus::Expired), "expired_at_write");
        assert_eq!(status_reason(MatchStatus::Verified, MatchStatus::Verified), "ratified");
    }
}
