use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    PendingConfirm,
    Verified,
    Disputed,
    Expired,
    Void,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::PendingConfirm => "pending_confirm",
            MatchStatus::Verified => "verified",
            MatchStatus::Disputed => "disputed",
            MatchStatus::Expired => "expired",
            MatchStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub ladder_code: String,
    pub category_id: Uuid,
    pub club_id: Option<Uuid>,
    pub played_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub status: MatchStatus,
    pub confirmation_deadline: DateTime<Utc>,
    pub confirmed_count: i32,
    pub has_dispute: bool,
    pub rank_processed_at: Option<DateTime<Utc>>,
    pub anti_farming_weight: f64,
    pub proposed_score_json: Option<Value>,
    pub proposed_winner_team_no: Option<i16>,
    pub proposed_by: Option<Uuid>,
    pub proposed_at: Option<DateTime<Utc>>,
    pub proposal_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MatchParticipant {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub team_no: i16,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MatchScore {
    pub match_id: Uuid,
    pub score_json: Value,
    pub winner_team_no: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "confirmation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Disputed,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchConfirmation {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub status: ConfirmationStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MatchDispute {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ---- Request/response DTOs ----

#[derive(Debug, Clone, Deserialize)]
pub struct SetScoreIn {
    pub t1: i32,
    pub t2: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreJson {
    pub sets: Vec<SetScoreIn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantIn {
    pub user_id: Uuid,
    pub team_no: i16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchCreateIn {
    pub participants: Vec<ParticipantIn>,
    pub club_id: Option<Uuid>,
    pub played_at: DateTime<Utc>,
    pub score: ScoreJson,
    pub winner_team_no: Option<i16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmIn {
    pub status: String,
    pub note: Option<String>,
    pub source: Option<String>,
    pub score_json: Option<ScoreJson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOut {
    pub id: Uuid,
    pub ladder_code: String,
    pub category_id: Uuid,
    pub club_id: Option<Uuid>,
    pub played_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub status: String,
    pub confirmation_deadline: DateTime<Utc>,
    pub confirmed_count: i32,
    pub has_dispute: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchConfirmationRowOut {
    pub user_id: Uuid,
    pub alias: String,
    pub team_no: i16,
    pub status: String,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchConfirmationsOut {
    pub match_id: Uuid,
    pub status: String,
    pub confirmation_deadline: DateTime<Utc>,
    pub confirmed_count: i32,
    pub has_dispute: bool,
    pub rows: Vec<MatchConfirmationRowOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchParticipantOut {
    pub user_id: Uuid,
    pub alias: String,
    pub team_no: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchScoreOut {
    pub score_json: Value,
    pub winner_team_no: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineRowOut {
    pub match_id: Uuid,
    pub ladder_code: String,
    pub played_at: DateTime<Utc>,
    pub status: String,
    pub status_reason: String,
    pub ranking_impact: bool,
    pub focus_team_no: i16,
    pub winner_team_no: Option<i16>,
    pub rival_aliases: Vec<String>,
    pub created_by_alias: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryParticipantOut {
    pub user_id: Uuid,
    pub alias: String,
    pub team_no: i16,
    pub confirmation_status: String,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDetailOut {
    pub match_id: Uuid,
    pub ladder_code: String,
    pub played_at: DateTime<Utc>,
    pub status: String,
    pub status_reason: String,
    pub ranking_impact: bool,
    pub participants: Vec<HistoryParticipantOut>,
    pub teammate_aliases: Vec<String>,
    pub rival_aliases: Vec<String>,
    pub score: Option<MatchScoreOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchDetailOut {
    pub id: Uuid,
    pub ladder_code: String,
    pub category_id: Uuid,
    pub category_code: String,
    pub club_id: Option<Uuid>,
    pub club_name: Option<String>,
    pub played_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub status: String,
    pub confirmation_deadline: DateTime<Utc>,
    pub confirmed_count: i32,
    pub has_dispute: bool,
    pub participants: Vec<MatchParticipantOut>,
    pub score: MatchScoreOut,
}
