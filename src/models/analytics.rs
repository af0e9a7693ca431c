use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "quality_bucket", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QualityBucket {
    Stronger,
    Similar,
    Weaker,
}

impl QualityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBucket::Stronger => "stronger",
            QualityBucket::Similar => "similar",
            QualityBucket::Weaker => "weaker",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAnalyticsState {
    pub user_id: Uuid,
    pub ladder_code: String,
    pub total_verified_matches: i32,
    pub wins: i32,
    pub losses: i32,
    pub win_rate: f64,
    pub current_streak_type: Option<String>,
    pub current_streak_len: i32,
    pub best_win_streak: i32,
    pub best_loss_streak: i32,
    pub recent_form_bits: i64,
    pub recent_form_size: i32,
    pub recent_10_matches: i32,
    pub recent_10_wins: i32,
    pub recent_10_win_rate: f64,
    pub rolling_bits_50: i64,
    pub rolling_size_50: i32,
    pub rolling_5_win_rate: f64,
    pub rolling_20_win_rate: f64,
    pub rolling_50_win_rate: f64,
    pub matches_7d: i32,
    pub matches_30d: i32,
    pub matches_90d: i32,
    pub close_matches: i32,
    pub close_match_rate: f64,
    pub vs_stronger_matches: i32,
    pub vs_stronger_wins: i32,
    pub vs_stronger_win_rate: f64,
    pub vs_similar_matches: i32,
    pub vs_similar_wins: i32,
    pub vs_similar_win_rate: f64,
    pub vs_weaker_matches: i32,
    pub vs_weaker_wins: i32,
    pub vs_weaker_win_rate: f64,
    pub current_rating: Option<i32>,
    pub peak_rating: Option<i32>,
    pub last_match_id: Option<Uuid>,
    pub last_match_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAnalyticsMatchApplied {
    pub user_id: Uuid,
    pub match_id: Uuid,
    pub ladder_code: String,
    pub is_win: bool,
    pub is_close_match: bool,
    pub teammate_user_id: Option<Uuid>,
    pub opponent_a_user_id: Option<Uuid>,
    pub opponent_b_user_id: Option<Uuid>,
    pub opponent_avg_rating: Option<i32>,
    pub quality_bucket: QualityBucket,
    pub rating_before: Option<i32>,
    pub rating_after: Option<i32>,
    pub rating_delta: Option<i32>,
    pub played_at: DateTime<Utc>,
    pub rolling_10_win_rate: Option<f64>,
    pub rolling_20_win_rate: Option<f64>,
    pub rolling_50_win_rate: Option<f64>,
    pub streak_type_after: Option<String>,
    pub streak_len_after: Option<i32>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAnalyticsPartnerStats {
    pub user_id: Uuid,
    pub ladder_code: String,
    pub partner_user_id: Uuid,
    pub matches: i32,
    pub wins: i32,
    pub losses: i32,
    pub win_rate: f64,
    pub last_played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAnalyticsRivalStats {
    pub user_id: Uuid,
    pub ladder_code: String,
    pub rival_user_id: Uuid,
    pub matches: i32,
    pub wins: i32,
    pub losses: i32,
    pub win_rate: f64,
    pub last_played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsDashboardOut {
    pub state: Option<UserAnalyticsState>,
    pub top_partners: Vec<UserAnalyticsPartnerStats>,
    pub top_rivals: Vec<UserAnalyticsRivalStats>,
}
