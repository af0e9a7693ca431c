use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RatingEvent {
    pub id: Uuid,
    pub match_id: Uuid,
    pub ladder_code: String,
    pub category_id: Uuid,
    pub user_id: Uuid,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
    pub k_factor: i32,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}
