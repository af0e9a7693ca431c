use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The three fixed ladders: men, women, mixed. Stored as the raw code
/// string in the database rather than a Postgres enum so new ladders
/// (never a spec.md concern, but a realistic future need) don't require
/// a type migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadderCode {
    Hm,
    Wm,
    Mx,
}

impl LadderCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LadderCode::Hm => "HM",
            LadderCode::Wm => "WM",
            LadderCode::Mx => "MX",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "HM" => Some(LadderCode::Hm),
            "WM" => Some(LadderCode::Wm),
            "MX" => Some(LadderCode::Mx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub ladder_code: String,
    pub code: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserLadderState {
    pub user_id: Uuid,
    pub ladder_code: String,
    pub category_id: Uuid,
    pub rating: i32,
    pub verified_matches: i32,
    pub is_provisional: bool,
    pub trust_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Static (gender, primary_category_code) -> (mx_code, mx_score) lookup,
/// used to derive a user's MX ladder category/trust mirror when they
/// pick a primary HM/WM category. Seeded data, read-only at runtime.
#[derive(Debug, Clone, FromRow)]
pub struct MxCategoryMap {
    pub gender: String,
    pub primary_code: String,
    pub mx_code: String,
    pub mx_score: i32,
}
