use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    M,
    F,
    U,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "avatar_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AvatarMode {
    Preset,
    Upload,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub alias: String,
    pub gender: Gender,
    pub is_public: bool,
    pub country: Option<String>,
    pub city: Option<String>,
    pub handedness: Option<String>,
    pub preferred_side: Option<String>,
    pub avatar_mode: Option<AvatarMode>,
    pub avatar_preset_key: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileIn {
    pub alias: Option<String>,
    pub gender: Option<Gender>,
    pub is_public: Option<bool>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub handedness: Option<String>,
    pub preferred_side: Option<String>,
    pub primary_category_code: Option<String>,
}

pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}
