use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "plan_code", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanCode {
    Free,
    RivioPlus,
}

impl PlanCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCode::Free => "free",
            PlanCode::RivioPlus => "rivio_plus",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserEntitlement {
    pub user_id: Uuid,
    pub plan_code: String,
    pub ads_enabled: bool,
    pub activated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCatalogOut {
    pub analytics_kpis: Vec<&'static str>,
    pub analytics_series: Vec<&'static str>,
    pub export_enabled: bool,
    pub ads_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementOut {
    pub plan_code: String,
    pub ads_enabled: bool,
    pub activated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementContractOut {
    pub current: EntitlementOut,
    pub basic: FeatureCatalogOut,
    pub plus: FeatureCatalogOut,
    pub effective: FeatureCatalogOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanCatalogEntryOut {
    pub plan_code: String,
    pub display_name: String,
    pub description: String,
    pub features: FeatureCatalogOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanCatalogOut {
    pub current_plan: String,
    pub plans: Vec<PlanCatalogEntryOut>,
}
