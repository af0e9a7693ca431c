//! Feature-gating catalog and plan projection. Grounded on
//! `app/services/entitlements.py`.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api_error::ApiResult;
use crate::models::entitlement::{EntitlementContractOut, EntitlementOut, FeatureCatalogOut, PlanCatalogEntryOut, PlanCatalogOut, UserEntitlement};
use crate::security::now_utc;

pub const FREE_PLAN: &str = "FREE";
pub const PLUS_PLAN: &str = "RIVIO_PLUS";

fn free_features() -> FeatureCatalogOut {
    FeatureCatalogOut {
        analytics_kpis: vec![
            "total_verified_matches",
            "wins_losses",
            "win_rate",
            "current_streak",
            "current_rating",
            "peak_rating",
            "recent_10_summary",
        ],
        analytics_series: vec!["rating_trend_last_20", "recent_win_rate_last_10"],
        export_enabled: false,
        ads_enabled: true,
    }
}

fn plus_features() -> FeatureCatalogOut {
    FeatureCatalogOut {
        analytics_kpis: vec![
            "total_verified_matches",
            "wins_losses",
            "win_rate",
            "current_streak",
            "best_streaks",
            "current_rating",
            "peak_rating",
            "recent_10_summary",
            "rolling_win_rate_5_20_50",
            "activity_7_30_90",
            "close_matches_rate",
            "performance_vs_stronger_similar_weaker",
        ],
        analytics_series: vec![
            "rating_trend",
            "rolling_win_rate_timeline_10_20_50",
            "volume_week_month",
            "streak_timeline",
            "top_partners",
            "top_rivals",
        ],
        export_enabled: true,
        ads_enabled: false,
    }
}

fn normalize_plan_code(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper == PLUS_PLAN {
        PLUS_PLAN.to_string()
    } else {
        FREE_PLAN.to_string()
    }
}

pub fn plan_features(plan_code: &str) -> FeatureCatalogOut {
    if plan_code == PLUS_PLAN {
        plus_features()
    } else {
        free_features()
    }
}

pub async fn ensure_entitlement_row(pool: &PgPool, user_id: Uuid) -> ApiResult<UserEntitlement> {
    if let Some(row) = sqlx::query_as::<_, UserEntitlement>(
        "SELECT user_id, plan_code, ads_enabled, activated_at, expires_at FROM user_entitlements WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    {
        return Ok(row);
    }

    sqlx::query("INSERT INTO user_entitlements (user_id, plan_code, ads_enabled) VALUES ($1, 'FREE', true) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let row = sqlx::query_as::<_, UserEntitlement>(
        "SELECT user_id, plan_code, ads_enabled, activated_at, expires_at FROM user_entitlements WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.unwrap_or(UserEntitlement {
        user_id,
        plan_code: FREE_PLAN.to_string(),
        ads_enabled: true,
        activated_at: now_utc(),
        expires_at: None,
    }))
}

pub fn resolve_effective_plan(row: &UserEntitlement) -> String {
    let plan_code = normalize_plan_code(&row.plan_code);
    if let Some(expires_at) = row.expires_at {
        if Utc::now() > expires_at {
            return FREE_PLAN.to_string();
        }
    }
    plan_code
}

pub fn entitlement_out(row: &UserEntitlement, effective_plan: &str) -> EntitlementOut {
    let plan_code = normalize_plan_code(effective_plan);
    let ads_enabled = if plan_code == PLUS_PLAN { false } else { row.ads_enabled };
    EntitlementOut { plan_code, ads_enabled, activated_at: row.activated_at, expires_at: row.expires_at }
}

pub async fn get_user_contract(pool: &PgPool, user_id: Uuid) -> ApiResult<EntitlementContractOut> {
    let row = ensure_entitlement_row(pool, user_id).await?;
    let effective_plan = resolve_effective_plan(&row);
    let current = entitlement_out(&row, &effective_plan);
    Ok(EntitlementContractOut { current, basic: free_features(), plus: plus_features(), effective: plan_features(&effective_plan) })
}

pub fn get_plan_catalog(current_plan: &str) -> PlanCatalogOut {
    PlanCatalogOut {
        current_plan: normalize_plan_code(current_plan),
        plans: vec![
            PlanCatalogEntryOut {
                plan_code: FREE_PLAN.to_string(),
                display_name: "Rivio".to_string(),
                description: "Plan base con estadisticas esenciales y anuncios.".to_string(),
                features: free_features(),
            },
            PlanCatalogEntryOut {
                plan_code: PLUS_PLAN.to_string(),
                display_name: "Rivio+".to_string(),
                description: "Plan premium con analitica avanzada, exportaciones y sin anuncios.".to_string(),
                features: plus_features(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_effective_plan_falls_back_to_free_past_expiry() {
        let row = UserEntitlement {
            user_id: Uuid::new_v4(),
            plan_code: PLUS_PLAN.to_string(),
            ads_enabled: false,
            activated_at: now_utc(),
            expires_at: Some(now_utc() - chrono::Duration::days(1)),
        };
        assert_eq!(resolve_effective_plan(&row), FREE_PLAN);
    }

    #[test]
    fn resolve_effective_plan_keeps_plus_before_expiry() {
        let row = UserEntitlement {
            user_id: Uuid::new_v4(),
            plan_code: PLUS_PLAN.to_string(),
            ads_enabled: false,
            activated_at: now_utc(),
            expires_at: Some(now_utc() + chrono::Duration::days(1)),
        };
        assert_eq!(resolve_effective_plan(&row), PLUS_PLAN);
    }

    #[test]
    fn unknown_plan_code_normalizes_to_free() {
        let row = UserEntitlement { user_id: Uuid::new_v4(), plan_code: "bogus".to_string(), ads_enabled: true, activated_at: now_utc(), expires_at: None };
        assert_eq!(resolve_effective_plan(&row), FREE_PLAN);
    }
}
