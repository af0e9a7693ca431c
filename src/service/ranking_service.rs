//! Scoped leaderboard reads. Grounded on `app/modules/rankings/api.py`'s
//! rankings query — join of `UserLadderState` and `UserProfile` filtered to
//! public profiles, ordered by rating desc then verified_matches desc.

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::api_error::{ApiError, ApiResult};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RankingRow {
    pub user_id: Uuid,
    pub alias: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub rating: i32,
    pub verified_matches: i32,
    pub is_provisional: bool,
}

pub async fn rankings(
    pool: &PgPool,
    ladder_code: &str,
    category_id: Uuid,
    country: Option<&str>,
    city: Option<&str>,
) -> ApiResult<Vec<RankingRow>> {
    if city.is_some() && country.is_none() {
        return Err(ApiError::validation("city_requires_country", "city filter requires country"));
    }

    let rows = sqlx::query_as::<_, RankingRow>(
        "SELECT uls.user_id, up.alias, up.country, up.city, uls.rating, uls.verified_matches, uls.is_provisional \
         FROM user_ladder_state uls \
         JOIN user_profiles up ON up.user_id = uls.user_id \
         WHERE uls.ladder_code = $1 AND uls.category_id = $2 AND up.is_public = true \
         AND ($3::text IS NULL OR up.country = $3) \
         AND ($4::text IS NULL OR lower(up.city) = lower($4)) \
         ORDER BY uls.rating DESC, uls.verified_matches DESC \
         LIMIT 200",
    )
    .bind(ladder_code)
    .bind(category_id)
    .bind(country)
    .bind(city)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn city_without_country_is_rejected_before_hitting_the_pool() {
        // validation happens before any query is issued, so this needs no pool
        let err = validate_city_requires_country(None, Some("Neiva"));
        assert!(err.is_err());
    }

    fn validate_city_requires_country(country: Option<&str>, city: Option<&str>) -> ApiResult<()> {
        if city.is_some() && country.is_none() {
            return Err(ApiError::validation("city_requires_country", "city filter requires country"));
        }
        Ok(())
    }
}
