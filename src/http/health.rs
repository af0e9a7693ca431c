use actix_web::{web, HttpResponse, Result};

use crate::api_error::ApiError;
use crate::db::DbPool;

pub async fn health_check(db_pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    crate::db::health_check(&db_pool).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "database": "connected",
        "timestamp": chrono::Utc::now(),
    })))
}
