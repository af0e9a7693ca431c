//! Append-only audit trail. Grounded on `app/services/audit.py`: a single
//! insert helper called from inside the same transaction as the action it
//! describes, never its own commit.

use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

pub async fn audit(
    tx: &mut Transaction<'_, Postgres>,
    actor_user_id: Option<Uuid>,
    entity_type: &str,
    entity_id: &str,
    action: &str,
    data: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_logs (id, actor_user_id, entity_type, entity_id, action, data, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, now())",
    )
    .bind(Uuid::new_v4())
    .bind(actor_user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(action)
    .bind(data)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
