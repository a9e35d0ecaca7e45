use crate::models::Entity;

use super::error::ServiceError;

/// Create a bare Entity with no tags. Called inside every owner-object
/// creation path (always within the owner's transaction), never exposed as
/// a standalone public operation.
pub async fn create_entity(executor: impl sqlx::PgExecutor<'_>) -> Result<Entity, ServiceError> {
    let entity = sqlx::query_as::<_, Entity>("INSERT INTO entities DEFAULT VALUES RETURNING *")
        .fetch_one(executor)
        .await?;
    Ok(entity)
}
