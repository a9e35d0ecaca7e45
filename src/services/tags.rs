use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::{Tag, TagType, User};

use super::error::ServiceError;

/// Silent filter, not an error: when assigning tags to a tenant-scoped
/// object, tags belonging to a foreign tenant simply vanish from the result.
/// GLOBAL tags (no tenant) always survive. Creation, by contrast, fails
/// loudly; this asymmetry is deliberate.
pub fn filter_tag_ids(tags: &[Tag], valid_tenant_id: i64) -> Vec<i64> {
    tags.iter()
        .filter(|t| t.tenant_id.is_none() || t.tenant_id == Some(valid_tenant_id))
        .map(|t| t.id)
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct TagFilters {
    /// Substring match on the tag name.
    pub name: Option<String>,
    pub tenant_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub device_id: Option<i64>,
    pub user_id: Option<i64>,
}

pub struct TagService {
    pool: PgPool,
}

impl TagService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A tag with no tenant is forced to GLOBAL type; the null-tenant /
    /// GLOBAL pairing is an invariant, not a convention.
    pub async fn create_tag(
        &self,
        actor: &User,
        name: &str,
        tenant_id: Option<i64>,
        tag_type: TagType,
    ) -> Result<Tag, ServiceError> {
        // Fast-path pre-check for a friendlier error; the unique constraint
        // below remains the authoritative guard.
        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_some() {
            return Err(ServiceError::TagNameTaken(name.to_string()));
        }

        if let Some(tid) = tenant_id {
            let tenant = sqlx::query_scalar::<_, i64>("SELECT 1 FROM tenants WHERE id = $1")
                .bind(tid)
                .fetch_optional(&self.pool)
                .await?;
            if tenant.is_none() {
                return Err(ServiceError::TenantNotFound);
            }
        }

        let effective_type = if tenant_id.is_none() { TagType::Global } else { tag_type };

        sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, tenant_id, tag_type, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4) RETURNING *",
        )
        .bind(name)
        .bind(tenant_id)
        .bind(effective_type.as_str())
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::or_name_taken(e, ServiceError::TagNameTaken(name.to_string())))
    }

    pub async fn update_tag(
        &self,
        actor: &User,
        tag_id: i64,
        name: &str,
    ) -> Result<Tag, ServiceError> {
        self.get_tag(tag_id).await?;

        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $1, updated_at = now(), updated_by = $2 \
             WHERE id = $3 RETURNING *",
        )
        .bind(name)
        .bind(actor.id)
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ServiceError::or_name_taken(e, ServiceError::TagNameTaken(name.to_string())))
    }

    pub async fn delete_tag(&self, tag_id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::TagNotFound);
        }
        Ok(())
    }

    pub async fn get_tag(&self, tag_id: i64) -> Result<Tag, ServiceError> {
        sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::TagNotFound)
    }

    /// Visibility rule: a non-admin sees only tags scoped to tenants they
    /// belong to, plus GLOBAL tags. Requesting a foreign tenant's tags is a
    /// hard PermissionDenied, never a transparent empty result.
    pub async fn get_tags(
        &self,
        requester: &User,
        memberships: &[i64],
        filters: &TagFilters,
    ) -> Result<Vec<Tag>, ServiceError> {
        if let Some(tid) = filters.tenant_id {
            if !requester.is_admin() && !memberships.contains(&tid) {
                return Err(ServiceError::PermissionDenied);
            }
        }

        // Entity filters on objects that do not exist contribute nothing
        // rather than erroring; the remaining filters still apply.
        let entity_ids = self.resolve_entity_filters(filters).await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT DISTINCT t.* FROM tags t");
        if !entity_ids.is_empty() {
            qb.push(" JOIN entity_tags et ON et.tag_id = t.id");
        }
        qb.push(" WHERE 1 = 1");

        if let Some(name) = &filters.name {
            qb.push(" AND t.name ILIKE ");
            qb.push_bind(format!("%{}%", name));
        }

        if let Some(tid) = filters.tenant_id {
            // Tenant-scoped view still includes GLOBAL tags.
            qb.push(" AND (t.tenant_id IS NULL OR t.tenant_id = ");
            qb.push_bind(tid);
            qb.push(")");
        } else if !requester.is_admin() {
            qb.push(" AND (t.tenant_id IS NULL OR t.tenant_id = ANY(");
            qb.push_bind(memberships.to_vec());
            qb.push("))");
        }

        if !entity_ids.is_empty() {
            qb.push(" AND et.entity_id = ANY(");
            qb.push_bind(entity_ids);
            qb.push(")");
        }

        qb.push(" ORDER BY t.id");

        let tags = qb.build_query_as::<Tag>().fetch_all(&self.pool).await?;
        Ok(tags)
    }

    pub async fn tags_for_entity(&self, entity_id: i64) -> Result<Vec<Tag>, ServiceError> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT t.* FROM tags t JOIN entity_tags et ON et.tag_id = t.id \
             WHERE et.entity_id = $1 ORDER BY t.id",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Replace an entity's tag set. When the owning object is tenant-scoped,
    /// foreign-tenant tags are dropped silently via `filter_tag_ids`.
    pub async fn assign_tags(
        &self,
        entity_id: i64,
        tag_ids: &[i64],
        valid_tenant_id: Option<i64>,
    ) -> Result<Vec<Tag>, ServiceError> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ANY($1) ORDER BY id")
            .bind(tag_ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        let keep: Vec<i64> = match valid_tenant_id {
            Some(tid) => filter_tag_ids(&tags, tid),
            None => tags.iter().map(|t| t.id).collect(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entity_tags WHERE entity_id = $1")
            .bind(entity_id)
            .execute(&mut *tx)
            .await?;
        for tag_id in &keep {
            sqlx::query("INSERT INTO entity_tags (entity_id, tag_id) VALUES ($1, $2)")
                .bind(entity_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.tags_for_entity(entity_id).await
    }

    /// Folder/device/user filters resolve to entity ids; an id that does
    /// not resolve contributes nothing (the object may legitimately not
    /// exist yet in a combined query).
    async fn resolve_entity_filters(
        &self,
        filters: &TagFilters,
    ) -> Result<Vec<i64>, ServiceError> {
        let mut entity_ids = Vec::new();
        if let Some(folder_id) = filters.folder_id {
            let id = sqlx::query_scalar::<_, i64>("SELECT entity_id FROM folders WHERE id = $1")
                .bind(folder_id)
                .fetch_optional(&self.pool)
                .await?;
            entity_ids.extend(id);
        }
        if let Some(device_id) = filters.device_id {
            let id = sqlx::query_scalar::<_, i64>("SELECT entity_id FROM devices WHERE id = $1")
                .bind(device_id)
                .fetch_optional(&self.pool)
                .await?;
            entity_ids.extend(id);
        }
        if let Some(user_id) = filters.user_id {
            let id = sqlx::query_scalar::<_, i64>("SELECT entity_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            entity_ids.extend(id);
        }
        Ok(entity_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    #[test]
    fn foreign_tenant_tags_are_dropped_silently() {
        let tags = vec![
            testing::tag(1, Some(10)), // valid tenant
            testing::tag(2, Some(20)), // foreign tenant
            testing::tag(3, None),     // global
            testing::tag(4, Some(10)),
        ];
        assert_eq!(filter_tag_ids(&tags, 10), vec![1, 3, 4]);
    }

    #[test]
    fn empty_input_filters_to_empty() {
        assert!(filter_tag_ids(&[], 10).is_empty());
    }

    #[test]
    fn only_globals_survive_for_an_unrelated_tenant() {
        let tags = vec![testing::tag(1, Some(10)), testing::tag(2, None)];
        assert_eq!(filter_tag_ids(&tags, 99), vec![2]);
    }
}
