//! Tag rows
//!
//! Rows are keyed by `(project_id, name_key)`; `name_key` is the
//! lower-cased name, so lookups and upserts are case-insensitive. Nothing
//! here deletes rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use tagsync_common::model::name_key;
use tagsync_common::{CanonicalTag, Error, ProjectId, Result, StoredTag};
use uuid::Uuid;

const COLUMNS: &str = "id, project_id, name, data_type, address, scope, category, \
                       default_value, description, vendor, is_generated, created_at, updated_at";

/// Persistence operations the reconciliation engine and API need
#[async_trait]
pub trait TagStore: Send + Sync {
    /// All tags of a project, ordered by name
    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<StoredTag>>;

    /// Case-insensitive lookup by name
    async fn find_tag(&self, project_id: ProjectId, name: &str) -> Result<Option<StoredTag>>;

    /// Insert a new tag or update the one with the same name
    ///
    /// An update keeps the stored `id`, `name`, `created_at` and
    /// `is_generated`.
    async fn upsert_tag(&self, project_id: ProjectId, tag: &CanonicalTag) -> Result<StoredTag>;
}

/// SQLite-backed [`TagStore`]
#[derive(Clone)]
pub struct SqliteTagStore {
    pool: SqlitePool,
}

impl SqliteTagStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TagStore for SqliteTagStore {
    async fn list_tags(&self, project_id: ProjectId) -> Result<Vec<StoredTag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tags WHERE project_id = ? ORDER BY name_key",
            COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_tag).collect()
    }

    async fn find_tag(&self, project_id: ProjectId, name: &str) -> Result<Option<StoredTag>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tags WHERE project_id = ? AND name_key = ?",
            COLUMNS
        ))
        .bind(project_id)
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_tag).transpose()
    }

    async fn upsert_tag(&self, project_id: ProjectId, tag: &CanonicalTag) -> Result<StoredTag> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tags (
                id, project_id, name, name_key, data_type, address, scope, category,
                default_value, description, vendor, is_generated, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, name_key) DO UPDATE SET
                data_type = excluded.data_type,
                address = excluded.address,
                scope = excluded.scope,
                category = excluded.category,
                default_value = excluded.default_value,
                description = excluded.description,
                vendor = excluded.vendor,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(tag.name.trim())
        .bind(tag.name_key())
        .bind(tag.data_type.as_str())
        .bind(&tag.address)
        .bind(tag.scope.as_str())
        .bind(tag.category.as_str())
        .bind(&tag.default_value)
        .bind(&tag.description)
        .bind(tag.vendor.as_str())
        .bind(tag.is_generated)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row_to_tag(&row)
    }
}

fn row_to_tag(row: &SqliteRow) -> Result<StoredTag> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(StoredTag {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("Bad tag id {}: {}", id, e)))?,
        project_id: row.try_get("project_id")?,
        tag: CanonicalTag {
            name: row.try_get("name")?,
            data_type: parse_column(row, "data_type")?,
            address: row.try_get("address")?,
            scope: parse_column(row, "scope")?,
            category: parse_column(row, "category")?,
            default_value: row.try_get("default_value")?,
            description: row.try_get("description")?,
            vendor: parse_column(row, "vendor")?,
            is_generated: row.try_get("is_generated")?,
        },
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let value: String = row.try_get(column)?;
    value
        .parse()
        .map_err(|e| Error::Internal(format!("Column {} holds '{}': {}", column, value, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_common::db::init_memory_database;
    use tagsync_common::{Category, DataType, Scope, Vendor};

    async fn store() -> SqliteTagStore {
        SqliteTagStore::new(init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_then_update_keeps_identity() {
        let store = store().await;

        let mut tag = CanonicalTag::new("Motor_Output", DataType::Bool, Vendor::Rockwell);
        tag.address = "O:2/0".to_string();
        tag.is_generated = true;
        let first = store.upsert_tag(7, &tag).await.unwrap();

        let mut changed = CanonicalTag::new("MOTOR_OUTPUT", DataType::Bool, Vendor::Rockwell);
        changed.address = "O:2/1".to_string();
        changed.scope = Scope::Output;
        changed.category = Category::Output;
        let second = store.upsert_tag(7, &changed).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.tag.name, "Motor_Output");
        assert_eq!(second.tag.address, "O:2/1");
        assert_eq!(second.tag.scope, Scope::Output);
        assert!(second.tag.is_generated);

        assert_eq!(store.list_tags(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive_and_project_scoped() {
        let store = store().await;
        let tag = CanonicalTag::new("Start_Button", DataType::Bool, Vendor::Siemens);
        store.upsert_tag(1, &tag).await.unwrap();

        assert!(store.find_tag(1, "start_button").await.unwrap().is_some());
        assert!(store.find_tag(2, "Start_Button").await.unwrap().is_none());
        assert!(store.list_tags(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_name() {
        let store = store().await;
        for name in ["b_tag", "A_tag", "c_tag"] {
            let tag = CanonicalTag::new(name, DataType::Int16, Vendor::Beckhoff);
            store.upsert_tag(3, &tag).await.unwrap();
        }
        let names: Vec<_> = store
            .list_tags(3)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.tag.name)
            .collect();
        assert_eq!(names, vec!["A_tag", "b_tag", "c_tag"]);
    }
}
