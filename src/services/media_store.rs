//! src/services/media_store.rs
//!
//! Persistence seam for media records. `MediaService` only sees the
//! `MediaStore` trait, so tests can swap in whatever store they need; the
//! production implementation is SQLite via sqlx.

use crate::models::media::Media;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

const MEDIA_COLUMNS: &str = "id, original_filename, content_type, size_bytes, file_path, \
     user_id, product_id, url, created_at, updated_at";

/// Fields for a record that has not been assigned an id yet.
#[derive(Clone, Debug)]
pub struct NewMedia {
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub file_path: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queryable persistence for media metadata.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist a new record, assigning its id.
    async fn insert(&self, media: NewMedia) -> Result<Media, sqlx::Error>;

    /// Persist the mutable fields of an existing record.
    async fn update(&self, media: &Media) -> Result<(), sqlx::Error>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Media>, sqlx::Error>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Media>, sqlx::Error>;

    async fn find_by_product(&self, product_id: Uuid) -> Result<Vec<Media>, sqlx::Error>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Media>, sqlx::Error>;

    /// Delete every listed record in one batch. Returns the number of rows
    /// removed.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// SQLite-backed `MediaStore`.
#[derive(Clone)]
pub struct SqliteMediaStore {
    db: Arc<SqlitePool>,
}

impl SqliteMediaStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn insert(&self, media: NewMedia) -> Result<Media, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "INSERT INTO media ({MEDIA_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&media.original_filename)
        .bind(&media.content_type)
        .bind(media.size_bytes)
        .bind(&media.file_path)
        .bind(media.user_id)
        .bind(media.created_at)
        .bind(media.updated_at)
        .fetch_one(&*self.db)
        .await
    }

    async fn update(&self, media: &Media) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE media SET product_id = ?, url = ?, updated_at = ? WHERE id = ?")
            .bind(media.product_id)
            .bind(&media.url)
            .bind(media.updated_at)
            .bind(media.id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE user_id = ? ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await
    }

    async fn find_by_product(&self, product_id: Uuid) -> Result<Vec<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE product_id = ? ORDER BY created_at"
        ))
        .bind(product_id)
        .fetch_all(&*self.db)
        .await
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Media>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id IN ("
        ));
        {
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
        }
        builder.push(")");
        builder.build_query_as().fetch_all(&*self.db).await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM media WHERE id IN (");
        {
            let mut separated = builder.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
        }
        builder.push(")");
        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map(|_| ())
    }
}
