use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub item_count: i64,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Category {
    pub async fn list(db: &SqlitePool) -> sqlx::Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, item_count, image, created_at, updated_at
            FROM categories
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> sqlx::Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, item_count, image, created_at, updated_at
            FROM categories
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_name(db: &SqlitePool, name: &str) -> sqlx::Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, item_count, image, created_at, updated_at
            FROM categories
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &SqlitePool,
        name: &str,
        item_count: i64,
        image: Option<&str>,
    ) -> sqlx::Result<Category> {
        let now = OffsetDateTime::now_utc();
        let res = sqlx::query(
            r#"
            INSERT INTO categories (name, item_count, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(item_count)
        .bind(image)
        .bind(now)
        .bind(now)
        .execute(db)
        .await?;

        Self::fetch(db, res.last_insert_rowid()).await
    }

    /// Full-row update; the caller merges unchanged fields beforehand.
    /// `updated_at` advances on every call.
    pub async fn update(
        db: &SqlitePool,
        id: i64,
        name: &str,
        item_count: i64,
        image: Option<&str>,
    ) -> sqlx::Result<Category> {
        let now = OffsetDateTime::now_utc();
        sqlx::query(
            r#"
            UPDATE categories
            SET name = ?, item_count = ?, image = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(item_count)
        .bind(image)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;

        Self::fetch(db, id).await
    }

    pub async fn delete(db: &SqlitePool, id: i64) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    async fn fetch(db: &SqlitePool, id: i64) -> sqlx::Result<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, item_count, image, created_at, updated_at
            FROM categories
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await
    }
}
