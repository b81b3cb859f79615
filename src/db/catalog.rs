//! Catalog repository
//!
//! Catalog entries are keyed on (title, year): at most one record per pair,
//! later writes merge into the existing record instead of duplicating it.

use anyhow::Result;
use sqlx::SqlitePool;

/// Catalog entry from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaRecord {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub language: String,
    pub watch_url: Option<String>,
    pub download_url: Option<String>,
    pub poster_url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub auto_added: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Input for upserting a catalog entry
#[derive(Debug, Clone)]
pub struct UpsertMedia {
    pub title: String,
    pub year: Option<i64>,
    pub language: String,
    pub watch_url: Option<String>,
    pub download_url: Option<String>,
    pub poster_url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
}

/// Repository for catalog entries
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the media table if it does not exist
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                year INTEGER,
                language TEXT NOT NULL DEFAULT '',
                watch_url TEXT,
                download_url TEXT,
                poster_url TEXT,
                description TEXT,
                rating REAL,
                auto_added INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_media_title_year ON media(title, year)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check whether a (title, year) pair is already cataloged
    pub async fn exists(&self, title: &str, year: Option<i64>) -> Result<bool> {
        // `IS` instead of `=` so a NULL year still matches its own key
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE title = ?1 AND year IS ?2")
                .bind(title)
                .bind(year)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Get a catalog entry by its (title, year) key
    pub async fn get(&self, title: &str, year: Option<i64>) -> Result<Option<MediaRecord>> {
        let record = sqlx::query_as::<_, MediaRecord>(
            "SELECT * FROM media WHERE title = ?1 AND year IS ?2",
        )
        .bind(title)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Insert or merge a catalog entry keyed on (title, year).
    ///
    /// Returns the record id.
    pub async fn upsert(&self, input: UpsertMedia) -> Result<i64> {
        let now = chrono::Utc::now();

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM media WHERE title = ?1 AND year IS ?2")
                .bind(&input.title)
                .bind(input.year)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(id) = existing {
            sqlx::query(
                r#"
                UPDATE media
                SET language = ?2,
                    watch_url = ?3,
                    download_url = ?4,
                    poster_url = ?5,
                    description = ?6,
                    rating = ?7,
                    updated_at = ?8
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(&input.language)
            .bind(&input.watch_url)
            .bind(&input.download_url)
            .bind(&input.poster_url)
            .bind(&input.description)
            .bind(input.rating)
            .bind(now)
            .execute(&self.pool)
            .await?;

            return Ok(id);
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO media (
                title, year, language, watch_url, download_url,
                poster_url, description, rating, auto_added,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(input.year)
        .bind(&input.language)
        .bind(&input.watch_url)
        .bind(&input.download_url)
        .bind(&input.poster_url)
        .bind(&input.description)
        .bind(input.rating)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn entry(title: &str, year: Option<i64>, download_url: &str) -> UpsertMedia {
        UpsertMedia {
            title: title.to_string(),
            year,
            language: "Tamil".to_string(),
            watch_url: None,
            download_url: Some(download_url.to_string()),
            poster_url: None,
            description: None,
            rating: Some(7.1),
        }
    }

    async fn test_db() -> Database {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_repeated_upserts_keep_one_record() {
        let db = test_db().await;
        let catalog = db.catalog();

        let first = catalog
            .upsert(entry("Amaran", Some(2024), "https://dl/1"))
            .await
            .unwrap();

        for i in 2..5 {
            let id = catalog
                .upsert(entry("Amaran", Some(2024), &format!("https://dl/{}", i)))
                .await
                .unwrap();
            assert_eq!(id, first);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE title = ?1")
            .bind("Amaran")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Later writes merged, not ignored
        let record = catalog.get("Amaran", Some(2024)).await.unwrap().unwrap();
        assert_eq!(record.download_url.as_deref(), Some("https://dl/4"));
    }

    #[tokio::test]
    async fn test_upsert_with_null_year_still_merges() {
        let db = test_db().await;
        let catalog = db.catalog();

        let a = catalog.upsert(entry("Untitled", None, "https://dl/a")).await.unwrap();
        let b = catalog.upsert(entry("Untitled", None, "https://dl/b")).await.unwrap();
        assert_eq!(a, b);

        assert!(catalog.exists("Untitled", None).await.unwrap());
        assert!(!catalog.exists("Untitled", Some(2020)).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_title_different_years_are_distinct() {
        let db = test_db().await;
        let catalog = db.catalog();

        let a = catalog
            .upsert(entry("Remake", Some(1998), "https://dl/a"))
            .await
            .unwrap();
        let b = catalog
            .upsert(entry("Remake", Some(2024), "https://dl/b"))
            .await
            .unwrap();
        assert_ne!(a, b);
    }
}
