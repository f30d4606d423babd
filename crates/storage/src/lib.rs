use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{LocationId, Point, UserId};

/// Per-user ordered collection of selected locations.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn create_location(&self, owner: UserId, point: Point) -> Result<StoredLocation>;
    /// Returns the number of rows removed.
    async fn delete_all_locations(&self, owner: UserId) -> Result<u64>;
    /// Oldest first, at most `limit` rows.
    async fn list_recent_locations(&self, owner: UserId, limit: u32)
        -> Result<Vec<StoredLocation>>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLocation {
    pub location_id: LocationId,
    pub owner_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

impl StoredLocation {
    pub fn point(&self) -> Point {
        Point::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub username: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn username_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn list_users(&self) -> Result<Vec<StoredUser>> {
        let rows = sqlx::query("SELECT id, username FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredUser {
                user_id: UserId(r.get::<i64, _>(0)),
                username: r.get::<String, _>(1),
            })
            .collect())
    }

    pub async fn count_locations(&self, owner: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE user_id = ?")
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl LocationStore for Storage {
    async fn create_location(&self, owner: UserId, point: Point) -> Result<StoredLocation> {
        let created_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO locations (user_id, latitude, longitude, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(owner.0)
        .bind(point.lat)
        .bind(point.lng)
        .bind(sortable_timestamp(created_at))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert location for user {}", owner.0))?;
        Ok(StoredLocation {
            location_id: LocationId(rec.get::<i64, _>(0)),
            owner_id: owner,
            latitude: point.lat,
            longitude: point.lng,
            created_at,
        })
    }

    async fn delete_all_locations(&self, owner: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM locations WHERE user_id = ?")
            .bind(owner.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete locations for user {}", owner.0))?;
        Ok(result.rows_affected())
    }

    async fn list_recent_locations(
        &self,
        owner: UserId,
        limit: u32,
    ) -> Result<Vec<StoredLocation>> {
        let rows = sqlx::query(
            "SELECT id, user_id, latitude, longitude, created_at
             FROM locations
             WHERE user_id = ?
             ORDER BY created_at ASC, id ASC
             LIMIT ?",
        )
        .bind(owner.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list locations for user {}", owner.0))?;

        rows.into_iter()
            .map(|r| {
                let raw_created_at = r.get::<String, _>(4);
                let created_at = DateTime::parse_from_rfc3339(&raw_created_at)
                    .with_context(|| format!("invalid created_at '{raw_created_at}'"))?
                    .with_timezone(&Utc);
                Ok(StoredLocation {
                    location_id: LocationId(r.get::<i64, _>(0)),
                    owner_id: UserId(r.get::<i64, _>(1)),
                    latitude: r.get::<f64, _>(2),
                    longitude: r.get::<f64, _>(3),
                    created_at,
                })
            })
            .collect()
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn sortable_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
