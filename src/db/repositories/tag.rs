//! Tag repository
//!
//! Database operations for tags and their media associations.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL
//!
//! Writes that touch both `Tags` and `MediaItemTags` run in a single
//! transaction. A write refused by a unique or foreign-key constraint is not an
//! error here: it is reported through the return value (`None`, `false` or an
//! `AttachOutcome`) and the transaction is rolled back.

use crate::config::{DatabaseDriver, NameMatching};
use crate::db::DynDatabasePool;
use crate::models::{Tag, TagResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Result of linking an existing tag to an existing media item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A new association row was written
    Attached,
    /// The pair was already associated
    AlreadyAttached,
    /// The tag or the media item does not exist
    MissingReference,
}

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// List all tags in insertion order
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str, matching: NameMatching) -> Result<Option<Tag>>;

    /// Insert a tag and return it as stored.
    ///
    /// Returns `None` when the name is already taken.
    async fn create(&self, name: &str) -> Result<Option<Tag>>;

    /// Insert a tag and its first media association atomically.
    ///
    /// Returns `None`, with nothing committed, when either insert is refused
    /// (duplicate name, unknown media item) or writes no row.
    async fn create_with_media(&self, name: &str, media_id: i64) -> Result<Option<TagResult>>;

    /// Tags attached to one media item
    async fn list_by_media(&self, media_id: i64) -> Result<Vec<TagResult>>;

    /// Media associations of the tags matching `name`
    async fn list_by_name(&self, name: &str, matching: NameMatching) -> Result<Vec<TagResult>>;

    /// Delete a tag together with its associations.
    ///
    /// Returns `false` when no tag row with this ID exists.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Associate an existing tag with an existing media item
    async fn add_to_media(&self, tag_id: i64, media_id: i64) -> Result<AttachOutcome>;

    /// Remove one association; returns `false` if it did not exist
    async fn remove_from_media(&self, tag_id: i64, media_id: i64) -> Result<bool>;
}

/// SQLx-based tag repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }

    fn backend(&self) -> Result<Backend<'_>> {
        let backend = match self.pool.driver() {
            DatabaseDriver::Sqlite => self.pool.as_sqlite().map(Backend::Sqlite),
            DatabaseDriver::Mysql => self.pool.as_mysql().map(Backend::Mysql),
        };
        backend.context("Database pool does not expose its configured driver")
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn list(&self) -> Result<Vec<Tag>> {
        match self.backend()? {
            Backend::Sqlite(pool) => list_tags_sqlite(pool).await,
            Backend::Mysql(pool) => list_tags_mysql(pool).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        match self.backend()? {
            Backend::Sqlite(pool) => get_tag_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_tag_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_name(&self, name: &str, matching: NameMatching) -> Result<Option<Tag>> {
        match self.backend()? {
            Backend::Sqlite(pool) => get_tag_by_name_sqlite(pool, name, matching).await,
            Backend::Mysql(pool) => get_tag_by_name_mysql(pool, name, matching).await,
        }
    }

    async fn create(&self, name: &str) -> Result<Option<Tag>> {
        match self.backend()? {
            Backend::Sqlite(pool) => create_tag_sqlite(pool, name).await,
            Backend::Mysql(pool) => create_tag_mysql(pool, name).await,
        }
    }

    async fn create_with_media(&self, name: &str, media_id: i64) -> Result<Option<TagResult>> {
        match self.backend()? {
            Backend::Sqlite(pool) => create_tag_with_media_sqlite(pool, name, media_id).await,
            Backend::Mysql(pool) => create_tag_with_media_mysql(pool, name, media_id).await,
        }
    }

    async fn list_by_media(&self, media_id: i64) -> Result<Vec<TagResult>> {
        match self.backend()? {
            Backend::Sqlite(pool) => list_tags_by_media_sqlite(pool, media_id).await,
            Backend::Mysql(pool) => list_tags_by_media_mysql(pool, media_id).await,
        }
    }

    async fn list_by_name(&self, name: &str, matching: NameMatching) -> Result<Vec<TagResult>> {
        match self.backend()? {
            Backend::Sqlite(pool) => list_media_by_tag_sqlite(pool, name, matching).await,
            Backend::Mysql(pool) => list_media_by_tag_mysql(pool, name, matching).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.backend()? {
            Backend::Sqlite(pool) => delete_tag_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_tag_mysql(pool, id).await,
        }
    }

    async fn add_to_media(&self, tag_id: i64, media_id: i64) -> Result<AttachOutcome> {
        let result = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(INSERT_ASSOCIATION)
                .bind(media_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(INSERT_ASSOCIATION)
                .bind(media_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };

        match result {
            Ok(0) => Ok(AttachOutcome::AlreadyAttached),
            Ok(_) => Ok(AttachOutcome::Attached),
            Err(e) => match violation(&e) {
                Some(Violation::Unique) => Ok(AttachOutcome::AlreadyAttached),
                Some(Violation::ForeignKey) => Ok(AttachOutcome::MissingReference),
                None => Err(e).context("Failed to add tag to media item"),
            },
        }
    }

    async fn remove_from_media(&self, tag_id: i64, media_id: i64) -> Result<bool> {
        let affected = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(DELETE_ASSOCIATION)
                .bind(media_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to remove tag from media item")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(DELETE_ASSOCIATION)
                .bind(media_id)
                .bind(tag_id)
                .execute(pool)
                .await
                .context("Failed to remove tag from media item")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }
}

// ============================================================================
// Shared SQL and error classification
// ============================================================================

const SELECT_TAGS: &str = "SELECT tag_id, tag_name FROM Tags";

const SELECT_TAG_RESULTS: &str = r#"
    SELECT Tags.tag_id, Tags.tag_name, MediaItemTags.media_id
    FROM Tags
    INNER JOIN MediaItemTags ON Tags.tag_id = MediaItemTags.tag_id
"#;

const INSERT_TAG: &str = "INSERT INTO Tags (tag_name, tag_name_key) VALUES (?, ?)";
const INSERT_ASSOCIATION: &str = "INSERT INTO MediaItemTags (media_id, tag_id) VALUES (?, ?)";
const DELETE_ASSOCIATION: &str = "DELETE FROM MediaItemTags WHERE media_id = ? AND tag_id = ?";
const DELETE_TAG_ASSOCIATIONS: &str = "DELETE FROM MediaItemTags WHERE tag_id = ?";
const DELETE_TAG: &str = "DELETE FROM Tags WHERE tag_id = ?";

fn name_filter(matching: NameMatching) -> &'static str {
    match matching {
        NameMatching::Exact => "Tags.tag_name = ?",
        NameMatching::CaseInsensitive => "Tags.tag_name_key = ?",
    }
}

/// Case-folded lookup key stored in `Tags.tag_name_key`.
///
/// SQLite's `LOWER()` only folds ASCII, so the key is always computed here.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Value bound against `name_filter(matching)`
fn name_param(name: &str, matching: NameMatching) -> String {
    match matching {
        NameMatching::Exact => name.to_string(),
        NameMatching::CaseInsensitive => name_key(name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    Unique,
    ForeignKey,
}

fn violation(err: &sqlx::Error) -> Option<Violation> {
    let db_err = err.as_database_error()?;
    if db_err.is_unique_violation() {
        Some(Violation::Unique)
    } else if db_err.is_foreign_key_violation() {
        Some(Violation::ForeignKey)
    } else {
        None
    }
}

/// `Ok(None)` when a constraint refused the write, context-wrapped error otherwise.
fn refused_as_none<T>(result: Result<T, sqlx::Error>, context: &'static str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if violation(&e).is_some() => Ok(None),
        Err(e) => Err(e).context(context),
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_tags_sqlite(pool: &SqlitePool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(&format!("{} ORDER BY tag_id", SELECT_TAGS))
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("{} WHERE tag_id = ?", SELECT_TAGS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn get_tag_by_name_sqlite(
    pool: &SqlitePool,
    name: &str,
    matching: NameMatching,
) -> Result<Option<Tag>> {
    let sql = format!("{} WHERE {} ORDER BY tag_id LIMIT 1", SELECT_TAGS, name_filter(matching));
    let row = sqlx::query(&sql)
        .bind(name_param(name, matching))
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn create_tag_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let inserted = sqlx::query(INSERT_TAG)
        .bind(name)
        .bind(name_key(name))
        .execute(&mut *tx)
        .await;
    let tag_id = match refused_as_none(inserted, "Failed to create tag")? {
        Some(result) if result.rows_affected() > 0 => result.last_insert_rowid(),
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    };

    let row = sqlx::query(&format!("{} WHERE tag_id = ?", SELECT_TAGS))
        .bind(tag_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to fetch created tag")?;
    let tag = row_to_tag_sqlite(&row);

    tx.commit().await.context("Failed to commit tag insert")?;
    Ok(Some(tag))
}

async fn create_tag_with_media_sqlite(
    pool: &SqlitePool,
    name: &str,
    media_id: i64,
) -> Result<Option<TagResult>> {
    // Dropping `tx` on an early `?` return rolls the transaction back.
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let inserted = sqlx::query(INSERT_TAG)
        .bind(name)
        .bind(name_key(name))
        .execute(&mut *tx)
        .await;
    let tag_id = match refused_as_none(inserted, "Failed to create tag")? {
        Some(result) if result.rows_affected() > 0 => result.last_insert_rowid(),
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    };

    let linked = sqlx::query(INSERT_ASSOCIATION)
        .bind(media_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await;
    match refused_as_none(linked, "Failed to associate tag with media item")? {
        Some(result) if result.rows_affected() > 0 => {}
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    }

    tx.commit().await.context("Failed to commit tag insert")?;

    Ok(Some(TagResult {
        tag_id,
        tag_name: name.to_string(),
        media_id,
    }))
}

async fn list_tags_by_media_sqlite(pool: &SqlitePool, media_id: i64) -> Result<Vec<TagResult>> {
    let sql = format!(
        "{} WHERE MediaItemTags.media_id = ? ORDER BY Tags.tag_id",
        SELECT_TAG_RESULTS
    );
    let rows = sqlx::query(&sql)
        .bind(media_id)
        .fetch_all(pool)
        .await
        .context("Failed to list tags by media item")?;

    Ok(rows.iter().map(row_to_tag_result_sqlite).collect())
}

async fn list_media_by_tag_sqlite(
    pool: &SqlitePool,
    name: &str,
    matching: NameMatching,
) -> Result<Vec<TagResult>> {
    let sql = format!(
        "{} WHERE {} ORDER BY MediaItemTags.media_id, Tags.tag_id",
        SELECT_TAG_RESULTS,
        name_filter(matching)
    );
    let rows = sqlx::query(&sql)
        .bind(name_param(name, matching))
        .fetch_all(pool)
        .await
        .context("Failed to list media by tag")?;

    Ok(rows.iter().map(row_to_tag_result_sqlite).collect())
}

async fn delete_tag_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // A tag without associations is still a valid delete target.
    sqlx::query(DELETE_TAG_ASSOCIATIONS)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tag associations")?;

    let deleted = sqlx::query(DELETE_TAG)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tag")?;

    if deleted.rows_affected() == 0 {
        tx.rollback().await.context("Failed to roll back tag delete")?;
        return Ok(false);
    }

    tx.commit().await.context("Failed to commit tag delete")?;
    Ok(true)
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        tag_id: row.get("tag_id"),
        tag_name: row.get("tag_name"),
    }
}

fn row_to_tag_result_sqlite(row: &sqlx::sqlite::SqliteRow) -> TagResult {
    TagResult {
        tag_id: row.get("tag_id"),
        tag_name: row.get("tag_name"),
        media_id: row.get("media_id"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_tags_mysql(pool: &MySqlPool) -> Result<Vec<Tag>> {
    let rows = sqlx::query(&format!("{} ORDER BY tag_id", SELECT_TAGS))
        .fetch_all(pool)
        .await
        .context("Failed to list tags")?;

    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!("{} WHERE tag_id = ?", SELECT_TAGS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by ID")?;

    Ok(row.as_ref().map(row_to_tag_mysql))
}

async fn get_tag_by_name_mysql(
    pool: &MySqlPool,
    name: &str,
    matching: NameMatching,
) -> Result<Option<Tag>> {
    let sql = format!("{} WHERE {} ORDER BY tag_id LIMIT 1", SELECT_TAGS, name_filter(matching));
    let row = sqlx::query(&sql)
        .bind(name_param(name, matching))
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    Ok(row.as_ref().map(row_to_tag_mysql))
}

async fn create_tag_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Tag>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let inserted = sqlx::query(INSERT_TAG)
        .bind(name)
        .bind(name_key(name))
        .execute(&mut *tx)
        .await;
    let tag_id = match refused_as_none(inserted, "Failed to create tag")? {
        Some(result) if result.rows_affected() > 0 => result.last_insert_id() as i64,
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    };

    let row = sqlx::query(&format!("{} WHERE tag_id = ?", SELECT_TAGS))
        .bind(tag_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to fetch created tag")?;
    let tag = row_to_tag_mysql(&row);

    tx.commit().await.context("Failed to commit tag insert")?;
    Ok(Some(tag))
}

async fn create_tag_with_media_mysql(
    pool: &MySqlPool,
    name: &str,
    media_id: i64,
) -> Result<Option<TagResult>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let inserted = sqlx::query(INSERT_TAG)
        .bind(name)
        .bind(name_key(name))
        .execute(&mut *tx)
        .await;
    let tag_id = match refused_as_none(inserted, "Failed to create tag")? {
        Some(result) if result.rows_affected() > 0 => result.last_insert_id() as i64,
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    };

    let linked = sqlx::query(INSERT_ASSOCIATION)
        .bind(media_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await;
    match refused_as_none(linked, "Failed to associate tag with media item")? {
        Some(result) if result.rows_affected() > 0 => {}
        _ => {
            tx.rollback().await.context("Failed to roll back tag insert")?;
            return Ok(None);
        }
    }

    tx.commit().await.context("Failed to commit tag insert")?;

    Ok(Some(TagResult {
        tag_id,
        tag_name: name.to_string(),
        media_id,
    }))
}

async fn list_tags_by_media_mysql(pool: &MySqlPool, media_id: i64) -> Result<Vec<TagResult>> {
    let sql = format!(
        "{} WHERE MediaItemTags.media_id = ? ORDER BY Tags.tag_id",
        SELECT_TAG_RESULTS
    );
    let rows = sqlx::query(&sql)
        .bind(media_id)
        .fetch_all(pool)
        .await
        .context("Failed to list tags by media item")?;

    Ok(rows.iter().map(row_to_tag_result_mysql).collect())
}

async fn list_media_by_tag_mysql(
    pool: &MySqlPool,
    name: &str,
    matching: NameMatching,
) -> Result<Vec<TagResult>> {
    let sql = format!(
        "{} WHERE {} ORDER BY MediaItemTags.media_id, Tags.tag_id",
        SELECT_TAG_RESULTS,
        name_filter(matching)
    );
    let rows = sqlx::query(&sql)
        .bind(name_param(name, matching))
        .fetch_all(pool)
        .await
        .context("Failed to list media by tag")?;

    Ok(rows.iter().map(row_to_tag_result_mysql).collect())
}

async fn delete_tag_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(DELETE_TAG_ASSOCIATIONS)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tag associations")?;

    let deleted = sqlx::query(DELETE_TAG)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete tag")?;

    if deleted.rows_affected() == 0 {
        tx.rollback().await.context("Failed to roll back tag delete")?;
        return Ok(false);
    }

    tx.commit().await.context("Failed to commit tag delete")?;
    Ok(true)
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        tag_id: row.get("tag_id"),
        tag_name: row.get("tag_name"),
    }
}

fn row_to_tag_result_mysql(row: &sqlx::mysql::MySqlRow) -> TagResult {
    TagResult {
        tag_id: row.get("tag_id"),
        tag_name: row.get("tag_name"),
        media_id: row.get("media_id"),
    }
}
