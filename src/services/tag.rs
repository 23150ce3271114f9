//! Tag service
//!
//! Implements the tag store operations on top of `TagRepository`:
//! - Listing tags, globally or per media item
//! - Creating tags, optionally attached to a media item in the same transaction
//! - Looking up the media items carrying a tag
//! - Deleting tags together with their associations
//! - Attaching and detaching existing tags
//!
//! Every operation resolves to a `TagServiceError` variant instead of
//! leaking storage details: missing data is `NotFound`, a write refused by a
//! constraint is `Rejected`, bad input is `ValidationError`.

use crate::config::{NameMatching, TagConfig};
use crate::db::repositories::{AttachOutcome, TagRepository};
use crate::models::{MediaItemTag, Tag, TagResult};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Nothing matched the request
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write was refused (duplicate name, unknown media item, ...)
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The database could not be reached or a query failed
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

/// Tag service for managing media tags
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    name_matching: NameMatching,
    max_name_length: usize,
}

impl TagService {
    /// Create a new tag service
    ///
    /// # Arguments
    /// * `repo` - Tag repository for database operations
    /// * `config` - Name matching mode and length limit
    pub fn new(repo: Arc<dyn TagRepository>, config: &TagConfig) -> Self {
        Self {
            repo,
            name_matching: config.name_matching,
            max_name_length: config.max_name_length,
        }
    }

    /// List all tags in insertion order
    ///
    /// # Errors
    /// - `NotFound` if no tag exists
    pub async fn list_all(&self) -> Result<Vec<Tag>, TagServiceError> {
        let tags = self.repo.list().await.context("Failed to list tags")?;
        if tags.is_empty() {
            return Err(TagServiceError::NotFound("No tags found".to_string()));
        }
        Ok(tags)
    }

    /// Get tag by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag by ID")?
            .ok_or_else(|| TagServiceError::NotFound(format!("Tag {} not found", id)))
    }

    /// Create a standalone tag
    ///
    /// The name is trimmed before it is stored. Returns the tag as read back
    /// from the database.
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty or too long
    /// - `Rejected` if the name is already taken
    pub async fn create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = self.validate_name(name)?;
        self.ensure_name_available(name).await?;

        let created = self
            .repo
            .create(name)
            .await
            .context("Failed to create tag")?
            .ok_or_else(|| name_taken(name))?;

        tracing::info!(tag_id = created.tag_id, tag_name = %created.tag_name, "Tag created");
        Ok(created)
    }

    /// Create a tag and attach it to a media item atomically
    ///
    /// Either both the tag and the association are stored, or neither is.
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty or too long
    /// - `Rejected` if the name is taken or the media item does not exist
    pub async fn create_with_media(
        &self,
        name: &str,
        media_id: i64,
    ) -> Result<TagResult, TagServiceError> {
        let name = self.validate_name(name)?;
        self.ensure_name_available(name).await?;

        let created = self
            .repo
            .create_with_media(name, media_id)
            .await
            .context("Failed to create tag for media item")?
            .ok_or_else(|| {
                TagServiceError::Rejected(format!(
                    "Tag '{}' could not be created for media item {}",
                    name, media_id
                ))
            })?;

        tracing::info!(
            tag_id = created.tag_id,
            tag_name = %created.tag_name,
            media_id,
            "Tag created for media item"
        );
        Ok(created)
    }

    /// List the tags attached to a media item
    ///
    /// # Errors
    /// - `NotFound` if the media item has no tags (or does not exist)
    pub async fn list_by_media(&self, media_id: i64) -> Result<Vec<TagResult>, TagServiceError> {
        let tags = self
            .repo
            .list_by_media(media_id)
            .await
            .context("Failed to list tags by media item")?;
        if tags.is_empty() {
            return Err(TagServiceError::NotFound(format!(
                "No tags found for media item {}",
                media_id
            )));
        }
        Ok(tags)
    }

    /// List the media associations of a tag, looked up by name
    ///
    /// # Errors
    /// - `NotFound` if no media item carries the tag
    pub async fn list_media_by_tag(&self, name: &str) -> Result<Vec<TagResult>, TagServiceError> {
        let name = name.trim();
        let media = self
            .repo
            .list_by_name(name, self.name_matching)
            .await
            .context("Failed to list media by tag")?;
        if media.is_empty() {
            return Err(TagServiceError::NotFound(format!(
                "No media found for tag '{}'",
                name
            )));
        }
        Ok(media)
    }

    /// Delete a tag and every association that references it
    ///
    /// # Errors
    /// - `NotFound` if no tag has this ID
    pub async fn delete(&self, id: i64) -> Result<(), TagServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete tag")?;
        if !deleted {
            return Err(TagServiceError::NotFound(format!("Tag {} not found", id)));
        }

        tracing::info!(tag_id = id, "Tag deleted");
        Ok(())
    }

    /// Attach an existing tag to an existing media item
    ///
    /// # Errors
    /// - `NotFound` if the tag or the media item does not exist
    /// - `Rejected` if the pair is already associated
    pub async fn attach(&self, tag_id: i64, media_id: i64) -> Result<MediaItemTag, TagServiceError> {
        let outcome = self
            .repo
            .add_to_media(tag_id, media_id)
            .await
            .context("Failed to attach tag")?;

        match outcome {
            AttachOutcome::Attached => {
                tracing::info!(tag_id, media_id, "Tag attached to media item");
                Ok(MediaItemTag { media_id, tag_id })
            }
            AttachOutcome::AlreadyAttached => Err(TagServiceError::Rejected(format!(
                "Tag {} is already attached to media item {}",
                tag_id, media_id
            ))),
            AttachOutcome::MissingReference => Err(TagServiceError::NotFound(format!(
                "Tag {} or media item {} not found",
                tag_id, media_id
            ))),
        }
    }

    /// Detach a tag from a media item; the tag itself is kept
    ///
    /// # Errors
    /// - `NotFound` if the pair is not associated
    pub async fn detach(&self, tag_id: i64, media_id: i64) -> Result<(), TagServiceError> {
        let removed = self
            .repo
            .remove_from_media(tag_id, media_id)
            .await
            .context("Failed to detach tag")?;
        if !removed {
            return Err(TagServiceError::NotFound(format!(
                "Tag {} is not attached to media item {}",
                tag_id, media_id
            )));
        }

        tracing::info!(tag_id, media_id, "Tag detached from media item");
        Ok(())
    }

    fn validate_name<'a>(&self, name: &'a str) -> Result<&'a str, TagServiceError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > self.max_name_length {
            return Err(TagServiceError::ValidationError(format!(
                "Tag name cannot exceed {} characters",
                self.max_name_length
            )));
        }
        Ok(trimmed)
    }

    /// Only case-insensitive matching needs a lookup; exact duplicates are
    /// refused by the `UNIQUE(tag_name)` constraint at insert time.
    async fn ensure_name_available(&self, name: &str) -> Result<(), TagServiceError> {
        if self.name_matching != NameMatching::CaseInsensitive {
            return Ok(());
        }

        let existing = self
            .repo
            .get_by_name(name, NameMatching::CaseInsensitive)
            .await
            .context("Failed to check existing tag")?;
        match existing {
            Some(tag) => Err(name_taken(&tag.tag_name)),
            None => Ok(()),
        }
    }
}

fn name_taken(name: &str) -> TagServiceError {
    TagServiceError::Rejected(format!("Tag '{}' already exists", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service_with(config: TagConfig) -> (DynDatabasePool, TagService) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxTagRepository::boxed(pool.clone());
        let service = TagService::new(repo, &config);

        (pool, service)
    }

    async fn setup_test_service() -> (DynDatabasePool, TagService) {
        setup_test_service_with(TagConfig::default()).await
    }

    /// Helper to create a media item for association tests
    async fn create_test_media(pool: &DynDatabasePool, filename: &str) -> i64 {
        let result = sqlx::query("INSERT INTO MediaItems (filename, title) VALUES (?, ?)")
            .bind(filename)
            .bind(filename)
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test media item");
        result.last_insert_rowid()
    }

    async fn count_tags(pool: &DynDatabasePool) -> i64 {
        use sqlx::Row;
        sqlx::query("SELECT COUNT(*) FROM Tags")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to count tags")
            .get(0)
    }

    #[tokio::test]
    async fn test_create_tag() {
        let (_pool, service) = setup_test_service().await;

        let tag = service.create("  sunset  ").await.expect("Failed to create tag");

        assert!(tag.tag_id > 0);
        assert_eq!(tag.tag_name, "sunset");
    }

    #[tokio::test]
    async fn test_create_tag_empty_name() {
        let (_pool, service) = setup_test_service().await;

        let result = service.create("   ").await;

        assert!(matches!(result, Err(TagServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_tag_name_too_long() {
        let config = TagConfig {
            max_name_length: 5,
            ..TagConfig::default()
        };
        let (pool, service) = setup_test_service_with(config).await;

        assert!(service.create("abcde").await.is_ok());
        let result = service.create("abcdef").await;

        assert!(matches!(result, Err(TagServiceError::ValidationError(_))));
        assert_eq!(count_tags(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_is_rejected() {
        let (pool, service) = setup_test_service().await;
        service.create("beach").await.unwrap();

        let result = service.create("beach").await;

        assert!(matches!(result, Err(TagServiceError::Rejected(_))));
        assert_eq!(count_tags(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_exact_matching_allows_case_variants() {
        let (_pool, service) = setup_test_service().await;

        service.create("Beach").await.unwrap();
        service.create("beach").await.unwrap();

        assert_eq!(service.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_case_insensitive_matching_rejects_case_variants() {
        let config = TagConfig {
            name_matching: NameMatching::CaseInsensitive,
            ..TagConfig::default()
        };
        let (pool, service) = setup_test_service_with(config).await;
        let media_id = create_test_media(&pool, "a.jpg").await;
        service.create("Beach").await.unwrap();

        assert!(matches!(
            service.create("BEACH").await,
            Err(TagServiceError::Rejected(_))
        ));
        assert!(matches!(
            service.create_with_media("beach", media_id).await,
            Err(TagServiceError::Rejected(_))
        ));
        assert_eq!(count_tags(&pool).await, 1);

        let media = service.list_media_by_tag("bEaCh").await;
        assert!(matches!(media, Err(TagServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_case_insensitive_matching_folds_non_ascii() {
        let config = TagConfig {
            name_matching: NameMatching::CaseInsensitive,
            ..TagConfig::default()
        };
        let (pool, service) = setup_test_service_with(config).await;
        service.create("Äiti").await.unwrap();

        assert!(matches!(
            service.create("äiti").await,
            Err(TagServiceError::Rejected(_))
        ));
        assert!(matches!(
            service.create("ÄITI").await,
            Err(TagServiceError::Rejected(_))
        ));
        assert_eq!(count_tags(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_tag() {
        let (pool, service) = setup_test_service().await;
        sqlx::query("DROP TABLE MediaItemTags")
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to drop association table");

        let result = service.create_with_media("broken", 1).await;

        assert!(matches!(result, Err(TagServiceError::StorageFailure(_))));
        assert_eq!(count_tags(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_list_all_empty_is_not_found() {
        let (_pool, service) = setup_test_service().await;

        assert!(matches!(
            service.list_all().await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_list_delete_scenario() {
        let (_pool, service) = setup_test_service().await;
        let cat = service.create("cat").await.unwrap();
        service.create("dog").await.unwrap();

        assert_eq!(service.list_all().await.unwrap().len(), 2);

        service.delete(cat.tag_id).await.expect("First delete succeeds");
        let remaining = service.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tag_name, "dog");

        assert!(matches!(
            service.delete(cat.tag_id).await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_tag_with_associations() {
        let (pool, service) = setup_test_service().await;
        let media_id = create_test_media(&pool, "a.jpg").await;
        let tag = service.create_with_media("beach", media_id).await.unwrap();

        service.delete(tag.tag_id).await.unwrap();

        assert!(matches!(
            service.list_by_media(media_id).await,
            Err(TagServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.get_by_id(tag.tag_id).await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_with_media_and_list() {
        let (pool, service) = setup_test_service().await;
        let media_id = create_test_media(&pool, "a.jpg").await;

        let created = service.create_with_media("beach", media_id).await.unwrap();
        assert_eq!(created.media_id, media_id);

        let tags = service.list_by_media(media_id).await.unwrap();
        assert!(tags.iter().any(|t| t.tag_name == "beach"));

        let media = service.list_media_by_tag("beach").await.unwrap();
        assert_eq!(media, vec![created]);
    }

    #[tokio::test]
    async fn test_create_with_unknown_media_is_rejected_and_atomic() {
        let (pool, service) = setup_test_service().await;

        let result = service.create_with_media("orphan", 4242).await;

        assert!(matches!(result, Err(TagServiceError::Rejected(_))));
        assert_eq!(count_tags(&pool).await, 0);
        // The name is still free afterwards.
        assert!(service.create("orphan").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_media_without_tags() {
        let (pool, service) = setup_test_service().await;
        let media_id = create_test_media(&pool, "bare.jpg").await;

        assert!(matches!(
            service.list_by_media(media_id).await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_media_by_unknown_tag() {
        let (_pool, service) = setup_test_service().await;
        service.create("unused").await.unwrap();

        assert!(matches!(
            service.list_media_by_tag("unused").await,
            Err(TagServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.list_media_by_tag("missing").await,
            Err(TagServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let (pool, service) = setup_test_service().await;
        let media_id = create_test_media(&pool, "a.jpg").await;
        let tag = service.create("beach").await.unwrap();

        let link = service.attach(tag.tag_id, media_id).await.unwrap();
        assert_eq!(link, MediaItemTag { media_id, tag_id: tag.tag_id });

        assert!(matches!(
            service.attach(tag.tag_id, media_id).await,
            Err(TagServiceError::Rejected(_))
        ));
        assert!(matches!(
            service.attach(tag.tag_id, 99999).await,
            Err(TagServiceError::NotFound(_))
        ));

        service.detach(tag.tag_id, media_id).await.unwrap();
        assert!(matches!(
            service.detach(tag.tag_id, media_id).await,
            Err(TagServiceError::NotFound(_))
        ));
        assert_eq!(service.get_by_id(tag.tag_id).await.unwrap(), tag);
    }

    // ========================================================================
    // Property-Based Tests
    // ========================================================================

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// A freshly created tag shows up in the listing exactly once.
        #[test]
        fn property_created_tag_listed_once(
            names in proptest::collection::hash_set("[a-z]{3,20}", 1..6)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service) = setup_test_service().await;

                for name in &names {
                    service.create(name).await.expect("create should succeed");
                }

                let all_tags = service.list_all().await.expect("list should succeed");
                prop_assert_eq!(all_tags.len(), names.len());
                for name in &names {
                    let matching = all_tags.iter().filter(|t| &t.tag_name == name).count();
                    prop_assert_eq!(matching, 1, "Tag '{}' should be listed once", name);
                }

                Ok(())
            });
            result?;
        }

        /// Creating the same name twice adds exactly one row.
        #[test]
        fn property_duplicate_create_rejected(
            name in "[a-zA-Z0-9]{1,30}",
            attempts in 2..5usize
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (pool, service) = setup_test_service().await;

                let first = service.create(&name).await;
                prop_assert!(first.is_ok());

                for _ in 1..attempts {
                    let again = service.create(&name).await;
                    prop_assert!(matches!(again, Err(TagServiceError::Rejected(_))));
                }

                prop_assert_eq!(count_tags(&pool).await, 1);
                Ok(())
            });
            result?;
        }
    }
}
