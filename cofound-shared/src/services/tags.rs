/// Tag reconciliation
///
/// Turns a mixed list of tag references into a canonical, duplicate-free set
/// of tag ids, creating tags for names seen for the first time.
///
/// # Rules
///
/// 1. Entries with an `id` reference an existing tag. Unknown ids fail with `NotFound`.
/// 2. Entries without an `id` are new-tag names. They are trimmed and
///    deduplicated case-insensitively within the batch (first spelling wins).
/// 3. Each remaining name resolves to the stored tag with the same name under
///    case-insensitive comparison, or to a newly inserted tag.
/// 4. The result is the sorted union of both id sets.
///
/// Existing tags are never renamed or deleted.
///
/// # Example
///
/// ```no_run
/// use cofound_shared::services::tags::{reconcile, TagInput};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let ids = reconcile(&pool, &[TagInput::named("Go"), TagInput::named("go")]).await?;
/// assert_eq!(ids.len(), 1);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::models::tag::Tag;

/// Longest accepted tag name
pub const TAG_NAME_MAX_LENGTH: usize = 50;

/// Most tags accepted in one reconciliation
pub const MAX_TAGS_PER_REQUEST: usize = 30;

/// One requested tag: either a reference by id or a new name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInput {
    #[serde(default)]
    pub id: Option<i32>,

    #[serde(default)]
    pub name: String,
}

impl TagInput {
    pub fn existing(id: i32, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Input split into references and unique new names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Referenced ids, sorted, without duplicates
    pub existing_ids: Vec<i32>,

    /// New names, trimmed, unique under case-insensitive comparison
    pub new_names: Vec<String>,
}

/// Validates and splits the requested tags without touching the database
pub fn plan(requested: &[TagInput]) -> ServiceResult<ReconcilePlan> {
    if requested.len() > MAX_TAGS_PER_REQUEST {
        return Err(ServiceError::validation(
            "tags",
            format!("At most {} tags are allowed", MAX_TAGS_PER_REQUEST),
        ));
    }

    let mut existing_ids = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut new_names = Vec::new();

    for entry in requested {
        if let Some(id) = entry.id {
            existing_ids.insert(id);
            continue;
        }

        let name = entry.name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("tags", "Tag name must not be empty"));
        }
        if name.chars().count() > TAG_NAME_MAX_LENGTH {
            return Err(ServiceError::validation(
                "tags",
                format!("Tag name must be at most {} characters", TAG_NAME_MAX_LENGTH),
            ));
        }

        if seen.insert(name.to_lowercase()) {
            new_names.push(name.to_string());
        }
    }

    Ok(ReconcilePlan {
        existing_ids: existing_ids.into_iter().collect(),
        new_names,
    })
}

/// Reconciles tags on an open connection (normally a transaction)
///
/// # Returns
///
/// Sorted, duplicate-free tag ids
///
/// # Errors
///
/// - `Validation` for empty or over-long names, or too many entries
/// - `NotFound` if a referenced id does not exist
pub async fn reconcile_tags(
    conn: &mut PgConnection,
    requested: &[TagInput],
) -> ServiceResult<Vec<i32>> {
    let plan = plan(requested)?;

    let mut resolved: BTreeSet<i32> = BTreeSet::new();

    if !plan.existing_ids.is_empty() {
        let found = Tag::existing_ids(&mut *conn, &plan.existing_ids).await?;
        if let Some(missing) = plan.existing_ids.iter().find(|id| !found.contains(id)) {
            return Err(ServiceError::not_found(format!("Tag {} not found", missing)));
        }
        resolved.extend(found);
    }

    for name in &plan.new_names {
        let (tag, created) = Tag::insert_or_get(&mut *conn, name).await?;
        if created {
            info!(tag_id = tag.id, name = %tag.name, "Created tag");
        } else {
            debug!(tag_id = tag.id, requested = %name, stored = %tag.name, "Matched existing tag");
        }
        resolved.insert(tag.id);
    }

    Ok(resolved.into_iter().collect())
}

/// Reconciles tags in a transaction of its own
pub async fn reconcile(pool: &PgPool, requested: &[TagInput]) -> ServiceResult<Vec<i32>> {
    let mut tx = pool.begin().await?;
    let ids = reconcile_tags(&mut tx, requested).await?;
    tx.commit().await?;
    Ok(ids)
}

/// Tag lookup for autocompletion
pub async fn search(pool: &PgPool, prefix: &str, limit: i64) -> ServiceResult<Vec<Tag>> {
    let limit = limit.clamp(1, 100);
    Ok(Tag::search(pool, prefix.trim(), limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_collapses_names_case_insensitively() {
        let plan = plan(&[
            TagInput::named("Go"),
            TagInput::named("go"),
            TagInput::named(" GO "),
        ])
        .unwrap();

        assert_eq!(plan.new_names, vec!["Go".to_string()]);
        assert!(plan.existing_ids.is_empty());
    }

    #[test]
    fn test_plan_splits_references_and_names() {
        let plan = plan(&[
            TagInput::existing(7, "Rust"),
            TagInput::named("Postgres"),
            TagInput::existing(3, "Go"),
            TagInput::existing(7, "Rust"),
        ])
        .unwrap();

        assert_eq!(plan.existing_ids, vec![3, 7]);
        assert_eq!(plan.new_names, vec!["Postgres".to_string()]);
    }

    #[test]
    fn test_plan_rejects_empty_name() {
        let err = plan(&[TagInput::named("   ")]).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn test_plan_rejects_long_name() {
        let err = plan(&[TagInput::named("x".repeat(TAG_NAME_MAX_LENGTH + 1))]).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn test_plan_rejects_too_many_tags() {
        let requested: Vec<TagInput> = (0..=MAX_TAGS_PER_REQUEST)
            .map(|i| TagInput::named(format!("tag{}", i)))
            .collect();
        assert!(plan(&requested).is_err());
    }

    #[test]
    fn test_plan_empty_input() {
        assert_eq!(plan(&[]).unwrap(), ReconcilePlan::default());
    }

    #[test]
    fn test_tag_input_deserializes_without_id() {
        let input: TagInput = serde_json::from_str(r#"{"name":"Rust"}"#).unwrap();
        assert_eq!(input, TagInput::named("Rust"));

        let input: TagInput = serde_json::from_str(r#"{"id":4}"#).unwrap();
        assert_eq!(input.id, Some(4));
    }
}
