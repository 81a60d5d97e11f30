/// Startup creation, lookup and editing
///
/// Creation runs in one transaction: tags are reconciled, the startup row is
/// inserted with the acting user as creator and first participant, then tags
/// and images are attached.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::image::Image;
use crate::models::startup::{Startup, StartupDetails};
use crate::models::tag::Tag;
use crate::services::tags::{reconcile_tags, TagInput};

pub const NAME_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MIN_LENGTH: usize = 10;
pub const DESCRIPTION_MAX_LENGTH: usize = 5000;
pub const MAX_IMAGES: usize = 10;
pub const IMAGE_URL_MAX_LENGTH: usize = 2048;

/// Input for [`create_startup`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStartup {
    pub name: String,
    pub description: String,

    #[serde(default)]
    pub tags: Vec<TagInput>,

    /// Image URLs in display order
    #[serde(default)]
    pub images: Vec<String>,
}

/// Input for [`update_startup`]; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupChanges {
    pub name: Option<String>,
    pub description: Option<String>,

    /// Replaces the whole tag set when present
    pub tags: Option<Vec<TagInput>>,
}

fn normalize_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LENGTH {
        return Err(ServiceError::validation(
            "name",
            format!("Name must be 1-{} characters", NAME_MAX_LENGTH),
        ));
    }
    Ok(name.to_string())
}

fn normalize_description(description: &str) -> ServiceResult<String> {
    let description = description.trim();
    let len = description.chars().count();
    if !(DESCRIPTION_MIN_LENGTH..=DESCRIPTION_MAX_LENGTH).contains(&len) {
        return Err(ServiceError::validation(
            "description",
            format!(
                "Description must be {}-{} characters",
                DESCRIPTION_MIN_LENGTH, DESCRIPTION_MAX_LENGTH
            ),
        ));
    }
    Ok(description.to_string())
}

/// Parses an image URL; only absolute http(s) URLs with a host pass
pub fn validate_image_url(field: &str, url: &str) -> ServiceResult<String> {
    let url = url.trim();
    let invalid = || ServiceError::validation(field, format!("Invalid image URL: {}", url));

    if url.len() > IMAGE_URL_MAX_LENGTH {
        return Err(invalid());
    }

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }

    Ok(url.to_string())
}

fn normalize_images(images: &[String]) -> ServiceResult<Vec<String>> {
    if images.len() > MAX_IMAGES {
        return Err(ServiceError::validation(
            "images",
            format!("At most {} images are allowed", MAX_IMAGES),
        ));
    }

    images
        .iter()
        .map(|url| validate_image_url("images", url))
        .collect()
}

impl NewStartup {
    /// Trims and checks every field, returning the normalized input
    pub fn validate(&self) -> ServiceResult<NewStartup> {
        Ok(NewStartup {
            name: normalize_name(&self.name)?,
            description: normalize_description(&self.description)?,
            tags: self.tags.clone(),
            images: normalize_images(&self.images)?,
        })
    }
}

/// Creates a startup owned by `actor_id`
///
/// The creator is a participant as soon as the transaction commits.
///
/// # Errors
///
/// - `Validation` for bad name, description, images or tag names
/// - `NotFound` if a referenced tag id does not exist
pub async fn create_startup(
    pool: &PgPool,
    actor_id: Uuid,
    input: &NewStartup,
) -> ServiceResult<StartupDetails> {
    let input = input.validate()?;

    let mut tx = pool.begin().await?;

    let tag_ids = reconcile_tags(&mut tx, &input.tags).await?;
    let startup =
        Startup::create_with_creator(&mut tx, &input.name, &input.description, actor_id).await?;
    Tag::replace_for_startup(&mut tx, startup.id, &tag_ids).await?;
    Image::create_for_startup(&mut tx, startup.id, &input.images).await?;

    let startup_id = startup.id;
    let details = Startup::load_details(&mut tx, vec![startup])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    tx.commit().await?;

    info!(
        startup_id = %startup_id,
        creator_id = %actor_id,
        tags = tag_ids.len(),
        images = input.images.len(),
        "Startup created"
    );

    Ok(details)
}

/// Loads a startup with its relations
pub async fn get_startup(pool: &PgPool, startup_id: Uuid) -> ServiceResult<StartupDetails> {
    let mut conn = pool.acquire().await?;

    let startup = Startup::find_by_id(&mut *conn, startup_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    Startup::load_details(&mut conn, vec![startup])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Startup not found"))
}

/// Edits a startup; only its creator may do so
///
/// # Errors
///
/// - `NotFound` if the startup does not exist
/// - `Forbidden` if `actor_id` is not the creator
/// - `Validation` / `NotFound` from field and tag checks
pub async fn update_startup(
    pool: &PgPool,
    actor_id: Uuid,
    startup_id: Uuid,
    changes: &StartupChanges,
) -> ServiceResult<StartupDetails> {
    let name = changes.name.as_deref().map(normalize_name).transpose()?;
    let description = changes
        .description
        .as_deref()
        .map(normalize_description)
        .transpose()?;

    let mut tx = pool.begin().await?;

    let startup = Startup::find_by_id_for_update(&mut tx, startup_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    if startup.creator_id != actor_id {
        return Err(ServiceError::forbidden(
            "Only the startup's creator can edit it",
        ));
    }

    let startup = Startup::update(&mut *tx, startup_id, name.as_deref(), description.as_deref())
        .await?
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    if let Some(tags) = &changes.tags {
        let tag_ids = reconcile_tags(&mut tx, tags).await?;
        Tag::replace_for_startup(&mut tx, startup_id, &tag_ids).await?;
    }

    let details = Startup::load_details(&mut tx, vec![startup])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Startup not found"))?;

    tx.commit().await?;

    info!(startup_id = %startup_id, "Startup updated");
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewStartup {
        NewStartup {
            name: "  Solar Grid  ".to_string(),
            description: "Peer-to-peer energy trading".to_string(),
            tags: vec![TagInput::named("Energy")],
            images: vec!["https://cdn.example.com/a.png".to_string()],
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let input = valid().validate().unwrap();
        assert_eq!(input.name, "Solar Grid");
        assert_eq!(input.images.len(), 1);
    }

    #[test]
    fn test_validate_rejects_short_description() {
        let mut input = valid();
        input.description = "too short".to_string();
        let err = input.validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "description"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut input = valid();
        input.name = "   ".to_string();
        assert!(input.validate().is_err());

        input.name = "x".repeat(NAME_MAX_LENGTH + 1);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_validate_images() {
        let mut input = valid();
        input.images = vec!["ftp://example.com/a.png".to_string()];
        assert!(input.validate().is_err());

        input.images = vec!["https://".to_string()];
        assert!(input.validate().is_err());

        input.images = (0..=MAX_IMAGES)
            .map(|i| format!("https://example.com/{}.png", i))
            .collect();
        assert!(input.validate().is_err());

        input.images = vec!["http://example.com/a.png".to_string()];
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_image_urls() {
        for url in [
            "https://not a url at all",
            "http://[",
            "mailto:founder@example.com",
            "/relative/logo.png",
            "https//missing-colon.example.com",
        ] {
            let mut input = valid();
            input.images = vec![url.to_string()];
            assert!(input.validate().is_err(), "{} should be rejected", url);
        }

        let long = format!("https://example.com/{}", "a".repeat(IMAGE_URL_MAX_LENGTH));
        assert!(validate_image_url("images", &long).is_err());

        assert_eq!(
            validate_image_url("image", " https://cdn.example.com/me.png ").unwrap(),
            "https://cdn.example.com/me.png"
        );
    }

    #[test]
    fn test_changes_deserialize_partial() {
        let changes: StartupChanges = serde_json::from_str(r#"{"name":"New"}"#).unwrap();
        assert_eq!(changes.name.as_deref(), Some("New"));
        assert!(changes.description.is_none());
        assert!(changes.tags.is_none());
    }
}
