/// User profiles: lookup, editing and skill tags

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{unique_violation, ServiceError, ServiceResult};
use crate::models::startup::{Startup, StartupRef};
use crate::models::tag::{Tag, TagRef};
use crate::models::user::{validate_username, UpdateUser, User};
use crate::services::startups::{validate_image_url, IMAGE_URL_MAX_LENGTH};
use crate::services::tags::{reconcile_tags, TagInput};

pub const NAME_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MAX_LENGTH: usize = 2000;

const USERNAME_CONSTRAINT: &str = "users_username_key";

/// A user with tags and startup memberships
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub tags: Vec<TagRef>,
    pub created_startups: Vec<StartupRef>,
    pub participating_startups: Vec<StartupRef>,
}

/// Profile edits; `None` leaves a field unchanged, an empty string clears it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Maps an optional text field to a column update: blank clears it
fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ServiceResult<Option<Option<String>>> {
    let Some(value) = value else {
        return Ok(None);
    };

    let value = value.trim();
    if value.is_empty() {
        return Ok(Some(None));
    }
    if value.chars().count() > max {
        return Err(ServiceError::validation(
            field,
            format!("Must be at most {} characters", max),
        ));
    }
    Ok(Some(Some(value.to_string())))
}

impl ProfileChanges {
    /// Validates and converts into a model update
    pub fn into_update(self) -> ServiceResult<UpdateUser> {
        let username = match self.username.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(None),
            Some(username) => {
                validate_username(username)?;
                Some(Some(username.to_string()))
            }
        };

        Ok(UpdateUser {
            username,
            name: optional_text("name", self.name.as_deref(), NAME_MAX_LENGTH)?,
            description: optional_text(
                "description",
                self.description.as_deref(),
                DESCRIPTION_MAX_LENGTH,
            )?,
            image: match optional_text("image", self.image.as_deref(), IMAGE_URL_MAX_LENGTH)? {
                Some(Some(url)) => Some(Some(validate_image_url("image", &url)?)),
                other => other,
            },
        })
    }
}

async fn build_profile(pool: &PgPool, user: User) -> ServiceResult<Profile> {
    let tags = Tag::list_for_user(pool, user.id).await?;
    let created_startups = Startup::list_created_by(pool, user.id).await?;
    let participating_startups = Startup::list_participating(pool, user.id).await?;

    Ok(Profile {
        user,
        tags,
        created_startups,
        participating_startups,
    })
}

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> ServiceResult<Profile> {
    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    build_profile(pool, user).await
}

pub async fn get_profile_by_username(pool: &PgPool, username: &str) -> ServiceResult<Profile> {
    let user = User::find_by_username(pool, username)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    build_profile(pool, user).await
}

/// Edits the acting user's own profile
///
/// # Errors
///
/// - `Validation` for a malformed username or over-long field
/// - `InvalidState` if the username is taken
pub async fn update_profile(
    pool: &PgPool,
    actor_id: Uuid,
    changes: ProfileChanges,
) -> ServiceResult<Profile> {
    let update = changes.into_update()?;

    let user = User::update(pool, actor_id, update)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(constraint) if constraint == USERNAME_CONSTRAINT => {
                ServiceError::invalid_state("Username is already taken")
            }
            _ => ServiceError::from(e),
        })?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;

    info!(user_id = %actor_id, "Profile updated");
    build_profile(pool, user).await
}

/// Replaces the acting user's skill tags
pub async fn update_user_tags(
    pool: &PgPool,
    actor_id: Uuid,
    tags: &[TagInput],
) -> ServiceResult<Vec<TagRef>> {
    let mut tx = pool.begin().await?;

    if User::find_by_id(&mut *tx, actor_id).await?.is_none() {
        return Err(ServiceError::not_found("User not found"));
    }

    let tag_ids = reconcile_tags(&mut tx, tags).await?;
    Tag::replace_for_user(&mut tx, actor_id, &tag_ids).await?;
    let tags = Tag::list_for_user(&mut *tx, actor_id).await?;

    tx.commit().await?;

    info!(user_id = %actor_id, count = tags.len(), "User tags replaced");
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_update_leaves_absent_fields() {
        let update = ProfileChanges::default().into_update().unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_into_update_clears_blank_fields() {
        let update = ProfileChanges {
            name: Some("  ".to_string()),
            username: Some(String::new()),
            ..Default::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.name, Some(None));
        assert_eq!(update.username, Some(None));
        assert!(update.description.is_none());
    }

    #[test]
    fn test_into_update_validates_username() {
        let err = ProfileChanges {
            username: Some("no spaces".to_string()),
            ..Default::default()
        }
        .into_update()
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "username"));

        let update = ProfileChanges {
            username: Some(" ada_99 ".to_string()),
            ..Default::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(update.username, Some(Some("ada_99".to_string())));
    }

    #[test]
    fn test_into_update_validates_image_url() {
        let err = ProfileChanges {
            image: Some("not a url".to_string()),
            ..Default::default()
        }
        .into_update()
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "image"));

        let update = ProfileChanges {
            image: Some("https://cdn.example.com/avatar.png".to_string()),
            ..Default::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(
            update.image,
            Some(Some("https://cdn.example.com/avatar.png".to_string()))
        );

        let cleared = ProfileChanges {
            image: Some(String::new()),
            ..Default::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(cleared.image, Some(None));
    }

    #[test]
    fn test_into_update_rejects_long_description() {
        let result = ProfileChanges {
            description: Some("x".repeat(DESCRIPTION_MAX_LENGTH + 1)),
            ..Default::default()
        }
        .into_update();
        assert!(result.is_err());
    }
}
