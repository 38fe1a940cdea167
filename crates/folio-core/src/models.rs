//! Core data models for folio.
//!
//! These types are shared across all folio crates and represent the domain
//! entities as they are stored and as they are returned over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// =============================================================================
// USER TYPES
// =============================================================================

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "member" => Ok(UserRole::Member),
            other => Err(Error::validation(
                "userRole",
                format!("The selected userRole '{}' is invalid.", other),
            )),
        }
    }
}

/// A user account (password hash is never part of this type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub username: String,
    #[serde(rename = "userRole")]
    pub user_role: UserRole,
    pub bio: Option<String>,
    pub avatar_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_role == UserRole::Admin
    }
}

/// Public projection of a user, used for author display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            avatar_id: user.avatar_id,
            created_at: user.created_at,
        }
    }
}

// =============================================================================
// IMAGE TYPES
// =============================================================================

/// An uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    /// Public URL of the backing file.
    pub url: String,
    /// Display name (upload title or original filename).
    pub name: Option<String>,
    pub user_id: Option<i64>,
    /// Note the image was uploaded for, if any.
    pub note_id: Option<i64>,
    /// Path of the backing file relative to the storage root.
    #[serde(skip_serializing, default)]
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image removed by the orphan reaper.
///
/// The database record is already gone; `storage_path` names the backing
/// file that still has to be removed from the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapedImage {
    pub id: i64,
    pub storage_path: String,
}

// =============================================================================
// TAG TYPES
// =============================================================================

/// A tag shared between notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A note row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    /// Unique, date-prefixed slug (`2026-10-19-my-title`).
    pub slug: String,
    pub lead: String,
    /// Rich-text content tree.
    pub content: JsonValue,
    pub user_id: i64,
    pub main_visual_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note together with its tags and main visual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteWithRelations {
    #[serde(flatten)]
    pub note: Note,
    pub tags: Vec<Tag>,
    pub main_visual: Option<Image>,
}

// =============================================================================
// AUTH TYPES
// =============================================================================

/// Identity of the caller of a request.
#[derive(Debug, Clone)]
pub enum AuthPrincipal {
    User {
        user_id: i64,
        username: String,
        role: UserRole,
    },
    Anonymous,
}

impl AuthPrincipal {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthPrincipal::Anonymous)
    }

    /// ID of the authenticated user, if any.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            AuthPrincipal::User { user_id, .. } => Some(*user_id),
            AuthPrincipal::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            AuthPrincipal::User {
                role: UserRole::Admin,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_note() -> Note {
        Note {
            id: 1,
            title: "Hello".to_string(),
            slug: "2026-10-19-hello".to_string(),
            lead: "Lead".to_string(),
            content: json!({"type": "doc", "content": []}),
            user_id: 9,
            main_visual_id: Some(4),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("member".parse::<UserRole>().unwrap(), UserRole::Member);
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!(UserRole::default(), UserRole::Member);
    }

    #[test]
    fn test_user_serializes_camel_case_names() {
        let user = User {
            id: 1,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            user_role: UserRole::Admin,
            bio: None,
            avatar_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["firstName"], "Ada");
        assert_eq!(value["userRole"], "admin");
        assert!(value.get("first_name").is_none());

        let public = PublicUser::from(&user);
        let value = serde_json::to_value(&public).unwrap();
        assert!(value.get("email").is_none());
    }

    #[test]
    fn test_image_hides_storage_path() {
        let image = Image {
            id: 3,
            url: "http://localhost:3000/storage/uploads/ada/a.png".to_string(),
            name: Some("a.png".to_string()),
            user_id: Some(1),
            note_id: None,
            storage_path: "uploads/ada/a.png".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&image).unwrap();
        assert!(value.get("storage_path").is_none());
        assert_eq!(value["id"], 3);
    }

    #[test]
    fn test_note_with_relations_flattens_note() {
        let full = NoteWithRelations {
            note: sample_note(),
            tags: vec![],
            main_visual: None,
        };
        let value = serde_json::to_value(&full).unwrap();
        assert_eq!(value["slug"], "2026-10-19-hello");
        assert_eq!(value["main_visual_id"], 4);
        assert!(value["tags"].as_array().unwrap().is_empty());
        assert!(value["main_visual"].is_null());
    }

    #[test]
    fn test_auth_principal() {
        let anon = AuthPrincipal::Anonymous;
        assert!(!anon.is_authenticated());
        assert_eq!(anon.user_id(), None);
        assert!(!anon.is_admin());

        let admin = AuthPrincipal::User {
            user_id: 5,
            username: "root".to_string(),
            role: UserRole::Admin,
        };
        assert!(admin.is_authenticated());
        assert_eq!(admin.user_id(), Some(5));
        assert!(admin.is_admin());
    }
}
