//! Database row types. These map directly to SQLite rows and are kept apart
//! from the warbler-types models so the password hash stays in this crate.

use chrono::{DateTime, Utc};
use warbler_types::api::UserSummary;
use warbler_types::models::{Message, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    /// Argon2 PHC string.
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl UserRow {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            image_url: row.image_url,
            header_image_url: row.header_image_url,
            bio: row.bio,
            location: row.location,
        }
    }
}

/// A message joined with the author columns a listing needs.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub author_username: String,
    pub author_image_url: String,
}

impl MessageRow {
    pub fn author(&self) -> UserSummary {
        UserSummary {
            id: self.user_id,
            username: self.author_username.clone(),
            image_url: self.author_image_url.clone(),
        }
    }

    pub fn into_parts(self) -> (Message, UserSummary) {
        let author = self.author();
        let message = Message {
            id: self.id,
            text: self.text,
            timestamp: self.timestamp,
            user_id: self.user_id,
        };
        (message, author)
    }
}
