use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forms::FormErrors;
use crate::models::{Message, User, UserStats};

// -- Session Claims --

/// Contents of the signed `session` cookie.
///
/// `sub` is `None` for an anonymous visitor. Anonymous visitors still carry a
/// CSRF token so the signup and login forms can be protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Option<i64>,
    pub csrf: String,
    pub exp: usize,
}

// -- Flash --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Danger,
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Info,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Danger,
            message: message.into(),
        }
    }
}

// -- Pages --

/// Envelope shared by every rendered page.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub csrf_token: String,
    pub flashes: Vec<Flash>,
    pub user: Option<UserSummary>,
    #[serde(flatten)]
    pub body: T,
}

/// Fields echoed back when a form is re-presented. Passwords are never echoed.
#[derive(Debug, Default, Serialize)]
pub struct FormPage {
    pub values: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FormErrors>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub image_url: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            image_url: user.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub author: UserSummary,
    pub liked: bool,
}

impl MessageView {
    pub fn new(message: Message, author: UserSummary, liked: bool) -> Self {
        Self {
            id: message.id,
            text: message.text,
            timestamp: message.timestamp,
            author,
            liked,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum HomePage {
    Anonymous,
    Feed { messages: Vec<MessageView> },
}

#[derive(Debug, Serialize)]
pub struct UserListPage {
    pub query: Option<String>,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub profile: User,
    pub stats: UserStats,
    pub is_following: bool,
    pub is_followed_by: bool,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct RelationPage {
    pub profile: UserSummary,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageListPage {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct LikedMessagesPage {
    pub profile: UserSummary,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub message: MessageView,
}

#[derive(Debug, Serialize)]
pub struct EditProfilePage {
    pub profile: User,
    #[serde(flatten)]
    pub form: FormPage,
}
