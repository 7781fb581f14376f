use crate::store::LiveStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use tracing::info;

/// Signed-in user as returned by the auth endpoints
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Notification and map preferences; not interpreted by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Who is signed in.
///
/// Logging out drops every cached record along with the user.
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user: User) {
        info!(user_id = %user.id, "User signed in");
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn logout(&self, store: &LiveStore) {
        let previous = self.user.write().unwrap_or_else(|e| e.into_inner()).take();
        store.reset();
        if let Some(user) = previous {
            info!(user_id = %user.id, "User signed out");
        }
    }
}
