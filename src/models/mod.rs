pub mod booking;
pub mod catalog;
pub mod notification;
pub mod tutor;

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Account roles. A user created through OAuth has no role until they pick
/// one, hence `Option<Role>` on the user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Tutor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Tutor => "tutor",
            Role::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Represents a user account in the system.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// MongoDB document ID (UUIDv4 string).
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// None for OAuth accounts; such users cannot log in with a password.
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub auth_provider: AuthProvider,
    pub phone: Option<String>,
    pub profile_image: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    /// The JSON shape returned to clients. Never includes the password hash
    /// or reset token.
    pub fn public(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role,
            "auth_provider": self.auth_provider,
            "phone": self.phone,
            "profile_image": self.profile_image,
        })
    }
}

pub fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(20).clamp(1, 100)
}

pub fn page_skip(page: Option<u64>, limit: i64) -> u64 {
    let page = page.unwrap_or(1).max(1);
    (page - 1) * limit as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(page_limit(None), 20);
        assert_eq!(page_limit(Some(500)), 100);
        assert_eq!(page_limit(Some(0)), 1);
        assert_eq!(page_skip(None, 20), 0);
        assert_eq!(page_skip(Some(3), 10), 20);
        assert_eq!(page_skip(Some(0), 10), 0);
    }

    #[test]
    fn public_user_never_leaks_credentials() {
        let user = User {
            id: "u1".into(),
            name: "Nimal".into(),
            email: "nimal@example.com".into(),
            password_hash: Some("$2b$12$hash".into()),
            role: Some(Role::Student),
            auth_provider: AuthProvider::Local,
            phone: None,
            profile_image: None,
            reset_token: Some("tok".into()),
            reset_token_expires_at: Some(DateTime::now()),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let json = user.public();
        assert_eq!(json["email"], "nimal@example.com");
        assert_eq!(json["role"], "student");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_token").is_none());
    }
}
