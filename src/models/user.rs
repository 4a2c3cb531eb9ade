use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ==================== USER ====================
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub reset_token_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What clients get to see of a user. Never carries hashes or tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            created_at: user.created_at,
        }
    }
}

/// Fields a user may change on their own profile. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.password_hash.is_none()
    }
}

// ==================== SESSION ====================
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_digest: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: "+100200300".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            reset_token_digest: Some("abc".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_user_drops_secrets() {
        let public = PublicUser::from(sample_user());
        let json = serde_json::to_value(&public).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_token_digest").is_none());
    }

    #[test]
    fn empty_update_detected() {
        assert!(UserUpdate::default().is_empty());
        let update = UserUpdate {
            phone: Some("1".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = Session {
            token_digest: "d".to_string(),
            user_id: 1,
            created_at: now - Duration::days(7),
            expires_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }
}
