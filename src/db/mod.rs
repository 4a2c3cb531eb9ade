use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::*,
    utils::escape_like,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

const USER_COLUMNS: &str =
    "id, username, email, phone, password_hash, reset_token_digest, created_at";

const GUIDE_COLUMNS: &str = "id, title, content, link, video, image, usage_count, user_id, \
     game_id, created_at, updated_at";

const GUIDE_DETAILS_SELECT: &str = "SELECT g.id, g.title, g.content, g.link, g.video, g.image, \
     g.usage_count, g.user_id, g.game_id, g.created_at, g.updated_at, \
     gm.name AS game_name, u.username AS author \
     FROM guides g \
     JOIN games gm ON gm.id = g.game_id \
     JOIN users u ON u.id = g.user_id";

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives exactly as long as its single connection.
        let in_memory = config.database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.database_max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ==================== USER QUERIES ====================
impl Database {
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        phone: &str,
        password_hash: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, phone, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Looks a user up by username, email or phone, whichever matches.
    pub async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE username = ? OR email = ? OR phone = ?
             ORDER BY id
             LIMIT 1"
        ))
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                username = COALESCE(?, username),
                email = COALESCE(?, email),
                phone = COALESCE(?, phone),
                password_hash = COALESCE(?, password_hash)
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(update.username.as_deref())
        .bind(update.email.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.password_hash.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn set_reset_token(&self, user_id: i64, token_digest: &str) -> Result<()> {
        sqlx::query("UPDATE users SET reset_token_digest = ? WHERE id = ?")
            .bind(token_digest)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Swaps in a new password for the holder of the reset token and burns the token.
    /// Returns the user id, or `None` when no user holds that token.
    pub async fn consume_reset_token(
        &self,
        token_digest: &str,
        password_hash: &str,
    ) -> Result<Option<i64>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET password_hash = ?, reset_token_digest = NULL
             WHERE reset_token_digest = ?
             RETURNING id",
        )
        .bind(password_hash)
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }
}

// ==================== SESSION QUERIES ====================
impl Database {
    /// Stores a session, dropping whatever session the user had before.
    pub async fn create_session(&self, session: &Session) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO sessions (token_digest, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token_digest)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_session(&self, token_digest: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token_digest, user_id, created_at, expires_at
             FROM sessions WHERE token_digest = ?",
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn extend_session(
        &self,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET expires_at = ? WHERE token_digest = ?")
            .bind(expires_at)
            .bind(token_digest)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_session(&self, token_digest: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_digest = ?")
            .bind(token_digest)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user_sessions(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ==================== GAME QUERIES ====================
impl Database {
    pub async fn create_game(&self, name: &str) -> Result<Game> {
        let game = sqlx::query_as::<_, Game>(
            "INSERT INTO games (name, created_at) VALUES (?, ?)
             RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(game)
    }

    pub async fn get_game(&self, id: i64) -> Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>("SELECT id, name, created_at FROM games WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(game)
    }

    pub async fn get_game_by_name(&self, name: &str) -> Result<Option<Game>> {
        let game =
            sqlx::query_as::<_, Game>("SELECT id, name, created_at FROM games WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(game)
    }

    pub async fn list_games(&self) -> Result<Vec<Game>> {
        let games =
            sqlx::query_as::<_, Game>("SELECT id, name, created_at FROM games ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(games)
    }

    pub async fn rename_game(&self, id: i64, name: &str) -> Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>(
            "UPDATE games SET name = ? WHERE id = ?
             RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(game)
    }

    pub async fn delete_game(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_game_guides(&self, game_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM guides WHERE game_id = ?")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// ==================== GUIDE QUERIES ====================
impl Database {
    pub async fn create_guide(&self, guide: &NewGuide) -> Result<Guide> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Guide>(&format!(
            "INSERT INTO guides
                (title, content, link, video, image, usage_count, user_id, game_id,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
             RETURNING {GUIDE_COLUMNS}"
        ))
        .bind(&guide.title)
        .bind(&guide.content)
        .bind(&guide.link)
        .bind(&guide.video)
        .bind(&guide.image)
        .bind(guide.user_id)
        .bind(guide.game_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn get_guide(&self, id: i64) -> Result<Option<Guide>> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            "SELECT {GUIDE_COLUMNS} FROM guides WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(guide)
    }

    pub async fn get_guide_details(&self, id: i64) -> Result<Option<GuideDetails>> {
        let guide =
            sqlx::query_as::<_, GuideDetails>(&format!("{GUIDE_DETAILS_SELECT} WHERE g.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(guide)
    }

    pub async fn list_all_guides(&self) -> Result<Vec<GuideDetails>> {
        let guides =
            sqlx::query_as::<_, GuideDetails>(&format!("{GUIDE_DETAILS_SELECT} ORDER BY g.id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(guides)
    }

    pub async fn list_guides_page(&self, limit: i64, offset: i64) -> Result<Vec<GuideDetails>> {
        let guides = sqlx::query_as::<_, GuideDetails>(&format!(
            "{GUIDE_DETAILS_SELECT} ORDER BY g.id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(guides)
    }

    pub async fn count_guides(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM guides")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_game_guides(&self, game_id: i64) -> Result<Vec<GuideDetails>> {
        let guides = sqlx::query_as::<_, GuideDetails>(&format!(
            "{GUIDE_DETAILS_SELECT} WHERE g.game_id = ? ORDER BY g.id"
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(guides)
    }

    /// Guides written by `user_id`; with a search term, only those whose title contains it.
    pub async fn list_user_guides(
        &self,
        user_id: i64,
        search: Option<&str>,
    ) -> Result<Vec<GuideDetails>> {
        let guides = match search {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(term));
                sqlx::query_as::<_, GuideDetails>(&format!(
                    "{GUIDE_DETAILS_SELECT}
                     WHERE g.user_id = ? AND g.title LIKE ? ESCAPE '\\'
                     ORDER BY g.id"
                ))
                .bind(user_id)
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, GuideDetails>(&format!(
                    "{GUIDE_DETAILS_SELECT} WHERE g.user_id = ? ORDER BY g.id"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(guides)
    }

    pub async fn top_guides(&self, limit: i64) -> Result<Vec<GuideDetails>> {
        let guides = sqlx::query_as::<_, GuideDetails>(&format!(
            "{GUIDE_DETAILS_SELECT} ORDER BY g.usage_count DESC, g.id LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(guides)
    }

    /// Guides of every game except `game_name`.
    pub async fn list_guides_excluding_game(&self, game_name: &str) -> Result<Vec<GuideDetails>> {
        let guides = sqlx::query_as::<_, GuideDetails>(&format!(
            "{GUIDE_DETAILS_SELECT} WHERE gm.name <> ? ORDER BY g.id"
        ))
        .bind(game_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(guides)
    }

    pub async fn update_guide(&self, id: i64, update: &GuideUpdate) -> Result<Option<Guide>> {
        let guide = sqlx::query_as::<_, Guide>(&format!(
            "UPDATE guides SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                link = COALESCE(?, link),
                video = COALESCE(?, video),
                image = COALESCE(?, image),
                updated_at = ?
             WHERE id = ?
             RETURNING {GUIDE_COLUMNS}"
        ))
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(update.link.as_deref())
        .bind(update.video.as_deref())
        .bind(update.image.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(guide)
    }

    pub async fn delete_guide(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM guides WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_guide_usage(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE guides SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::new(&crate::config::test_config())
        .await
        .expect("in-memory database");
    db.run_migrations().await.expect("migrations");
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed_user(db: &Database, name: &str) -> User {
        db.create_user(
            name,
            &format!("{name}@example.com"),
            &format!("+1-{name}"),
            "$argon2id$placeholder",
        )
        .await
        .unwrap()
    }

    fn new_guide(title: &str, user_id: i64, game_id: i64) -> NewGuide {
        NewGuide {
            title: title.to_string(),
            content: "content".to_string(),
            link: "http://example.com".to_string(),
            video: "http://example.com/video".to_string(),
            image: "http://example.com/image".to_string(),
            user_id,
            game_id,
        }
    }

    #[tokio::test]
    async fn database_new_returns_error_on_invalid_url() {
        let mut config = crate::config::test_config();
        config.database_url = "sqlite:///nonexistent-dir/nested/helps.db".to_string();
        assert!(Database::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn find_user_by_any_identifier() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;

        for identifier in [&user.username, &user.email, &user.phone] {
            let found = db.find_user_by_identifier(identifier).await.unwrap();
            assert_eq!(found.map(|u| u.id), Some(user.id));
        }
        assert!(db.find_user_by_identifier("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_unique_violation() {
        let db = test_db().await;
        seed_user(&db, "alice").await;
        let err = db
            .create_user("alice", "other@example.com", "+999", "hash")
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn update_user_only_touches_given_fields() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let updated = db
            .update_user(
                user.id,
                &UserUpdate {
                    email: Some("new@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.phone, user.phone);
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        db.set_reset_token(user.id, "digest").await.unwrap();

        let first = db.consume_reset_token("digest", "new-hash").await.unwrap();
        assert_eq!(first, Some(user.id));
        let second = db.consume_reset_token("digest", "other").await.unwrap();
        assert_eq!(second, None);

        let reloaded = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
        assert!(reloaded.reset_token_digest.is_none());
    }

    #[tokio::test]
    async fn new_session_replaces_previous_one() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let now = Utc::now();
        for digest in ["first", "second"] {
            db.create_session(&Session {
                token_digest: digest.to_string(),
                user_id: user.id,
                created_at: now,
                expires_at: now + Duration::days(7),
            })
            .await
            .unwrap();
        }

        assert!(db.get_session("first").await.unwrap().is_none());
        let session = db.get_session("second").await.unwrap().unwrap();
        assert_eq!(session.user_id, user.id);
        assert!(db.delete_session("second").await.unwrap());
        assert!(!db.delete_session("second").await.unwrap());
    }

    #[tokio::test]
    async fn backdated_session_reads_as_expired_until_extended() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let now = Utc::now();
        db.create_session(&Session {
            token_digest: "stale".to_string(),
            user_id: user.id,
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        })
        .await
        .unwrap();

        let session = db.get_session("stale").await.unwrap().unwrap();
        assert!(session.is_expired(now));

        assert!(db.extend_session("stale", now + Duration::days(7)).await.unwrap());
        let session = db.get_session("stale").await.unwrap().unwrap();
        assert!(!session.is_expired(now));
        assert!(!db.extend_session("missing", now).await.unwrap());
    }

    #[tokio::test]
    async fn top_guides_order_by_usage() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let game = db.create_game("Chess").await.unwrap();
        let a = db.create_guide(&new_guide("A", user.id, game.id)).await.unwrap();
        let b = db.create_guide(&new_guide("B", user.id, game.id)).await.unwrap();
        db.increment_guide_usage(b.id).await.unwrap();
        db.increment_guide_usage(b.id).await.unwrap();
        db.increment_guide_usage(a.id).await.unwrap();

        let top = db.top_guides(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].guide.id, b.id);
        assert_eq!(top[0].guide.usage_count, 2);
        assert_eq!(top[0].game_name, "Chess");
        assert_eq!(top[0].author, "alice");
    }

    #[tokio::test]
    async fn title_search_treats_wildcards_literally() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let game = db.create_game("Chess").await.unwrap();
        db.create_guide(&new_guide("Opening 100% safe", user.id, game.id))
            .await
            .unwrap();
        db.create_guide(&new_guide("Endgame basics", user.id, game.id))
            .await
            .unwrap();

        let hits = db.list_user_guides(user.id, Some("100%")).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = db.list_user_guides(user.id, Some("%")).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = db.list_user_guides(user.id, Some("endgame")).await.unwrap();
        assert_eq!(hits.len(), 1);
        let all = db.list_user_guides(user.id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn excluding_game_filters_by_name() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let featured = db.create_game("Raid Shadow Legends").await.unwrap();
        let other = db.create_game("Chess").await.unwrap();
        db.create_guide(&new_guide("Raid tips", user.id, featured.id))
            .await
            .unwrap();
        db.create_guide(&new_guide("Chess tips", user.id, other.id))
            .await
            .unwrap();

        let others = db
            .list_guides_excluding_game("Raid Shadow Legends")
            .await
            .unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].guide.title, "Chess tips");

        let featured_guides = db.list_game_guides(featured.id).await.unwrap();
        assert_eq!(featured_guides.len(), 1);
        assert_eq!(db.count_game_guides(other.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn partial_guide_update_keeps_other_fields() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let game = db.create_game("Chess").await.unwrap();
        let guide = db.create_guide(&new_guide("Old", user.id, game.id)).await.unwrap();

        let updated = db
            .update_guide(
                guide.id,
                &GuideUpdate {
                    title: Some("New".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.content, "content");
        assert!(db.update_guide(9999, &GuideUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn guides_page_and_count() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let game = db.create_game("Chess").await.unwrap();
        for i in 0..5 {
            db.create_guide(&new_guide(&format!("G{i}"), user.id, game.id))
                .await
                .unwrap();
        }
        let page = db.list_guides_page(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].guide.title, "G2");
        assert_eq!(db.count_guides().await.unwrap(), 5);
    }
}
