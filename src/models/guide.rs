use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guide {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub link: String,
    pub video: String,
    pub image: String,
    pub usage_count: i64,
    pub user_id: i64,
    pub game_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A guide joined with the names a reader needs: its game and its author.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GuideDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub guide: Guide,
    pub game_name: String,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct NewGuide {
    pub title: String,
    pub content: String,
    pub link: String,
    pub video: String,
    pub image: String,
    pub user_id: i64,
    pub game_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct GuideUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub video: Option<String>,
    pub image: Option<String>,
}

impl GuideUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.link.is_none()
            && self.video.is_none()
            && self.image.is_none()
    }
}
