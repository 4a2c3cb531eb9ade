use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::guide::GuideDetails;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Game {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GameWithGuides {
    #[serde(flatten)]
    pub game: Game,
    pub guides: Vec<GuideDetails>,
}
