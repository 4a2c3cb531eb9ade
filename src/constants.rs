/// Application constants

pub const API_VERSION: &str = "v1";

// Defaults for optional configuration
pub const DEFAULT_DATABASE_URL: &str = "sqlite://helps.db";
pub const DEFAULT_SESSION_LIFETIME_DAYS: u32 = 7;
pub const DEFAULT_FEATURED_GAME: &str = "Raid Shadow Legends";
pub const DEFAULT_TOP_GUIDES_LIMIT: u32 = 5;

// Sessions
pub const SESSION_COOKIE_NAME: &str = "session";
pub const SESSION_TOKEN_BYTES: usize = 32;

// Paging
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

// Validation
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_FIELD_LENGTH: usize = 500;
