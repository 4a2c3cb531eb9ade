// src/models/mod.rs
pub mod game;
pub mod guide;
pub mod response;
pub mod user;

pub use game::{Game, GameWithGuides};
pub use guide::{Guide, GuideDetails, GuideUpdate, NewGuide};
pub use response::{ApiResponse, MessageResponse, PaginatedResponse};
pub use user::{PublicUser, Session, User, UserUpdate};
