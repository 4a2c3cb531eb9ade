pub mod hash;
pub mod password;
pub mod token;
