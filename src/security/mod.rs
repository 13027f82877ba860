pub mod auth;
pub mod firebase;
