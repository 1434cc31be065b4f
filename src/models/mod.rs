//! Data models shared across the service.

pub mod user;

pub use user::UserProfile;
