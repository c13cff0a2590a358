//! Per-user profile data, kept in memory for the life of the process.

pub mod model;
pub mod store;

pub use model::UserProfile;
pub use store::{ProfileHandle, ProfileStore};
