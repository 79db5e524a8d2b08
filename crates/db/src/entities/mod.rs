//! Database entities.

pub mod friend;
pub mod user;

pub use friend::Entity as Friend;
pub use user::Entity as User;
