//! Database repositories.

pub mod friend;
pub mod user;

pub use friend::FriendRepository;
pub use user::UserRepository;
