//! Domain layer: user identity and the user entity.
//!
//! These types are shared by both sides of the command bus: the gateway
//! sends them as command payloads and the command server returns them as
//! reply data and event data.

pub mod user;
pub mod user_id;

pub use user::{CreateUserInput, UnknownStatus, UpdateUserInput, User, UserStatus};
pub use user_id::UserId;
