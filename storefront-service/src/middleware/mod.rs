pub mod auth;
pub mod session;
pub mod svix;

pub use auth::{AdminUser, AuthUser, OptionalAuth, RequireAuth};
pub use session::CartIdentity;
