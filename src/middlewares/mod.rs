pub mod auth;
pub mod cors;

pub use auth::GuestAuthMiddleware;
pub use cors::create_cors;
