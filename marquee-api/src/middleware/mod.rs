pub mod auth;

pub use auth::{auth_required, require_admin, AuthUser};
