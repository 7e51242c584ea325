//! Bearer token authentication.

mod bearer;

pub use bearer::AuthUser;
