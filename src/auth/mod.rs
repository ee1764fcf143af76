pub mod claims;
pub mod context;
pub mod middleware;

pub use context::CurrentUser;
pub use middleware::RequireAuth;
