mod helpers;
mod middleware;
mod token;

pub use helpers::{extract_basic_auth_token, extract_token_from_header};
pub use middleware::{AuthError, RequireAdmin, RequireUser};
pub use token::{TokenGenerator, parse_token};
