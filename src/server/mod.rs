mod admin;
mod api;
pub mod dto;
pub mod extract;
pub mod response;
mod router;
pub mod validation;

pub use admin::admin_router;
pub use api::api_router;
pub use router::{AppState, MULTIPART_OVERHEAD_BYTES, create_router};
