//! Business operations shared by the HTTP handlers and the CLI.
//!
//! Functions here take the store and blob storage explicitly and return the
//! crate [`Error`](crate::error::Error); the HTTP layer only maps errors to
//! status codes.

mod contributions;
mod reports;
mod resources;

pub use contributions::{MAX_UPDATE_ATTEMPTS, get_for_user, record_action};
pub use reports::{
    ActivityEntry, ActivityKind, Dashboard, LEADERBOARD_LIMIT, Profile, PublicUser, RECENT_LIMIT,
    dashboard, leaderboard, profile,
};
pub use resources::{
    Download, MAX_COMMENT_LEN, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN, MAX_TOPIC_LEN, NewResource,
    add_review, create_resource, delete_resource, get_resource, list_resources, open_download,
};
