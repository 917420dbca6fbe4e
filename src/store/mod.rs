mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn set_user_top_subjects(&self, id: &str, subjects: &[String]) -> Result<()>;
    /// Deletes the user with their tokens, resources, reviews and contribution.
    /// Ratings of resources the user had reviewed are recomputed. Returns the
    /// blob keys of the deleted resources, or `None` if there was no such user.
    fn delete_user(&self, id: &str) -> Result<Option<Vec<String>>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Resource operations. Reads carry the owner's display name; reviews are
    // loaded separately.
    fn create_resource(&self, resource: &Resource) -> Result<()>;
    fn get_resource(&self, id: &str) -> Result<Option<Resource>>;
    fn list_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>>;
    fn list_user_resources(&self, user_id: &str, limit: i32) -> Result<Vec<Resource>>;
    fn list_recommended_resources(
        &self,
        subjects: &[String],
        exclude_user_id: &str,
        limit: i32,
    ) -> Result<Vec<Resource>>;
    fn delete_resource(&self, id: &str) -> Result<bool>;

    // Review operations
    /// Inserts the review and recomputes the resource's rating and review
    /// count in one transaction. Returns the updated resource.
    fn add_review(&self, review: &Review) -> Result<Resource>;
    fn list_reviews(&self, resource_id: &str) -> Result<Vec<Review>>;
    fn list_user_reviews(&self, user_id: &str, limit: i32) -> Result<Vec<UserReview>>;

    // Contribution operations
    fn get_contribution(&self, user_id: &str) -> Result<Option<Contribution>>;
    /// Fails with `AlreadyExists` if the user already has a record.
    fn insert_contribution(&self, contribution: &Contribution) -> Result<()>;
    /// Compare-and-swap on `version`. Returns false if the stored version no
    /// longer matches `expected_version`; on success the stored version is
    /// `expected_version + 1`.
    fn update_contribution(&self, contribution: &Contribution, expected_version: i64)
    -> Result<bool>;
    fn leaderboard(&self, limit: i32) -> Result<Vec<LeaderboardEntry>>;

    // Admin token check
    fn has_admin_token(&self) -> Result<bool>;
}
