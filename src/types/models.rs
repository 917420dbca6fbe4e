use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// An uploaded PDF and its review summary.
///
/// `rating` and `num_reviews` are derived from the review rows and are only
/// ever rewritten together with a review insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub title: String,
    pub subject: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub file_key: String,
    pub file_size: i64,
    pub file_sha256: String,
    pub rating: f64,
    pub num_reviews: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub resource_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A review together with the title of the resource it was written for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReview {
    #[serde(flatten)]
    pub review: Review,
    pub resource_title: String,
}

/// Per-user gamification counters plus the fields derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub user_id: String,
    pub resources_uploaded: u32,
    pub resources_downloaded: u32,
    pub reviews_written: u32,
    pub total_points: u64,
    pub level: u32,
    pub badges: Vec<String>,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contribution {
    /// A zeroed record, as held by a user who has not acted yet.
    #[must_use]
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            resources_uploaded: 0,
            resources_downloaded: 0,
            reviews_written: 0,
            total_points: 0,
            level: 1,
            badges: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionAction {
    Upload,
    Download,
    Review,
}

impl ContributionAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for ContributionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub user_id: String,
    pub email: String,
    pub total_points: u64,
    pub resources_uploaded: u32,
    pub resources_downloaded: u32,
    pub reviews_written: u32,
    pub badges: Vec<String>,
    pub level: u32,
}

/// Optional filters for listing resources. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceFilter {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ResourceFilter {
    pub(crate) fn subject(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }

    pub(crate) fn topic(&self) -> Option<&str> {
        non_blank(self.topic.as_deref())
    }

    pub(crate) fn search(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
