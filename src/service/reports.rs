use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::scoring::{self, BadgeProgress, Counters};
use crate::store::Store;
use crate::types::{Contribution, LeaderboardEntry, Resource, User};

pub const LEADERBOARD_LIMIT: i32 = 50;

/// Cap for every "recent" list on the dashboard and profile.
pub const RECENT_LIMIT: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Upload,
    Review,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub resource_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub recent_uploads: Vec<Resource>,
    pub recommended: Vec<Resource>,
    pub recent_activity: Vec<ActivityEntry>,
    pub contribution: Contribution,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub level: u32,
    pub total_points: u64,
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: PublicUser,
    pub resources: Vec<Resource>,
    pub contributions: Vec<Contribution>,
    pub badge_progression: Vec<BadgeProgress>,
}

/// Top contributors by points; ties go to the lower user id.
pub fn leaderboard(store: &dyn Store) -> Result<Vec<LeaderboardEntry>> {
    store.leaderboard(LEADERBOARD_LIMIT)
}

pub fn dashboard(store: &dyn Store, user: &User) -> Result<Dashboard> {
    let recent_uploads = store.list_user_resources(&user.id, RECENT_LIMIT)?;
    let recommended = store.list_recommended_resources(&user.top_subjects, &user.id, RECENT_LIMIT)?;
    let recent_reviews = store.list_user_reviews(&user.id, RECENT_LIMIT)?;

    let mut recent_activity: Vec<ActivityEntry> = recent_uploads
        .iter()
        .map(|r| ActivityEntry {
            kind: ActivityKind::Upload,
            resource_id: r.id.clone(),
            title: r.title.clone(),
            rating: None,
            date: r.created_at,
        })
        .chain(recent_reviews.into_iter().map(|r| ActivityEntry {
            kind: ActivityKind::Review,
            resource_id: r.review.resource_id,
            title: r.resource_title,
            rating: Some(r.review.rating),
            date: r.review.created_at,
        }))
        .collect();
    recent_activity.sort_by(|a, b| b.date.cmp(&a.date));
    recent_activity.truncate(RECENT_LIMIT as usize);

    let contribution = store
        .get_contribution(&user.id)?
        .unwrap_or_else(|| Contribution::empty(&user.id, Utc::now()));

    Ok(Dashboard {
        recent_uploads,
        recommended,
        recent_activity,
        contribution,
    })
}

pub fn profile(store: &dyn Store, user_id: &str) -> Result<Profile> {
    let user = store
        .get_user(user_id)?
        .ok_or(Error::NotFound("User not found"))?;

    let resources = store.list_user_resources(user_id, RECENT_LIMIT)?;
    let contribution = store.get_contribution(user_id)?;

    let counters = contribution.as_ref().map(Counters::from).unwrap_or_default();
    let (level, total_points, badges) = match &contribution {
        Some(c) => (c.level, c.total_points, c.badges.clone()),
        None => (1, 0, Vec::new()),
    };

    Ok(Profile {
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
            level,
            total_points,
            badges,
        },
        resources,
        contributions: contribution.into_iter().collect(),
        badge_progression: scoring::badge_progress(counters),
    })
}
