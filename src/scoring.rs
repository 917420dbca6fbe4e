//! Points, level and badge rules.
//!
//! Everything here is a pure function of the three action counters. Badges are
//! recomputed from scratch on every call, so a record never carries a stale or
//! duplicated badge.

use serde::Serialize;

use crate::types::Contribution;

pub const UPLOAD_POINTS: u64 = 10;
pub const DOWNLOAD_POINTS: u64 = 2;
pub const REVIEW_POINTS: u64 = 5;

/// Points needed per "step" of the level curve: level n starts at 50 * (n-1)^2.
pub const LEVEL_DIVISOR: u64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub uploads: u32,
    pub downloads: u32,
    pub reviews: u32,
}

impl From<&Contribution> for Counters {
    fn from(c: &Contribution) -> Self {
        Self {
            uploads: c.resources_uploaded,
            downloads: c.resources_downloaded,
            reviews: c.reviews_written,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub total_points: u64,
    pub level: u32,
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeMetric {
    Uploads,
    Reviews,
}

impl BadgeMetric {
    fn read(self, counters: Counters) -> u32 {
        match self {
            Self::Uploads => counters.uploads,
            Self::Reviews => counters.reviews,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BadgeRule {
    pub name: &'static str,
    pub metric: BadgeMetric,
    pub threshold: u32,
    pub description: &'static str,
}

/// Evaluated in order; output badge order follows this table.
pub const BADGE_RULES: &[BadgeRule] = &[
    BadgeRule {
        name: "Rookie Uploader",
        metric: BadgeMetric::Uploads,
        threshold: 1,
        description: "Upload your first resource",
    },
    BadgeRule {
        name: "Resource Master",
        metric: BadgeMetric::Uploads,
        threshold: 5,
        description: "Upload 5 resources",
    },
    BadgeRule {
        name: "Knowledge Sharer",
        metric: BadgeMetric::Uploads,
        threshold: 10,
        description: "Upload 10 resources",
    },
    BadgeRule {
        name: "Helpful Reviewer",
        metric: BadgeMetric::Reviews,
        threshold: 3,
        description: "Write 3 reviews",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeProgress {
    pub badge: &'static str,
    pub description: &'static str,
    pub current: u32,
    pub threshold: u32,
    pub earned: bool,
}

#[must_use]
pub fn total_points(counters: Counters) -> u64 {
    u64::from(counters.uploads) * UPLOAD_POINTS
        + u64::from(counters.downloads) * DOWNLOAD_POINTS
        + u64::from(counters.reviews) * REVIEW_POINTS
}

/// `floor(sqrt(points / 50)) + 1`, computed in integers.
#[must_use]
pub fn level_for(points: u64) -> u32 {
    let level = (points / LEVEL_DIVISOR).isqrt() + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

#[must_use]
pub fn badges_for(counters: Counters) -> Vec<String> {
    BADGE_RULES
        .iter()
        .filter(|rule| rule.metric.read(counters) >= rule.threshold)
        .map(|rule| rule.name.to_string())
        .collect()
}

#[must_use]
pub fn score(counters: Counters) -> Score {
    let total_points = total_points(counters);
    Score {
        total_points,
        level: level_for(total_points),
        badges: badges_for(counters),
    }
}

#[must_use]
pub fn badge_progress(counters: Counters) -> Vec<BadgeProgress> {
    BADGE_RULES
        .iter()
        .map(|rule| {
            let current = rule.metric.read(counters);
            BadgeProgress {
                badge: rule.name,
                description: rule.description,
                current,
                threshold: rule.threshold,
                earned: current >= rule.threshold,
            }
        })
        .collect()
}

/// Overwrites the derived fields of `contribution` from its counters.
pub fn rescore(contribution: &mut Contribution) {
    let Score {
        total_points,
        level,
        badges,
    } = score(Counters::from(&*contribution));
    contribution.total_points = total_points;
    contribution.level = level;
    contribution.badges = badges;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(uploads: u32, downloads: u32, reviews: u32) -> Counters {
        Counters {
            uploads,
            downloads,
            reviews,
        }
    }

    #[test]
    fn test_points_formula() {
        assert_eq!(total_points(counters(0, 0, 0)), 0);
        assert_eq!(total_points(counters(1, 0, 0)), 10);
        assert_eq!(total_points(counters(0, 1, 0)), 2);
        assert_eq!(total_points(counters(0, 0, 1)), 5);
        assert_eq!(total_points(counters(3, 7, 2)), 30 + 14 + 10);
    }

    #[test]
    fn test_points_do_not_overflow() {
        let max = counters(u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(total_points(max), u64::from(u32::MAX) * 17);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(49), 1);
        assert_eq!(level_for(50), 2);
        assert_eq!(level_for(199), 2);
        assert_eq!(level_for(200), 3);
        assert_eq!(level_for(449), 3);
        assert_eq!(level_for(450), 4);
    }

    #[test]
    fn test_level_is_monotonic() {
        let mut previous = level_for(0);
        for points in 1..5_000 {
            let level = level_for(points);
            assert!(level >= previous, "level dropped at {points}");
            previous = level;
        }
    }

    #[test]
    fn test_level_matches_float_formula() {
        for points in (0..20_000u64).step_by(7) {
            let expected = ((points as f64 / 50.0).sqrt()).floor() as u32 + 1;
            assert_eq!(level_for(points), expected, "points = {points}");
        }
    }

    #[test]
    fn test_upload_badges() {
        assert!(badges_for(counters(0, 0, 0)).is_empty());
        assert_eq!(badges_for(counters(1, 0, 0)), vec!["Rookie Uploader"]);
        assert_eq!(
            badges_for(counters(5, 0, 0)),
            vec!["Rookie Uploader", "Resource Master"]
        );
        assert_eq!(
            badges_for(counters(10, 0, 0)),
            vec!["Rookie Uploader", "Resource Master", "Knowledge Sharer"]
        );
    }

    #[test]
    fn test_review_badge_ignores_downloads() {
        assert!(badges_for(counters(0, 100, 2)).is_empty());
        assert_eq!(badges_for(counters(0, 0, 3)), vec!["Helpful Reviewer"]);
    }

    #[test]
    fn test_worked_example() {
        let s = score(counters(5, 0, 3));
        assert_eq!(s.total_points, 65);
        assert_eq!(s.level, 2);
        assert_eq!(
            s.badges,
            vec!["Rookie Uploader", "Resource Master", "Helpful Reviewer"]
        );
    }

    #[test]
    fn test_rescore_replaces_badges() {
        let mut c = Contribution::empty("u1", chrono::Utc::now());
        c.badges = vec!["Stale".to_string()];
        c.resources_uploaded = 1;
        rescore(&mut c);
        assert_eq!(c.badges, vec!["Rookie Uploader"]);
        assert_eq!(c.total_points, 10);
        assert_eq!(c.level, 1);
    }

    #[test]
    fn test_badge_progress_follows_rules() {
        let progress = badge_progress(counters(6, 4, 1));
        assert_eq!(progress.len(), BADGE_RULES.len());

        assert_eq!(progress[0].badge, "Rookie Uploader");
        assert!(progress[0].earned);
        assert_eq!(progress[1].current, 6);
        assert_eq!(progress[1].threshold, 5);
        assert!(progress[1].earned);
        assert!(!progress[2].earned);
        assert_eq!(progress[3].badge, "Helpful Reviewer");
        assert_eq!(progress[3].current, 1);
        assert!(!progress[3].earned);
    }
}
