use chrono::Utc;

use crate::error::{Error, Result};
use crate::scoring;
use crate::store::Store;
use crate::types::{Contribution, ContributionAction};

/// Compare-and-swap attempts before `record_action` gives up.
pub const MAX_UPDATE_ATTEMPTS: usize = 16;

/// Increments the counter for `action`, rescores, and persists the record.
///
/// The first action for a user creates the record. Concurrent callers are
/// serialised through the record's `version`, so no increment is lost.
pub fn record_action(
    store: &dyn Store,
    user_id: &str,
    action: ContributionAction,
) -> Result<Contribution> {
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let now = Utc::now();

        match store.get_contribution(user_id)? {
            Some(mut contribution) => {
                let expected = contribution.version;
                apply(&mut contribution, action)?;
                contribution.updated_at = now;

                if store.update_contribution(&contribution, expected)? {
                    contribution.version = expected + 1;
                    return Ok(contribution);
                }
            }
            None => {
                let mut contribution = Contribution::empty(user_id, now);
                apply(&mut contribution, action)?;

                match store.insert_contribution(&contribution) {
                    Ok(()) => return Ok(contribution),
                    Err(Error::AlreadyExists) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::debug!(user_id, %action, attempt, "contribution changed concurrently, retrying");
    }

    Err(Error::Conflict(format!(
        "contribution for user {user_id} is under heavy contention"
    )))
}

/// Returns the user's record without creating one.
pub fn get_for_user(store: &dyn Store, user_id: &str) -> Result<Option<Contribution>> {
    store.get_contribution(user_id)
}

fn apply(contribution: &mut Contribution, action: ContributionAction) -> Result<()> {
    let counter = match action {
        ContributionAction::Upload => &mut contribution.resources_uploaded,
        ContributionAction::Download => &mut contribution.resources_downloaded,
        ContributionAction::Review => &mut contribution.reviews_written,
    };
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| Error::Conflict(format!("{action} counter is at its maximum")))?;

    scoring::rescore(contribution);
    Ok(())
}
