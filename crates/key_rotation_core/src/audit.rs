use chrono::{DateTime, Utc};

use crate::contract::{AccessKey, KeyStatus, User};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days between `created` and `now`, rounded down. Creation dates in
/// the future give a negative count.
pub fn elapsed_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created).num_seconds().div_euclid(SECONDS_PER_DAY)
}

pub fn is_key_interesting(key: &AccessKey, now: DateTime<Utc>, alert_after_days: i64) -> bool {
    if key.status != KeyStatus::Active {
        return false;
    }
    elapsed_days(key.create_date, now) >= alert_after_days
}

/// Users that never signed in to the console are service identities and are
/// not audited.
pub fn has_console_login(user: &User) -> bool {
    user.password_last_used.is_some()
}

pub fn stale_keys(
    keys: impl IntoIterator<Item = AccessKey>,
    now: DateTime<Utc>,
    alert_after_days: i64,
) -> Vec<AccessKey> {
    keys.into_iter()
        .filter(|key| is_key_interesting(key, now, alert_after_days))
        .collect()
}
