// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub use chrono::Duration;

/// A point in time, UTC, rounded to millisecond precision.
///
/// The rounding keeps timestamps stable across serialization to stores that
/// do not keep sub-millisecond precision.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn as_unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time.round_subsecs(3))
    }
}

impl std::ops::Add<Duration> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, duration: Duration) -> TimeStamp {
        (self.0 + duration).into()
    }
}

/// The validity window of a work package.
///
/// The window is closed on both ends; expiry is always derived from the
/// stored `expires` instant and never recorded as a state of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriod {
    pub created: TimeStamp,
    pub expires: TimeStamp,
}

impl ValidityPeriod {
    /// Open a new window of `valid_days` days starting now.
    pub fn starting_now(valid_days: i64) -> Self {
        let created = TimeStamp::now();
        Self {
            created,
            expires: created + Duration::days(valid_days),
        }
    }

    /// Whether `now` falls within the window.
    pub fn contains(&self, now: TimeStamp) -> bool {
        self.created <= now && now <= self.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_contains_now_but_not_the_past_or_future() {
        let period = ValidityPeriod::starting_now(30);
        assert!(period.contains(TimeStamp::now()));
        let before = period.created.time() - Duration::seconds(1);
        assert!(!period.contains(before.into()));
        let after = period.expires.time() + Duration::seconds(1);
        assert!(!period.contains(after.into()));
    }

    #[test]
    fn expiry_is_created_plus_valid_days() {
        let period = ValidityPeriod::starting_now(30);
        assert_eq!(period.expires, period.created + Duration::days(30));
    }

    #[test]
    fn timestamps_round_to_milliseconds() {
        let now = TimeStamp::now();
        let roundtrip: TimeStamp = now.time().into();
        assert_eq!(now, roundtrip);
    }
}
