//! Commission Clearance
//!
//! A referral's commission becomes withdrawable once a fixed number of
//! business days has passed since the referral was recorded. Only Saturdays
//! and Sundays are skipped; there is no public-holiday calendar. Days are
//! counted in UTC and the time of day of the original timestamp is kept.

use jiff::{Timestamp, ToSpan, civil::Weekday, tz::TimeZone};

/// Business days a commission spends in "processing" before it clears.
pub const CLEARANCE_BUSINESS_DAYS: u32 = 14;

/// Advance `timestamp` by `days` days that are not a Saturday or Sunday.
///
/// Counting starts from the literal timestamp: a Saturday plus one business
/// day is the following Monday at the same time of day.
///
/// # Errors
///
/// Returns an error only when the result would overflow jiff's supported
/// range.
pub fn add_business_days(timestamp: Timestamp, days: u32) -> Result<Timestamp, jiff::Error> {
    let mut current = timestamp.to_zoned(TimeZone::UTC);
    let mut added = 0;

    while added < days {
        current = current.checked_add(1.day())?;

        if !is_weekend(current.weekday()) {
            added += 1;
        }
    }

    Ok(current.timestamp())
}

/// The moment a commission created at `created_at` clears.
///
/// # Errors
///
/// Returns an error when the clearance date is out of range.
pub fn cleared_at(created_at: Timestamp) -> Result<Timestamp, jiff::Error> {
    add_business_days(created_at, CLEARANCE_BUSINESS_DAYS)
}

/// Whether a commission created at `created_at` is withdrawable as of `now`.
///
/// An out-of-range clearance date is treated as never cleared.
#[must_use]
pub fn is_cleared(created_at: Timestamp, now: Timestamp) -> bool {
    cleared_at(created_at).is_ok_and(|cleared_at| now >= cleared_at)
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Saturday | Weekday::Sunday)
}
