// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Truncates an instant to the calendar date it falls on in `tz`.
///
/// Streak decisions are made against the user's local calendar day, so
/// every "today" in this crate goes through here with the profile's
/// timezone rather than using the server's.
pub fn calendar_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Number of calendar days from `earlier` to `later`, rounding any
/// partial day up. Yesterday-to-today is always 1; anything beyond one
/// full day is at least 2. Negative when `later` precedes `earlier`.
pub fn day_difference(later: NaiveDate, earlier: NaiveDate) -> i64 {
    let millis = (later - earlier).num_milliseconds();
    // `i64::div_ceil` is unstable (`int_roundings`); round up by hand.
    let quotient = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Parses an IANA timezone name as stored on a profile. An unknown name
/// is logged and treated as UTC so a corrupt row degrades the dates it
/// produces instead of failing the whole request or sweep.
pub fn timezone_or_utc(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Unknown timezone '{}', falling back to UTC.", name);
            chrono_tz::UTC
        }
    }
}

/// Combines a calendar date and a wall-clock time into a UTC instant,
/// interpreting both in `tz`. Returns `None` for local times that do not
/// exist (spring-forward DST gaps); ambiguous times resolve to the
/// earlier instant.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
