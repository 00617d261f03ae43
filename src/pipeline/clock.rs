//! Minute-resolution card timestamps.
//!
//! Cards carry formatted strings, not instants, so seconds are gone once a
//! card exists. Durations are whole minutes between the parsed strings; two
//! boundaries in the same minute compare equal even if they were up to 59
//! seconds apart. Merge decisions depend on this exact resolution.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::models::ActivityCardData;

pub const CARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn format_card_time(epoch_secs: i64, offset: FixedOffset) -> String {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
        .format(CARD_TIME_FORMAT)
        .to_string()
}

pub fn parse_card_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CARD_TIME_FORMAT).ok()
}

/// Whole minutes from `start` to `end`; negative when `end` is earlier.
pub fn minutes_between(start: &str, end: &str) -> Option<i64> {
    let start = parse_card_time(start)?;
    let end = parse_card_time(end)?;
    Some((end - start).num_minutes())
}

pub fn card_duration_minutes(card: &ActivityCardData) -> Option<i64> {
    minutes_between(&card.start_time, &card.end_time)
}

/// Calendar day an instant falls on in `offset`.
pub fn day_of(epoch_secs: i64, offset: FixedOffset) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}
