//! Parsing of the textual filter inputs into typed filters.
//!
//! Every parser treats blank input as "no filter" and reports malformed
//! input as a [`FilterError`] before any traversal starts.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use super::error::FilterError;
use super::predicates::{DateRange, NamePattern, SizeRange};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Which end of a date range a bound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Midnight at the start of the day.
    Start,
    /// Last millisecond of the day, so the whole day is included.
    End,
}

/// `"100"` is at least 100 MB, `"-50"` at most 50 MB, `"50-200"` between.
pub fn parse_size_range(input: &str) -> Result<SizeRange, FilterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(SizeRange::default());
    }
    let invalid = || FilterError::InvalidSize(trimmed.to_string());

    let range = if let Some(max) = trimmed.strip_prefix('-') {
        SizeRange::at_most(megabytes(max).ok_or_else(invalid)?)
    } else if let Some((min, max)) = trimmed.split_once('-') {
        SizeRange::new(
            Some(megabytes(min).ok_or_else(invalid)?),
            Some(megabytes(max).ok_or_else(invalid)?),
        )
    } else {
        SizeRange::at_least(megabytes(trimmed).ok_or_else(invalid)?)
    };
    range.validate()?;
    Ok(range)
}

fn megabytes(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()?.checked_mul(BYTES_PER_MB)
}

/// A positive megabyte count, in bytes. Blank means no limit.
pub fn parse_megabytes(input: &str) -> Result<Option<u64>, FilterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match megabytes(trimmed) {
        Some(bytes) if bytes > 0 => Ok(Some(bytes)),
        _ => Err(FilterError::InvalidNumber(trimmed.to_string())),
    }
}

/// Strict `yyyy-mm-dd` in local time.
pub fn parse_date_bound(
    input: &str,
    bound: DateBound,
) -> Result<Option<DateTime<Utc>>, FilterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let invalid = || FilterError::InvalidDate(trimmed.to_string());
    // chrono accepts unpadded fields; the format is fixed-width
    if trimmed.len() != 10 {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid())?;
    let time = match bound {
        DateBound::Start => NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(invalid)?,
        DateBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).ok_or_else(invalid)?,
    };
    let local = Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(invalid)?;
    Ok(Some(local.with_timezone(&Utc)))
}

pub fn parse_date_range(since: &str, until: &str) -> Result<DateRange, FilterError> {
    let range = DateRange::new(
        parse_date_bound(since, DateBound::Start)?,
        parse_date_bound(until, DateBound::End)?,
    );
    range.validate()?;
    Ok(range)
}

pub fn parse_keywords(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_lowercase).collect()
}

/// Blank input means no name filter.
pub fn compile_name_regex(input: &str) -> Result<Option<NamePattern>, FilterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NamePattern::from_regex(trimmed).map(Some)
}

/// Depths and ceilings: integers of at least 1.
pub fn parse_positive(input: &str) -> Result<u64, FilterError> {
    let trimmed = input.trim();
    match trimmed.parse::<u64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(FilterError::InvalidNumber(trimmed.to_string())),
    }
}
