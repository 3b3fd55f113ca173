//! Free-form time expressions.
//!
//! Used by `Task::set_timeout` and the expiry purge. Accepted forms:
//! - keywords: `now`, `today`, `yesterday`, `tomorrow`
//! - absolute: `2016-10-04`, `2016-10-04 17:00`, `2016-10-04 17:00:00`,
//!   `2016-10-04T17:00:00`, RFC 3339
//! - relative: `4 days`, `-1 day`, `+2 hours 30 min`, `1 week ago`, `-1day`
//!
//! Every result is truncated to whole seconds (the stored timestamp precision).

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Stored timestamp layout.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeExprError {
    #[error("empty time expression")]
    Empty,

    #[error("unrecognized time expression: {0:?}")]
    Unrecognized(String),

    #[error("unknown time unit {unit:?} in {expr:?}")]
    UnknownUnit { unit: String, expr: String },

    #[error("time expression out of range: {0:?}")]
    OutOfRange(String),
}

/// Drop sub-second precision.
pub fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::nanoseconds(i64::from(at.timestamp_subsec_nanos()))
}

/// Format an instant in the stored layout.
pub fn format(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse the stored layout back into an instant.
pub fn parse_stored(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Resolve `expr` relative to `now`.
pub fn resolve(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeExprError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(TimeExprError::Empty);
    }

    let lowered = trimmed.to_ascii_lowercase();
    let midnight = |at: DateTime<Utc>| Utc.from_utc_datetime(&at.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default());
    let resolved = match lowered.as_str() {
        "now" => now,
        "today" | "midnight" => midnight(now),
        "yesterday" => midnight(now) - Duration::days(1),
        "tomorrow" => midnight(now) + Duration::days(1),
        _ => match parse_absolute(trimmed) {
            Some(at) => at,
            None => apply_relative(&lowered, trimmed, now)?,
        },
    };
    Ok(truncate(resolved))
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for layout in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

fn unit_of(word: &str) -> Option<Unit> {
    let unit = match word {
        "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "m" | "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "h" | "hr" | "hrs" | "hour" | "hours" => Unit::Hour,
        "d" | "day" | "days" => Unit::Day,
        "w" | "week" | "weeks" => Unit::Week,
        "fortnight" | "fortnights" => Unit::Fortnight,
        "mon" | "month" | "months" => Unit::Month,
        "y" | "yr" | "year" | "years" => Unit::Year,
        _ => return None,
    };
    Some(unit)
}

/// Split `"-1day"` into `"-1"` and `"day"`, leaving `"-1"` / `"day"` alone.
fn split_token(token: &str) -> (&str, &str) {
    let digits_end = token
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    token.split_at(digits_end)
}

fn apply_relative(
    lowered: &str,
    original: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeExprError> {
    let mut words: Vec<&str> = Vec::new();
    for token in lowered.split_whitespace() {
        let (number, rest) = split_token(token);
        if !number.is_empty() {
            words.push(number);
        }
        if !rest.is_empty() {
            words.push(rest);
        }
    }

    let ago = words.last() == Some(&"ago");
    if ago {
        words.pop();
    }
    if words.is_empty() || words.len() % 2 != 0 {
        return Err(TimeExprError::Unrecognized(original.to_string()));
    }

    let mut at = now;
    for pair in words.chunks(2) {
        let amount: i64 = pair[0]
            .parse()
            .map_err(|_| TimeExprError::Unrecognized(original.to_string()))?;
        let amount = if ago { -amount } else { amount };
        let unit = unit_of(pair[1]).ok_or_else(|| TimeExprError::UnknownUnit {
            unit: pair[1].to_string(),
            expr: original.to_string(),
        })?;
        at = shift(at, amount, unit).ok_or_else(|| TimeExprError::OutOfRange(original.to_string()))?;
    }
    Ok(at)
}

fn shift(at: DateTime<Utc>, amount: i64, unit: Unit) -> Option<DateTime<Utc>> {
    let fixed = |secs_per_unit: i64| {
        amount
            .checked_mul(secs_per_unit)
            .and_then(Duration::try_seconds)
            .and_then(|delta| at.checked_add_signed(delta))
    };
    let calendar = |months: i64| {
        let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
        if months >= 0 {
            at.checked_add_months(Months::new(magnitude))
        } else {
            at.checked_sub_months(Months::new(magnitude))
        }
    };
    match unit {
        Unit::Second => fixed(1),
        Unit::Minute => fixed(60),
        Unit::Hour => fixed(3_600),
        Unit::Day => fixed(86_400),
        Unit::Week => fixed(7 * 86_400),
        Unit::Fortnight => fixed(14 * 86_400),
        Unit::Month => calendar(amount),
        Unit::Year => calendar(amount.checked_mul(12)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 10, 10, 12, 30, 45).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[rstest]
    #[case::date_only("2016-10-04", at(2016, 10, 4, 0, 0, 0))]
    #[case::stored_layout("2016-10-10 17:00:00", at(2016, 10, 10, 17, 0, 0))]
    #[case::iso("2016-10-10T17:00:00", at(2016, 10, 10, 17, 0, 0))]
    #[case::no_seconds("2016-10-10 17:05", at(2016, 10, 10, 17, 5, 0))]
    #[case::rfc3339("2016-10-10T19:00:00+02:00", at(2016, 10, 10, 17, 0, 0))]
    #[case::now("now", at(2016, 10, 10, 12, 30, 45))]
    #[case::today("today", at(2016, 10, 10, 0, 0, 0))]
    #[case::yesterday("Yesterday", at(2016, 10, 9, 0, 0, 0))]
    #[case::tomorrow("tomorrow", at(2016, 10, 11, 0, 0, 0))]
    #[case::minus_day("-1 day", at(2016, 10, 9, 12, 30, 45))]
    #[case::compact("-1day", at(2016, 10, 9, 12, 30, 45))]
    #[case::plus_days("4 days", at(2016, 10, 14, 12, 30, 45))]
    #[case::combined("+2 hours 15 min", at(2016, 10, 10, 14, 45, 45))]
    #[case::ago("1 week ago", at(2016, 10, 3, 12, 30, 45))]
    #[case::months("-1 month", at(2016, 9, 10, 12, 30, 45))]
    #[case::years("2 years", at(2018, 10, 10, 12, 30, 45))]
    fn resolves_expressions(#[case] expr: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(resolve(expr, now()).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("  ")]
    #[case::garbage("whenever")]
    #[case::dangling_number("3")]
    #[case::bad_unit("3 lightyears")]
    fn rejects_garbage(#[case] expr: &str) {
        assert!(resolve(expr, now()).is_err());
    }

    #[test]
    fn results_are_truncated_to_seconds() {
        let precise = now() + Duration::milliseconds(750);
        assert_eq!(resolve("now", precise).unwrap(), now());
    }

    #[test]
    fn stored_layout_round_trips() {
        let text = format(now());
        assert_eq!(text, "2016-10-10 12:30:45");
        assert_eq!(parse_stored(&text), Some(now()));
        assert_eq!(parse_stored("not a date"), None);
    }
}
