//! Five-field cron expressions: `minute hour day-of-month month day-of-week`.
//!
//! Supports `*`, lists (`1,15`), ranges (`1-5`), and steps (`*/10`, `2-30/4`).
//! Day-of-week is numeric, 0 = Sunday (7 folds to 0). Day matching follows
//! vixie cron: when both day-of-month and day-of-week are restricted, a date
//! matches if *either* field matches.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Timelike};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid cron expression: {0}")]
pub struct ScheduleError(pub String);

/// A parsed cron expression. Each field is a bitmask over its valid range.
#[derive(Debug, Clone)]
pub struct CronExpr {
    raw: String,
    minutes: u64,
    hours: u32,
    dom: u32,
    months: u16,
    dow: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day-of-month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day-of-week", min: 0, max: 7 },
];

fn parse_number(field: &FieldSpec, token: &str) -> Result<u32, ScheduleError> {
    token.parse::<u32>().map_err(|_| {
        ScheduleError(format!("field `{}`: `{token}` is not a number", field.name))
    })
}

/// Parses one field into a bitmask. Returns the mask and whether the field
/// was restricted (anything other than a bare `*`).
fn parse_field(field: &FieldSpec, spec: &str) -> Result<(u64, bool), ScheduleError> {
    if spec.is_empty() {
        return Err(ScheduleError(format!("field `{}` is empty", field.name)));
    }

    let mut mask: u64 = 0;
    let mut restricted = false;

    for item in spec.split(',') {
        let (range_part, step) = match item.split_once('/') {
            Some((r, s)) => {
                let step = parse_number(field, s)?;
                if step == 0 {
                    return Err(ScheduleError(format!(
                        "field `{}`: step must be at least 1",
                        field.name
                    )));
                }
                (r, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range_part == "*" {
            if item != "*" {
                restricted = true;
            }
            (field.min, field.max)
        } else {
            restricted = true;
            match range_part.split_once('-') {
                Some((a, b)) => (parse_number(field, a)?, parse_number(field, b)?),
                None => {
                    let v = parse_number(field, range_part)?;
                    (v, v)
                }
            }
        };

        if start < field.min || end > field.max {
            return Err(ScheduleError(format!(
                "field `{}`: value out of range {}-{} in `{item}`",
                field.name, field.min, field.max
            )));
        }
        if start > end {
            return Err(ScheduleError(format!(
                "field `{}`: range start exceeds end in `{item}`",
                field.name
            )));
        }

        let mut v = start;
        while v <= end {
            // Fold day-of-week 7 onto Sunday.
            let bit = if field.name == "day-of-week" && v == 7 { 0 } else { v };
            mask |= 1u64 << bit;
            v += step;
        }
    }

    Ok((mask, restricted))
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ScheduleError(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), got {}",
                parts.len()
            )));
        }

        let (minutes, _) = parse_field(&FIELDS[0], parts[0])?;
        let (hours, _) = parse_field(&FIELDS[1], parts[1])?;
        let (dom, dom_restricted) = parse_field(&FIELDS[2], parts[2])?;
        let (months, _) = parse_field(&FIELDS[3], parts[3])?;
        let (dow, dow_restricted) = parse_field(&FIELDS[4], parts[4])?;

        Ok(CronExpr {
            raw: parts.join(" "),
            minutes,
            hours: hours as u32,
            dom: dom as u32,
            months: months as u16,
            dow: dow as u8,
            dom_restricted,
            dow_restricted,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        let dom_hit = self.dom & (1 << date.day()) != 0;
        let dow_hit = self.dow & (1 << date.weekday().num_days_from_sunday()) != 0;
        match (self.dom_restricted, self.dow_restricted) {
            // Vixie cron: both restricted means OR, not AND.
            (true, true) => dom_hit || dow_hit,
            (true, false) => dom_hit,
            (false, true) => dow_hit,
            (false, false) => true,
        }
    }

    /// Next occurrence strictly after `from`, in `from`'s offset. `None` when
    /// no matching date exists within a five-year horizon (e.g. `0 0 31 2 *`).
    pub fn next_after(&self, from: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let offset = *from.offset();
        let start = from.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);

        let mut date = start.date_naive();
        let mut floor = start.hour() * 60 + start.minute();

        for _ in 0..(366 * 5) {
            if self.months & (1 << date.month()) != 0 && self.day_matches(date) {
                for hour in 0..24u32 {
                    if self.hours & (1 << hour) == 0 {
                        continue;
                    }
                    for minute in 0..60u32 {
                        if self.minutes & (1u64 << minute) == 0 {
                            continue;
                        }
                        if hour * 60 + minute >= floor {
                            let naive = date.and_hms_opt(hour, minute, 0)?;
                            return offset.from_local_datetime(&naive).single();
                        }
                    }
                }
            }
            date = date.succ_opt()?;
            floor = 0;
        }
        None
    }
}

/// Parses a `±HH:MM` UTC offset string (e.g. `-03:00`).
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return None;
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(offset_hours: i32) -> FixedOffset {
        FixedOffset::east_opt(offset_hours * 3600).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        sp(-3)
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("0 3 * *").is_err());
        assert!(CronExpr::parse("0 3 * * * *").is_err());
        assert!(CronExpr::parse("").is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(CronExpr::parse("60 * * * *").is_err());
        assert!(CronExpr::parse("* 24 * * *").is_err());
        assert!(CronExpr::parse("* * 0 * *").is_err());
        assert!(CronExpr::parse("* * * 13 *").is_err());
        assert!(CronExpr::parse("* * * * 8").is_err());
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("5-1 * * * *").is_err());
        assert!(CronExpr::parse("x * * * *").is_err());
    }

    #[test]
    fn daily_schedule_advances_past_today() {
        let expr = CronExpr::parse("0 3 * * *").unwrap();
        let next = expr.next_after(at(2025, 6, 10, 1, 30)).unwrap();
        assert_eq!(next, at(2025, 6, 10, 3, 0));

        // Exactly at the tick: the next occurrence is tomorrow.
        let next = expr.next_after(at(2025, 6, 10, 3, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 11, 3, 0));
    }

    #[test]
    fn step_values_fire_within_the_hour() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        let next = expr.next_after(at(2025, 6, 10, 9, 16)).unwrap();
        assert_eq!(next, at(2025, 6, 10, 9, 30));
        let next = expr.next_after(at(2025, 6, 10, 9, 45)).unwrap();
        assert_eq!(next, at(2025, 6, 10, 10, 0));
    }

    #[test]
    fn weekday_schedule_finds_next_monday() {
        // 2025-06-10 is a Tuesday; next Monday is the 16th.
        let expr = CronExpr::parse("0 0 * * 1").unwrap();
        let next = expr.next_after(at(2025, 6, 10, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 16, 0, 0));
    }

    #[test]
    fn dow_seven_is_sunday() {
        let a = CronExpr::parse("0 0 * * 0").unwrap();
        let b = CronExpr::parse("0 0 * * 7").unwrap();
        let from = at(2025, 6, 10, 0, 0);
        assert_eq!(a.next_after(from), b.next_after(from));
    }

    #[test]
    fn restricted_dom_and_dow_match_either() {
        // Day 1 of the month OR any Monday.
        let expr = CronExpr::parse("0 0 1 * 1").unwrap();
        let next = expr.next_after(at(2025, 6, 10, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 16, 0, 0)); // Monday before July 1st
        let next = expr.next_after(at(2025, 6, 29, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 30, 0, 0)); // a Monday
        let next = expr.next_after(at(2025, 6, 30, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 7, 1, 0, 0)); // dom hit, Tuesday
    }

    #[test]
    fn impossible_date_yields_none() {
        let expr = CronExpr::parse("0 0 31 2 *").unwrap();
        assert_eq!(expr.next_after(at(2025, 1, 1, 0, 0)), None);
    }

    #[test]
    fn month_restriction_skips_ahead() {
        let expr = CronExpr::parse("30 6 15 12 *").unwrap();
        let next = expr.next_after(at(2025, 6, 10, 0, 0)).unwrap();
        assert_eq!(next, at(2025, 12, 15, 6, 30));
    }

    #[test]
    fn list_and_range_fields() {
        let expr = CronExpr::parse("0 8,18 1-7 * *").unwrap();
        let next = expr.next_after(at(2025, 6, 3, 9, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 3, 18, 0));
        let next = expr.next_after(at(2025, 6, 7, 19, 0)).unwrap();
        assert_eq!(next, at(2025, 7, 1, 8, 0));
    }

    #[test]
    fn utc_offset_parsing() {
        assert_eq!(parse_utc_offset("-03:00"), FixedOffset::east_opt(-3 * 3600));
        assert_eq!(parse_utc_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 1800));
        assert!(parse_utc_offset("03:00").is_none());
        assert!(parse_utc_offset("-25:00").is_none());
        assert!(parse_utc_offset("").is_none());
    }
}
