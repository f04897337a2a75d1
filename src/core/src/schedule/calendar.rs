use super::ScheduleError;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

/// All league clocks run on Istanbul wall time, which has been a fixed UTC+3
/// since 2016 (no DST), so a fixed offset is exact.
pub const LEAGUE_TIMEZONE: &str = "Europe/Istanbul";
pub const KICKOFF_HOUR: u32 = 19;

fn league_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset")
}

/// Calendar day key (`yyyy-mm-dd`) in league local time.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.with_timezone(&league_offset()).format("%Y-%m-%d").to_string()
}

/// Month key (`yyyy-mm`) in league local time, used to make season
/// bootstraps idempotent.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.with_timezone(&league_offset()).format("%Y-%m").to_string()
}

pub fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&league_offset()).date_naive()
}

/// UTC instant for the given local wall-clock time on a local calendar day.
pub fn at_local(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let wall = day
        .and_hms_opt(hour, minute, 0)
        .expect("valid wall clock time");
    league_offset()
        .from_local_datetime(&wall)
        .single()
        .expect("fixed offset times are unambiguous")
        .with_timezone(&Utc)
}

pub fn kickoff_on(day: NaiveDate) -> DateTime<Utc> {
    at_local(day, KICKOFF_HOUR, 0)
}

/// Tomorrow's kickoff slot, the start date handed to a league that just
/// filled up.
pub fn next_day_kickoff(now: DateTime<Utc>) -> DateTime<Utc> {
    kickoff_on(local_day(now) + Duration::days(1))
}

pub fn first_of_month_kickoff(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = local_day(now);
    let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .expect("first of month exists");
    kickoff_on(first)
}

/// First-of-month kickoff, rolling into next month once this month's slot has
/// already passed.
pub fn next_month_or_this_month_kickoff(now: DateTime<Utc>) -> DateTime<Utc> {
    let this_month = first_of_month_kickoff(now);
    if now > this_month {
        let today = local_day(now);
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        let first = NaiveDate::from_ymd_opt(year, month, 1).expect("first of month exists");
        kickoff_on(first)
    } else {
        this_month
    }
}

/// Round 1 plays at the start date; every later round is one local calendar
/// day further out, always at the kickoff hour.
pub fn date_for_round(start: DateTime<Utc>, round: u32) -> DateTime<Utc> {
    let day = local_day(start) + Duration::days(round.max(1) as i64 - 1);
    kickoff_on(day)
}

/// Round number a given instant falls into, counted in local calendar days;
/// 0 means the season has not started.
pub fn round_for_date(start: DateTime<Utc>, at: DateTime<Utc>) -> u32 {
    if at < start {
        return 0;
    }
    let diff = (local_day(at) - local_day(start)).num_days();
    (diff + 1).max(0) as u32
}

/// The day's dispatch window: kickoff hour through 23:59:59 local.
pub fn day_window(day_key: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), ScheduleError> {
    let day = NaiveDate::parse_from_str(day_key, "%Y-%m-%d")
        .map_err(|_| ScheduleError::InvalidDayKey(day_key.to_string()))?;
    let start = at_local(day, KICKOFF_HOUR, 0);
    let end = at_local(day, 23, 59) + Duration::seconds(59);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_day_key_uses_local_offset() {
        // 22:30 UTC is already the next local day at UTC+3.
        assert_eq!(day_key(utc(2025, 3, 1, 22, 30)), "2025-03-02");
        assert_eq!(day_key(utc(2025, 3, 1, 12, 0)), "2025-03-01");
    }

    #[test]
    fn test_kickoff_is_19_local() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        // 19:00 at UTC+3 is 16:00 UTC.
        assert_eq!(kickoff_on(day), utc(2025, 3, 2, 16, 0));
    }

    #[test]
    fn test_date_for_round_steps_one_day() {
        let start = kickoff_on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(date_for_round(start, 1), start);
        assert_eq!(
            date_for_round(start, 5),
            kickoff_on(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap())
        );
        assert_eq!(round_for_date(start, date_for_round(start, 5)), 5);
        assert_eq!(round_for_date(start, start - Duration::hours(1)), 0);
    }

    #[test]
    fn test_day_window_bounds() {
        let (start, end) = day_window("2025-03-02").unwrap();
        assert_eq!(start, utc(2025, 3, 2, 16, 0));
        assert_eq!(end, utc(2025, 3, 2, 20, 59) + Duration::seconds(59));
        assert!(day_window("yesterday").is_err());
    }

    #[test]
    fn test_month_rollover() {
        let late = utc(2025, 12, 20, 12, 0);
        let next = next_month_or_this_month_kickoff(late);
        assert_eq!(day_key(next), "2026-01-01");
        let early = utc(2025, 12, 1, 10, 0); // before 19:00 local on the 1st
        assert_eq!(day_key(next_month_or_this_month_kickoff(early)), "2025-12-01");
    }
}
