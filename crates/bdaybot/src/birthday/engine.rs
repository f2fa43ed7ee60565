//! Pure date computation over a snapshot of birthday records.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use super::store::BirthdayRecord;

/// Reference year for validating day/month pairs. A leap year, so `29-02`
/// is accepted independently of the current year.
const LEAP_REFERENCE_YEAR: i32 = 2024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Invalid date format, expected DD-MM (e.g. 25-12)")]
    Format,
    #[error("{day:02}-{month:02} is not a real date")]
    Calendar { day: u32, month: u32 },
}

/// A birthday that falls within the requested horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingBirthday {
    pub subject_id: String,
    /// Stored `DD-MM` string.
    pub date: String,
    /// Concrete calendar date of the next occurrence.
    pub occurrence: NaiveDate,
    /// Days from today until the occurrence (0 = today).
    pub days_until: i64,
    pub message: String,
}

/// Parse and validate a `DD-MM` date string.
///
/// The format is fixed: exactly 5 characters, `-` at index 2, both parts
/// numeric. The day/month pair must exist in a leap year, so `29-02` is
/// valid while `31-04` and `30-02` are not.
pub fn validate_date(s: &str) -> Result<(u32, u32), DateError> {
    let bytes = s.as_bytes();
    if bytes.len() != 5
        || bytes[2] != b'-'
        || ![0, 1, 3, 4].into_iter().all(|i| bytes[i].is_ascii_digit())
    {
        return Err(DateError::Format);
    }

    let day: u32 = s[..2].parse().map_err(|_| DateError::Format)?;
    let month: u32 = s[3..].parse().map_err(|_| DateError::Format)?;

    if NaiveDate::from_ymd_opt(LEAP_REFERENCE_YEAR, month, day).is_none() {
        return Err(DateError::Calendar { day, month });
    }

    Ok((day, month))
}

/// Compute the next occurrence of a day/month birthday relative to `today`.
///
/// Returns the occurrence date and the number of days until it; 0 means the
/// birthday is today. A `29-02` birthday rolls over to `01-03` in non-leap
/// years.
pub fn next_occurrence(day: u32, month: u32, today: NaiveDate) -> (NaiveDate, i64) {
    let this_year = occurrence_in_year(day, month, today.year());
    let occurrence = if this_year < today {
        occurrence_in_year(day, month, today.year() + 1)
    } else {
        this_year
    };
    (occurrence, (occurrence - today).num_days())
}

fn occurrence_in_year(day: u32, month: u32, year: i32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        // Only reachable for 29-02 in a non-leap year.
        None => NaiveDate::from_ymd_opt(year, 3, 1).expect("01-03 exists in every year"),
    }
}

/// Collect every birthday due within `horizon_days`, sorted by days until,
/// ties broken by subject id.
///
/// Records with dates the store failed to guarantee are skipped.
pub fn upcoming(
    records: &HashMap<String, BirthdayRecord>,
    today: NaiveDate,
    horizon_days: i64,
) -> Vec<UpcomingBirthday> {
    let mut list: Vec<UpcomingBirthday> = records
        .iter()
        .filter_map(|(subject_id, record)| {
            let (day, month) = validate_date(&record.date).ok()?;
            let (occurrence, days_until) = next_occurrence(day, month, today);
            (days_until <= horizon_days).then(|| UpcomingBirthday {
                subject_id: subject_id.clone(),
                date: record.date.clone(),
                occurrence,
                days_until,
                message: record.message.clone(),
            })
        })
        .collect();

    list.sort_by(|a, b| {
        a.days_until
            .cmp(&b.days_until)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
    list
}

/// Subjects whose stored date matches `today`, formatted as `DD-MM`.
///
/// This is a textual match against the literal current date, so a `29-02`
/// record only fires on an actual leap day.
pub fn due_today(records: &HashMap<String, BirthdayRecord>, today: NaiveDate) -> Vec<String> {
    let key = today.format("%d-%m").to_string();
    let mut due: Vec<String> = records
        .iter()
        .filter(|(_, record)| record.date == key)
        .map(|(subject_id, _)| subject_id.clone())
        .collect();
    due.sort();
    due
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str) -> BirthdayRecord {
        BirthdayRecord {
            date: date.to_string(),
            message: String::new(),
            added_by: "1".to_string(),
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn validate_date_accepts_well_formed_dates() {
        assert_eq!(validate_date("25-12"), Ok((25, 12)));
        assert_eq!(validate_date("01-01"), Ok((1, 1)));
        assert_eq!(validate_date("31-12"), Ok((31, 12)));
        assert_eq!(validate_date("29-02"), Ok((29, 2)));
    }

    #[test]
    fn validate_date_rejects_bad_format() {
        assert_eq!(validate_date(""), Err(DateError::Format));
        assert_eq!(validate_date("1-1"), Err(DateError::Format));
        assert_eq!(validate_date("25-123"), Err(DateError::Format));
        assert_eq!(validate_date("25/12"), Err(DateError::Format));
        assert_eq!(validate_date("2-512"), Err(DateError::Format));
        assert_eq!(validate_date("ab-cd"), Err(DateError::Format));
        assert_eq!(validate_date("+1-05"), Err(DateError::Format));
        assert_eq!(validate_date("25-12 "), Err(DateError::Format));
    }

    #[test]
    fn validate_date_rejects_impossible_dates() {
        assert_eq!(
            validate_date("31-04"),
            Err(DateError::Calendar { day: 31, month: 4 })
        );
        assert_eq!(
            validate_date("30-02"),
            Err(DateError::Calendar { day: 30, month: 2 })
        );
        assert_eq!(
            validate_date("00-05"),
            Err(DateError::Calendar { day: 0, month: 5 })
        );
        assert_eq!(
            validate_date("05-13"),
            Err(DateError::Calendar { day: 5, month: 13 })
        );
        assert_eq!(
            validate_date("32-01"),
            Err(DateError::Calendar { day: 32, month: 1 })
        );
    }

    #[test]
    fn next_occurrence_later_this_year() {
        let (occurrence, days) = next_occurrence(20, 6, date(2024, 6, 15));
        assert_eq!(occurrence, date(2024, 6, 20));
        assert_eq!(days, 5);
    }

    #[test]
    fn next_occurrence_rolls_to_next_year() {
        let (occurrence, days) = next_occurrence(1, 1, date(2024, 6, 15));
        assert_eq!(occurrence, date(2025, 1, 1));
        assert_eq!(days, 200);
    }

    #[test]
    fn next_occurrence_today_is_the_birthday() {
        let (occurrence, days) = next_occurrence(15, 6, date(2024, 6, 15));
        assert_eq!(occurrence, date(2024, 6, 15));
        assert_eq!(days, 0);
    }

    #[test]
    fn next_occurrence_feb_29_in_leap_year() {
        let (occurrence, days) = next_occurrence(29, 2, date(2024, 1, 1));
        assert_eq!(occurrence, date(2024, 2, 29));
        assert_eq!(days, 59);
    }

    #[test]
    fn next_occurrence_feb_29_rolls_to_march_in_non_leap_year() {
        let (occurrence, days) = next_occurrence(29, 2, date(2025, 1, 1));
        assert_eq!(occurrence, date(2025, 3, 1));
        assert_eq!(days, 59);
    }

    #[test]
    fn upcoming_sorts_by_days_until() {
        let today = date(2024, 6, 15);
        let records = HashMap::from([
            ("a".to_string(), record("20-06")), // 5 days
            ("b".to_string(), record("16-06")), // 1 day
            ("c".to_string(), record("15-07")), // 30 days
        ]);

        let list = upcoming(&records, today, 30);
        let order: Vec<(&str, i64)> = list
            .iter()
            .map(|u| (u.subject_id.as_str(), u.days_until))
            .collect();
        assert_eq!(order, vec![("b", 1), ("a", 5), ("c", 30)]);
    }

    #[test]
    fn upcoming_ties_break_by_subject_id() {
        let today = date(2024, 6, 15);
        let records = HashMap::from([
            ("zz".to_string(), record("16-06")),
            ("aa".to_string(), record("16-06")),
        ]);

        let list = upcoming(&records, today, 30);
        let ids: Vec<&str> = list.iter().map(|u| u.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "zz"]);
    }

    #[test]
    fn upcoming_respects_horizon() {
        let today = date(2024, 6, 15);
        // 40 days out
        let records = HashMap::from([("a".to_string(), record("25-07"))]);

        assert!(upcoming(&records, today, 30).is_empty());
        assert_eq!(upcoming(&records, today, 40).len(), 1);
    }

    #[test]
    fn due_today_matches_literal_date() {
        let today = date(2024, 6, 15);
        let records = HashMap::from([
            ("a".to_string(), record("15-06")),
            ("b".to_string(), record("16-06")),
            ("c".to_string(), record("15-06")),
        ]);

        assert_eq!(due_today(&records, today), vec!["a", "c"]);
    }

    #[test]
    fn due_today_feb_29_only_fires_on_leap_day() {
        let records = HashMap::from([("a".to_string(), record("29-02"))]);

        assert_eq!(due_today(&records, date(2024, 2, 29)), vec!["a"]);
        assert!(due_today(&records, date(2025, 2, 28)).is_empty());
        assert!(due_today(&records, date(2025, 3, 1)).is_empty());
    }
}
