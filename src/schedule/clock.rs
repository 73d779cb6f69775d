use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

// CET/CEST, DST included.
pub const TIMEZONE: Tz = chrono_tz::Europe::Berlin;

pub fn local_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&TIMEZONE).date_naive()
}

pub fn today() -> NaiveDate {
    local_date(Utc::now())
}

pub fn previous_day(date: NaiveDate) -> Result<NaiveDate> {
    date.pred_opt()
        .with_context(|| format!("No calendar day before {date}"))
}

#[cfg(test)]
mod tests {
    use super::{TIMEZONE, local_date, previous_day};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn winter_day_starts_one_hour_before_utc_midnight() {
        let before = Utc.with_ymd_and_hms(2024, 1, 10, 22, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 10, 23, 0, 0).unwrap();

        assert_eq!(local_date(before), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(local_date(after), NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
    }

    #[test]
    fn summer_day_starts_two_hours_before_utc_midnight() {
        let before = Utc.with_ymd_and_hms(2024, 7, 10, 21, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 7, 10, 22, 0, 0).unwrap();

        assert_eq!(local_date(before), NaiveDate::from_ymd_opt(2024, 7, 10).unwrap());
        assert_eq!(local_date(after), NaiveDate::from_ymd_opt(2024, 7, 11).unwrap());
    }

    #[test]
    fn previous_day_crosses_month_and_year() {
        let new_year = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            previous_day(new_year).expect("previous"),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(previous_day(NaiveDate::MIN).is_err());
    }

    #[test]
    fn timezone_name_is_berlin() {
        assert_eq!(TIMEZONE.name(), "Europe/Berlin");
    }
}
