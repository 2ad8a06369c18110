use chrono::{Local, NaiveDate, TimeZone, Utc};

use crate::errors::AppError;

/// Current time in milliseconds since the epoch, the unit `unlock_date` and
/// `created_at` are stored in.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an unlock date (`YYYY-MM-DD`, any trailing time component after `T`
/// is ignored) into epoch milliseconds at local midnight.
pub fn parse_unlock_date(raw: &str) -> Result<i64, AppError> {
    let date_part = raw.split('T').next().unwrap_or(raw).trim();
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid unlockDate format. Use YYYY-MM-DD.".to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::Validation("Invalid unlockDate".to_string()))?;

    // earliest() picks the first valid instant when local midnight falls in a
    // DST gap.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| AppError::Validation("Invalid unlockDate".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_calendar_date() {
        let ts = parse_unlock_date("2020-01-01").unwrap();
        assert!(ts > 0);
    }

    #[test]
    fn ignores_trailing_time_component() {
        let plain = parse_unlock_date("2030-06-15").unwrap();
        let with_time = parse_unlock_date("2030-06-15T18:45:00").unwrap();
        assert_eq!(plain, with_time);
    }

    #[test]
    fn later_dates_order_after_earlier_ones() {
        let earlier = parse_unlock_date("2020-01-01").unwrap();
        let later = parse_unlock_date("2021-01-01").unwrap();
        assert!(later > earlier);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_unlock_date("not-a-date").is_err());
        assert!(parse_unlock_date("").is_err());
        assert!(parse_unlock_date("2020-13-40").is_err());
    }
}
