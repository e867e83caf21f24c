use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Timestamps are persisted in documents as RFC 3339 strings in UTC.
pub(crate) fn now_rfc3339() -> String {
    format_offset(OffsetDateTime::now_utc())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Calendar date used when content is entered without an explicit course date.
pub(crate) fn today_iso() -> String {
    let today = OffsetDateTime::now_utc().date();
    format!("{:04}-{:02}-{:02}", today.year(), u8::from(today.month()), today.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, PrimitiveDateTime, Time, UtcOffset};

    #[test]
    fn format_offset_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let value = PrimitiveDateTime::new(date, time).assume_utc();
        assert_eq!(format_offset(value), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn format_offset_preserves_offset() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let shifted =
            PrimitiveDateTime::new(date, time).assume_utc().to_offset(UtcOffset::from_hms(8, 0, 0).unwrap());
        assert_eq!(format_offset(shifted), "2025-01-02T18:20:30+08:00");
    }

    #[test]
    fn today_is_iso_date() {
        let today = today_iso();
        assert_eq!(today.len(), 10);
        assert_eq!(&today[4..5], "-");
    }
}
