//! Display formatting for availability windows, order dates and tracking timestamps

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

pub const NOT_SPECIFIED: &str = "Not specified";

/// Render each `from-to` unix-seconds range of an availability string.
///
/// Ranges that fail to parse are skipped. A range running from 00:00 to 23:59
/// local time renders as `<date> – All Day`.
pub fn availability_slots<Tz: TimeZone>(raw: &str, tz: &Tz) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|range| !range.is_empty())
        .filter_map(|range| format_range(range, tz))
        .collect()
}

/// Availability as display text, one slot per line
pub fn format_availability<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let slots = availability_slots(raw, tz);
    if slots.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        slots.join("\n")
    }
}

fn format_range<Tz: TimeZone>(range: &str, tz: &Tz) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let (from, to) = range.split_once('-')?;
    let from = tz.timestamp_opt(from.trim().parse().ok()?, 0).single()?;
    let to = tz.timestamp_opt(to.trim().parse().ok()?, 0).single()?;

    let date = from.format("%a, %b %-d").to_string();

    let all_day = from.time().format("%H:%M").to_string() == "00:00"
        && to.time().format("%H:%M").to_string() == "23:59";

    if all_day {
        Some(format!("{} – All Day", date))
    } else {
        Some(format!(
            "{}, {} – {}",
            date,
            from.format("%I:%M %p"),
            to.format("%I:%M %p")
        ))
    }
}

/// Parse the date formats the backends emit into the given zone
pub fn parse_datetime<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(tz));
    }

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y, %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return tz.from_local_datetime(&naive).earliest();
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| tz.from_local_datetime(&midnight).earliest());
        }
    }

    None
}

/// Order date as `YYYY-MM-DD HH:MM`, or the raw text when unparsable
pub fn format_order_date<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if raw.trim().is_empty() {
        return "No date".to_string();
    }
    parse_datetime(raw, tz)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Tracking timestamp as `MM/DD/YYYY, HH:MM:SS`.
///
/// A bare `HH:MM:SS` is taken to be today in `now`'s zone; text already in the
/// target shape is passed through; anything unparsable is returned as is.
pub fn format_timestamp<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return "N/A".to_string();
    }

    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        if raw.len() == 8 {
            let today = now.date_naive().and_time(time);
            if let Some(dt) = now.timezone().from_local_datetime(&today).earliest() {
                return dt.format("%m/%d/%Y, %H:%M:%S").to_string();
            }
        }
    }

    if NaiveDateTime::parse_from_str(raw, "%m/%d/%Y, %H:%M:%S").is_ok() && raw.len() == 20 {
        return raw.to_string();
    }

    parse_datetime(raw, &now.timezone())
        .map(|dt| dt.format("%m/%d/%Y, %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Multi-line text as escaped HTML with `<br>` line breaks
pub fn html_lines(s: &str) -> String {
    html_escape(s).replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_all_day_range() {
        assert_eq!(format_availability("0-86399", &Utc), "Thu, Jan 1 – All Day");
    }

    #[test]
    fn test_time_range() {
        assert_eq!(
            format_availability("1700000000-1700003600", &Utc),
            "Tue, Nov 14, 10:13 PM – 11:13 PM"
        );
    }

    #[test]
    fn test_all_day_is_local_time() {
        // 00:00-23:59 in UTC+2 is not all day in UTC
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let from = 86400 - 2 * 3600;
        let to = from + 86399;
        let raw = format!("{from}-{to}");
        assert_eq!(format_availability(&raw, &plus_two), "Fri, Jan 2 – All Day");
        assert!(!format_availability(&raw, &Utc).contains("All Day"));
    }

    #[test]
    fn test_multiple_and_invalid_ranges() {
        let slots = availability_slots("0-86399, garbage, 1700000000-1700003600,", &Utc);
        assert_eq!(slots.len(), 2);
        assert_eq!(format_availability("", &Utc), NOT_SPECIFIED);
        assert_eq!(format_availability("abc-def", &Utc), NOT_SPECIFIED);
    }

    #[test]
    fn test_format_order_date() {
        assert_eq!(format_order_date("2025-03-04T05:06:07Z", &Utc), "2025-03-04 05:06");
        assert_eq!(format_order_date("2025-03-04", &Utc), "2025-03-04 00:00");
        assert_eq!(format_order_date("", &Utc), "No date");
        assert_eq!(format_order_date("last tuesday", &Utc), "last tuesday");
    }

    #[test]
    fn test_format_timestamp() {
        let now = Utc.with_ymd_and_hms(2025, 6, 7, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp("08:09:10", &now), "06/07/2025, 08:09:10");
        assert_eq!(format_timestamp("01/02/2025, 03:04:05", &now), "01/02/2025, 03:04:05");
        assert_eq!(format_timestamp("2025-01-02T03:04:05Z", &now), "01/02/2025, 03:04:05");
        assert_eq!(format_timestamp("soon", &now), "soon");
        assert_eq!(format_timestamp(" ", &now), "N/A");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"A&B'</b>"), "&lt;b&gt;&quot;A&amp;B&#39;&lt;/b&gt;");
        assert_eq!(html_lines("a\n<b>"), "a<br>&lt;b&gt;");
    }
}
