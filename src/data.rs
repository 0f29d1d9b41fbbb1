use std::{borrow::Cow, fmt};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Rendering used whenever a date-time cell is coerced back to text.
pub const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single table cell.
///
/// Cells start life as [`Cell::Text`] or [`Cell::Null`] when read from a
/// source file; date inference may turn text into [`Cell::DateTime`], and
/// width profiling coerces everything that is not a date column back to text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Null,
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// String form of the cell; `None` for null, never the text "null".
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Null => None,
            Cell::Text(value) => Some(Cow::Borrowed(value)),
            Cell::DateTime(value) => {
                Some(Cow::Owned(value.format(DATETIME_TEXT_FORMAT).to_string()))
            }
        }
    }

    /// Converts the cell to its text state. Nulls stay null.
    pub fn into_text(self) -> Cell {
        match self {
            Cell::DateTime(value) => Cell::Text(value.format(DATETIME_TEXT_FORMAT).to_string()),
            other => other,
        }
    }

    /// Length in characters of the serialized form; zero for null.
    pub fn text_len(&self) -> usize {
        match self {
            Cell::Null => 0,
            Cell::Text(value) => value.chars().count(),
            // "YYYY-MM-DD HH:MM:SS"
            Cell::DateTime(_) => 19,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

/// One of the layouts the date parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Rfc3339,
    DateTime(&'static str),
    Date(&'static str),
}

impl DateFormat {
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let parsed = match self {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|parsed| parsed.naive_utc()),
            DateFormat::DateTime(fmt) => NaiveDateTime::parse_from_str(value, fmt).ok(),
            DateFormat::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
        }?;
        // chrono's `%Y` takes any digit count; a four-digit layout must not
        // read `1/5/24` as the year 1.
        if self.pattern().contains("%Y") && parsed.year() < 1000 {
            return None;
        }
        Some(parsed)
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Rfc3339 => "rfc3339",
            DateFormat::DateTime(fmt) | DateFormat::Date(fmt) => fmt,
        }
    }
}

// Ordered: full date-times before bare dates, ISO before regional, month-first
// before day-first for ambiguous slash dates. Four-digit year layouts reject
// years below 1000, so `1/5/24` falls through to the `%y` layouts.
const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::Rfc3339,
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%d %H:%M"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M"),
    DateFormat::DateTime("%Y/%m/%d %H:%M:%S"),
    DateFormat::DateTime("%m/%d/%Y %H:%M:%S"),
    DateFormat::DateTime("%m/%d/%Y %H:%M"),
    DateFormat::DateTime("%d/%m/%Y %H:%M:%S"),
    DateFormat::DateTime("%d/%m/%Y %H:%M"),
    DateFormat::Date("%Y-%m-%d"),
    DateFormat::Date("%Y/%m/%d"),
    DateFormat::Date("%m/%d/%y"),
    DateFormat::Date("%m/%d/%Y"),
    DateFormat::Date("%d/%m/%y"),
    DateFormat::Date("%d/%m/%Y"),
    DateFormat::Date("%m-%d-%Y"),
    DateFormat::Date("%d-%m-%Y"),
    DateFormat::Date("%d.%m.%Y"),
    DateFormat::Date("%Y%m%d"),
    DateFormat::Date("%d-%b-%Y"),
    DateFormat::Date("%d %b %Y"),
    DateFormat::Date("%b %d, %Y"),
    DateFormat::Date("%B %d, %Y"),
    DateFormat::Date("%d %B %Y"),
];

pub fn date_formats() -> &'static [DateFormat] {
    DATE_FORMATS
}

/// Returns the first known layout that reads `value`.
pub fn detect_date_format(value: &str) -> Option<DateFormat> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .copied()
        .find(|format| format.parse(value).is_some())
}

/// General-purpose date parser: tries every known layout in order.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_FORMATS.iter().find_map(|format| format.parse(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_datetime_supports_multiple_formats() {
        let expected = at_midnight(2024, 5, 6);
        assert_eq!(parse_datetime("2024-05-06"), Some(expected));
        assert_eq!(parse_datetime("2024/05/06"), Some(expected));
        assert_eq!(parse_datetime("06-May-2024"), Some(expected));
        assert_eq!(parse_datetime("May 06, 2024"), Some(expected));
        assert_eq!(parse_datetime(" 2024-05-06 "), Some(expected));
    }

    #[test]
    fn ambiguous_slash_dates_read_month_first() {
        assert_eq!(parse_datetime("01/05/2024"), Some(at_midnight(2024, 1, 5)));
        // Only valid day-first.
        assert_eq!(parse_datetime("25/05/2024"), Some(at_midnight(2024, 5, 25)));
        assert_eq!(parse_datetime("1/5/24"), Some(at_midnight(2024, 1, 5)));
        assert_eq!(parse_datetime("12/31/99"), Some(at_midnight(1999, 12, 31)));
    }

    #[test]
    fn four_digit_year_layouts_reject_short_years() {
        assert_eq!(DateFormat::Date("%Y/%m/%d").parse("1/5/24"), None);
        assert_eq!(DateFormat::Date("%m/%d/%Y").parse("1/5/24"), None);
        assert_eq!(
            detect_date_format("1/5/24").map(|f| f.pattern()),
            Some("%m/%d/%y")
        );
    }

    #[test]
    fn parse_datetime_keeps_time_of_day() {
        let expected = NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert_eq!(parse_datetime("2024-05-06T14:30:00"), Some(expected));
        assert_eq!(parse_datetime("2024-05-06 14:30"), Some(expected));
        assert_eq!(parse_datetime("05/06/2024 14:30:00"), Some(expected));
        assert_eq!(parse_datetime("2024-05-06T14:30:00Z"), Some(expected));
    }

    #[test]
    fn parse_datetime_rejects_non_dates() {
        assert_eq!(parse_datetime("soon"), None);
        assert_eq!(parse_datetime("2024-13-45"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn detect_date_format_reports_matching_layout() {
        let format = detect_date_format("2024-01-05").unwrap();
        assert_eq!(format.pattern(), "%Y-%m-%d");
        assert_eq!(detect_date_format("hello"), None);
    }

    #[test]
    fn cells_convert_between_states() {
        let stamp = at_midnight(2024, 1, 5);
        assert_eq!(Cell::DateTime(stamp).into_text(), Cell::text("2024-01-05 00:00:00"));
        assert_eq!(Cell::Null.into_text(), Cell::Null);
        assert_eq!(Cell::Null.to_text(), None);
        assert_eq!(Cell::text("abc").text_len(), 3);
        assert_eq!(Cell::DateTime(stamp).text_len(), 19);
        assert_eq!(Cell::Null.to_string(), "");
    }
}
