//! Date normalization.
//!
//! Turns listing date text such as `"Mar 15, 2024"` or
//! `"Mar 15, 2024 - Mar 17, 2024"` into a `(start, end)` pair and renders the
//! pair back as `"March 15, 2024 to March 17, 2024"`.

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::utils::collapse_whitespace;

/// Accepted per-side formats, in priority order. The numeric form is tried
/// last so that it never shadows a named month.
const DATE_FORMATS: [&str; 3] = ["%b %d, %Y", "%B %d, %Y", "%m/%d/%Y"];

/// Range separators. `" to "` is the display form.
const RANGE_SEPARATORS: [&str; 2] = [" - ", " to "];

const DISPLAY_FORMAT: &str = "%B %d, %Y";

/// Parse a single date or a date range.
pub fn normalize(raw: &str) -> Result<(NaiveDate, NaiveDate)> {
    let text = collapse_whitespace(raw);

    for separator in RANGE_SEPARATORS {
        let occurrences = text.matches(separator).count();
        if occurrences == 0 {
            continue;
        }
        if occurrences > 1 {
            return Err(AppError::date_parse(raw));
        }

        let (start, end) = text
            .split_once(separator)
            .ok_or_else(|| AppError::date_parse(raw))?;
        let start = parse_single(start).ok_or_else(|| AppError::date_parse(raw))?;
        let end = parse_single(end).ok_or_else(|| AppError::date_parse(raw))?;

        if start > end {
            return Err(AppError::date_parse(raw));
        }
        return Ok((start, end));
    }

    let date = parse_single(&text).ok_or_else(|| AppError::date_parse(raw))?;
    Ok((date, date))
}

fn parse_single(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Render a date or a range in display form.
pub fn display(start: NaiveDate, end: NaiveDate) -> String {
    if start == end {
        start.format(DISPLAY_FORMAT).to_string()
    } else {
        format!(
            "{} to {}",
            start.format(DISPLAY_FORMAT),
            end.format(DISPLAY_FORMAT)
        )
    }
}

/// Grouping header for the month containing `date`, e.g. `"March 2024"`.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_abbreviated_date() {
        let (start, end) = normalize("Mar 15, 2024").unwrap();
        assert_eq!(start, date(2024, 3, 15));
        assert_eq!(end, start);
        assert_eq!(display(start, end), "March 15, 2024");
    }

    #[test]
    fn abbreviated_range() {
        let (start, end) = normalize("Mar 15, 2024 - Mar 17, 2024").unwrap();
        assert_eq!(start, date(2024, 3, 15));
        assert_eq!(end, date(2024, 3, 17));
        assert_eq!(display(start, end), "March 15, 2024 to March 17, 2024");
    }

    #[test]
    fn full_month_and_numeric_formats() {
        assert_eq!(normalize("September 5, 2024").unwrap().0, date(2024, 9, 5));
        assert_eq!(normalize("03/15/2024").unwrap().0, date(2024, 3, 15));
    }

    #[test]
    fn sides_may_use_different_formats() {
        let (start, end) = normalize("Dec 30, 2024 - 01/02/2025").unwrap();
        assert_eq!(start, date(2024, 12, 30));
        assert_eq!(end, date(2025, 1, 2));
    }

    #[test]
    fn tolerates_extra_whitespace() {
        assert_eq!(
            normalize("  Mar  15,   2024 ").unwrap(),
            (date(2024, 3, 15), date(2024, 3, 15))
        );
    }

    #[test]
    fn rejects_unparseable_text() {
        match normalize("Sometime soon") {
            Err(AppError::DateParse { input }) => assert_eq!(input, "Sometime soon"),
            other => panic!("expected DateParse, got {other:?}"),
        }
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(matches!(
            normalize("Mar 17, 2024 - Mar 15, 2024"),
            Err(AppError::DateParse { .. })
        ));
    }

    #[test]
    fn rejects_multiple_separators() {
        assert!(normalize("Mar 1, 2024 - Mar 2, 2024 - Mar 3, 2024").is_err());
    }

    #[test]
    fn rejects_half_parsed_range() {
        assert!(normalize("Mar 15, 2024 - later").is_err());
    }

    #[test]
    fn normalization_is_idempotent_through_display() {
        for input in [
            "Mar 15, 2024",
            "March 5, 2024",
            "03/09/2025",
            "Mar 15, 2024 - Mar 17, 2024",
            "Dec 30, 2024 - 01/02/2025",
        ] {
            let first = normalize(input).unwrap();
            let shown = display(first.0, first.1);
            assert_eq!(normalize(&shown).unwrap(), first, "input {input:?}");
            let again = normalize(&shown).unwrap();
            assert_eq!(display(again.0, again.1), shown);
        }
    }

    #[test]
    fn month_label_uses_full_month_name() {
        assert_eq!(month_label(date(2024, 3, 15)), "March 2024");
    }
}
