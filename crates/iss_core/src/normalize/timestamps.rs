use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AppError;

/// Render a timestamp in the canonical stored form: RFC3339, UTC, whole seconds.
///
/// Sub-second precision is dropped so that stored strings sort lexically in chronological order
/// (`time` only emits a fractional part when it is non-zero).
pub fn canonical_utc(dt: OffsetDateTime) -> Result<String, AppError> {
    let utc = dt.to_offset(UtcOffset::UTC);
    let truncated = utc.replace_nanosecond(0).map_err(|e| {
        AppError::new("TS_FORMAT_FAILED", "Failed to truncate timestamp")
            .with_details(e.to_string())
    })?;
    truncated.format(&Rfc3339).map_err(|e| {
        AppError::new("TS_FORMAT_FAILED", "Failed to format timestamp")
            .with_details(e.to_string())
    })
}

pub fn parse_rfc3339(field: &str, raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|e| {
        AppError::new(
            "VALIDATION_TS_PARSE_FAILED",
            format!("Failed to parse {field} as RFC3339"),
        )
        .with_details(format!("value={raw}; err={e}"))
    })
}

/// Seconds from `start` to `end`, or `None` when either side is unparseable or `end < start`.
pub fn elapsed_seconds(start: &str, end: &str) -> Option<i64> {
    let a = OffsetDateTime::parse(start, &Rfc3339).ok()?;
    let b = OffsetDateTime::parse(end, &Rfc3339).ok()?;
    let secs = (b - a).whole_seconds();
    if secs < 0 {
        None
    } else {
        Some(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn canonical_form_is_utc_whole_seconds() {
        let dt = datetime!(2026-03-01 10:15:30.750 +02:00);
        assert_eq!(canonical_utc(dt).unwrap(), "2026-03-01T08:15:30Z");
    }

    #[test]
    fn elapsed_rejects_reversed_and_garbage() {
        assert_eq!(
            elapsed_seconds("2026-01-01T00:00:00Z", "2026-01-01T01:00:00Z"),
            Some(3600)
        );
        assert_eq!(
            elapsed_seconds("2026-01-01T01:00:00Z", "2026-01-01T00:00:00Z"),
            None
        );
        assert_eq!(elapsed_seconds("yesterday", "2026-01-01T00:00:00Z"), None);
    }

    #[test]
    fn parse_reports_field_name() {
        let err = parse_rfc3339("created_at", "not-a-date").unwrap_err();
        assert_eq!(err.code, "VALIDATION_TS_PARSE_FAILED");
        assert!(err.message.contains("created_at"));
    }
}
