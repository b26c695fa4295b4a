//! Bounds for the `between` operator.
//!
//! Date and datetime fields get calendar semantics anchored on the caller's
//! `now`: a missing upper bound runs through the end of today and a missing
//! range means today only. Other fields take the bounds literally.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::DataError;
use crate::schema::FieldType;
use crate::types::Value;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Resolved bounds, both inclusive.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Bounds {
    Range(Value, Value),
    /// Lower bound only.
    From(Value),
    /// Matches nothing.
    Never,
}

/// Resolve a `between` value on a field of type `field_type`.
pub(super) fn resolve(
    field: &str,
    field_type: FieldType,
    value: &Value,
    now: NaiveDateTime,
) -> Result<Bounds, DataError> {
    let items: Vec<Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        Value::String(s) if s.contains(',') => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Value::from)
            .collect(),
        scalar => vec![scalar.clone()],
    };
    if items.len() > 2 {
        return Err(DataError::InvalidValue {
            field: field.to_string(),
            reason: format!("`between` takes at most 2 bounds, got {}", items.len()),
        });
    }

    if !field_type.is_date() {
        let mut items = items.into_iter();
        return Ok(match (items.next(), items.next()) {
            (Some(from), Some(to)) => Bounds::Range(from, to),
            (Some(from), None) => Bounds::From(from),
            _ => Bounds::Never,
        });
    }

    let today = Instant::Date(now.date());
    let mut parsed = items.iter().map(|item| parse(field, item));
    let from = parsed.next().transpose()?.unwrap_or(today);
    let to = parsed.next().transpose()?.unwrap_or(today);

    Ok(if field_type == FieldType::Datetime {
        Bounds::Range(
            Value::String(from.start_of_day()),
            Value::String(to.end_of_day()),
        )
    } else {
        Bounds::Range(Value::String(from.date()), Value::String(to.date()))
    })
}

/// A bound as written: a bare date or a full timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instant {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Instant {
    /// Lower datetime bound; bare dates start at midnight.
    ///
    /// Stored timestamps are compared as text and may omit the fraction, so
    /// the lower bound uses the shortest spelling of its instant.
    fn start_of_day(self) -> String {
        match self {
            Self::Date(d) => format!("{} 00:00:00", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => {
                let text = dt.format(DATETIME_FORMAT).to_string();
                text.trim_end_matches('0').trim_end_matches('.').to_string()
            }
        }
    }

    /// Upper datetime bound; bare dates end at the last microsecond.
    fn end_of_day(self) -> String {
        match self {
            Self::Date(d) => format!("{} 23:59:59.999999", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    fn date(self) -> String {
        match self {
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
            Self::DateTime(dt) => dt.date().format(DATE_FORMAT).to_string(),
        }
    }
}

fn parse(field: &str, value: &Value) -> Result<Instant, DataError> {
    let invalid = || DataError::InvalidValue {
        field: field.to_string(),
        reason: format!("`{}` is not a valid date", value_text(value)),
    };
    let text = value.as_str().map(str::trim).ok_or_else(invalid)?;

    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Ok(Instant::Date(date));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(Instant::DateTime)
        .ok_or_else(invalid)
}

fn value_text(value: &Value) -> String {
    value.to_json().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap()
    }

    fn range(from: &str, to: &str) -> Bounds {
        Bounds::Range(Value::from(from), Value::from(to))
    }

    #[test]
    fn test_datetime_two_date_bounds_cover_whole_days() {
        let value = Value::from(vec!["2016-07-06", "2016-07-07"]);
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &value, now()).unwrap(),
            range("2016-07-06 00:00:00", "2016-07-07 23:59:59.999999")
        );
    }

    #[test]
    fn test_datetime_single_bound_runs_through_today() {
        let value = Value::from(vec!["2016-07-07"]);
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &value, now()).unwrap(),
            range("2016-07-07 00:00:00", "2024-03-15 23:59:59.999999")
        );
    }

    #[test]
    fn test_datetime_null_means_today() {
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &Value::Null, now()).unwrap(),
            range("2024-03-15 00:00:00", "2024-03-15 23:59:59.999999")
        );
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &Value::Array(vec![]), now()).unwrap(),
            range("2024-03-15 00:00:00", "2024-03-15 23:59:59.999999")
        );
    }

    #[test]
    fn test_datetime_explicit_times_are_kept() {
        let value = Value::from(vec!["2016-07-06 08:00:00", "2016-07-06T17:30:00.25"]);
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &value, now()).unwrap(),
            range("2016-07-06 08:00:00", "2016-07-06 17:30:00.250000")
        );
    }

    #[test]
    fn test_lower_bound_admits_timestamps_without_fraction() {
        let value = Value::from(vec!["2016-07-06", "2016-07-07"]);
        let Bounds::Range(Value::String(from), Value::String(to)) =
            resolve("starts_on", FieldType::Datetime, &value, now()).unwrap()
        else {
            panic!("expected a datetime range");
        };
        for stored in ["2016-07-06 00:00:00", "2016-07-06 00:00:00.000000", "2016-07-07 23:59:59"] {
            assert!(from.as_str() <= stored && stored <= to.as_str(), "{stored} out of range");
        }
        assert!("2016-07-05 23:59:59.999999" < from.as_str());
    }

    #[test]
    fn test_lower_bound_keeps_significant_fraction() {
        let value = Value::from(vec!["2016-07-06 08:00:00.250", "2016-07-06 09:00:00"]);
        assert_eq!(
            resolve("starts_on", FieldType::Datetime, &value, now()).unwrap(),
            range("2016-07-06 08:00:00.25", "2016-07-06 09:00:00.000000")
        );
    }

    #[test]
    fn test_date_field_bounds() {
        let value = Value::from("2016-07-06, 2016-07-07 12:00:00");
        assert_eq!(
            resolve("ends_on", FieldType::Date, &value, now()).unwrap(),
            range("2016-07-06", "2016-07-07")
        );
        assert_eq!(
            resolve("ends_on", FieldType::Date, &Value::Null, now()).unwrap(),
            range("2024-03-15", "2024-03-15")
        );
    }

    #[test]
    fn test_non_date_fields_take_bounds_literally() {
        let two = Value::from(vec![1_i64, 5]);
        assert_eq!(
            resolve("idx", FieldType::Int, &two, now()).unwrap(),
            Bounds::Range(Value::Int(1), Value::Int(5))
        );
        assert_eq!(
            resolve("idx", FieldType::Int, &Value::from(vec![3_i64]), now()).unwrap(),
            Bounds::From(Value::Int(3))
        );
        assert_eq!(
            resolve("name", FieldType::Data, &Value::Null, now()).unwrap(),
            Bounds::Never
        );
    }

    #[test]
    fn test_rejects_bad_dates_and_extra_bounds() {
        assert!(resolve("starts_on", FieldType::Datetime, &Value::from(vec!["yesterday"]), now()).is_err());
        assert!(resolve("starts_on", FieldType::Datetime, &Value::from(vec!["2016-13-01"]), now()).is_err());
        assert!(resolve("starts_on", FieldType::Datetime, &Value::Int(20160706), now()).is_err());
        assert!(
            resolve("idx", FieldType::Int, &Value::from(vec![1_i64, 2, 3]), now()).is_err()
        );
    }
}
