//! Client-side date-range correction for invoice listings.
//!
//! The upstream list endpoint does not reliably apply its own `dateFrom` /
//! `dateTo` filters, so listings are filtered again here on the document's
//! `date` field (Unix seconds, interpreted in UTC).

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Keeps only the documents whose `date` falls inside `[from, to]`.
///
/// With both bounds absent the input is returned untouched. Otherwise any
/// element that is not an object with a numeric `date` is dropped, because
/// its membership in the range cannot be decided. Surviving elements keep
/// their input order.
#[must_use]
pub fn filter_by_date_range(
    items: Vec<Value>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<Value> {
    if from.is_none() && to.is_none() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            document_date(item).is_some_and(|date| {
                from.is_none_or(|start| date >= start) && to.is_none_or(|end| date <= end)
            })
        })
        .collect()
}

/// Calendar date (UTC) of a document's `date` timestamp.
fn document_date(item: &Value) -> Option<NaiveDate> {
    let timestamp = item.as_object()?.get("date")?;
    let seconds = timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().and_then(whole_seconds))?;
    DateTime::from_timestamp(seconds, 0).map(|instant| instant.date_naive())
}

/// Floors a fractional timestamp to whole seconds, rejecting values outside `i64`.
#[allow(
    clippy::cast_possible_truncation,
    reason = "range is checked before the cast"
)]
fn whole_seconds(seconds: f64) -> Option<i64> {
    let floored = seconds.floor();
    (-9.0e18_f64..=9.0e18_f64)
        .contains(&floored)
        .then_some(floored as i64)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "test code uses expect for readability"
)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::filter_by_date_range;

    fn day(year: i32, month: u32, date: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, date).expect("valid date for test")
    }

    fn stamp(year: i32, month: u32, date: u32) -> i64 {
        day(year, month, date)
            .and_hms_opt(12, 0, 0)
            .expect("valid time for test")
            .and_utc()
            .timestamp()
    }

    fn doc(id: &str, timestamp: i64) -> Value {
        json!({ "id": id, "date": timestamp })
    }

    #[test]
    fn no_bounds_is_identity() {
        let items = vec![json!("not an object"), json!({ "id": "x" }), doc("a", 0_i64)];
        assert_eq!(filter_by_date_range(items.clone(), None, None), items);
        assert!(filter_by_date_range(Vec::new(), None, None).is_empty());
    }

    #[test]
    fn keeps_only_documents_inside_the_range() {
        let items = vec![
            doc("jan-01", stamp(2024, 1, 1)),
            doc("jan-15", stamp(2024, 1, 15)),
            doc("feb-01", stamp(2024, 2, 1)),
        ];
        let kept = filter_by_date_range(items, Some(day(2024, 1, 10)), Some(day(2024, 1, 31)));
        assert_eq!(kept, vec![doc("jan-15", stamp(2024, 1, 15))]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let items = vec![
            doc("first", stamp(2024, 3, 1)),
            doc("last", stamp(2024, 3, 31)),
        ];
        let kept = filter_by_date_range(
            items.clone(),
            Some(day(2024, 3, 1)),
            Some(day(2024, 3, 31)),
        );
        assert_eq!(kept, items);
    }

    #[test]
    fn single_bound_filters_one_side() {
        let items = vec![
            doc("old", stamp(2023, 12, 31)),
            doc("new", stamp(2024, 1, 1)),
        ];
        let from_only = filter_by_date_range(items.clone(), Some(day(2024, 1, 1)), None);
        assert_eq!(from_only, vec![doc("new", stamp(2024, 1, 1))]);
        let to_only = filter_by_date_range(items, None, Some(day(2023, 12, 31)));
        assert_eq!(to_only, vec![doc("old", stamp(2023, 12, 31))]);
    }

    #[test]
    fn undecidable_elements_are_dropped_when_a_bound_is_set() {
        let items = vec![
            json!(42_i64),
            json!({ "id": "no-date" }),
            json!({ "id": "string-date", "date": "2024-01-15" }),
            json!({ "id": "null-date", "date": null }),
            doc("ok", stamp(2024, 1, 15)),
        ];
        let kept = filter_by_date_range(items, Some(day(2024, 1, 1)), None);
        assert_eq!(kept, vec![doc("ok", stamp(2024, 1, 15))]);
    }

    #[test]
    fn dates_are_taken_in_utc() {
        // 2024-01-31T23:30:00Z is still January in UTC.
        let late_evening = day(2024, 1, 31)
            .and_hms_opt(23, 30, 0)
            .expect("valid time for test")
            .and_utc()
            .timestamp();
        let items = vec![doc("late", late_evening)];
        let kept = filter_by_date_range(items.clone(), None, Some(day(2024, 1, 31)));
        assert_eq!(kept, items);
    }

    #[test]
    fn fractional_timestamps_are_accepted() {
        let items = vec![json!({ "id": "frac", "date": 1_705_320_000.75_f64 })];
        let kept = filter_by_date_range(
            items.clone(),
            Some(day(2024, 1, 15)),
            Some(day(2024, 1, 15)),
        );
        assert_eq!(kept, items);
    }
}
