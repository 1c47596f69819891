//! Conversions from raw transport input into argument lists.

/// Splits one input record into whitespace-separated arguments.
///
/// A record made only of whitespace yields an empty list.
#[must_use]
pub fn split_record(record: &str) -> Vec<String> {
    record.split_whitespace().map(str::to_owned).collect()
}

/// Turns an optional single parameter into an argument list.
///
/// Absent and empty values both yield an empty list.
#[must_use]
pub fn single_param(value: Option<&str>) -> Vec<String> {
    match value {
        Some(v) if !v.is_empty() => vec![v.to_owned()],
        _ => Vec::new(),
    }
}
