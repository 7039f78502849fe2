//! Name normalizer

use contracts::RawValue;
use tracing::debug;

/// Longest name kept on a canonical record, in characters
pub const MAX_NAME_LEN: usize = 255;

/// Trim and collapse whitespace. Empty or over-long names become `None`.
pub fn normalize_name(value: &RawValue) -> Option<String> {
    let text = value.as_text()?;
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return None;
    }

    let len = collapsed.chars().count();
    if len > MAX_NAME_LEN {
        debug!(len, max = MAX_NAME_LEN, "dropping over-long customer name");
        return None;
    }

    Some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(
            normalize_name(&RawValue::from("  Jane \t  van   Dyke\n")).as_deref(),
            Some("Jane van Dyke")
        );
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(normalize_name(&RawValue::Absent), None);
        assert_eq!(normalize_name(&RawValue::from("   ")), None);
    }

    #[test]
    fn test_length_limit() {
        let at_limit = "a".repeat(MAX_NAME_LEN);
        assert_eq!(normalize_name(&RawValue::from(at_limit.as_str())), Some(at_limit));
        assert_eq!(normalize_name(&RawValue::from("b".repeat(MAX_NAME_LEN + 1))), None);
    }

    #[test]
    fn test_numbers_render_as_text() {
        assert_eq!(normalize_name(&RawValue::Number(1234.0)).as_deref(), Some("1234"));
    }
}
