//! Term matching shared by the source adapters.
//!
//! A record matches when its serialized field values contain the term, or a
//! reordering of it, ignoring case.

use crate::core::Record;

/// Lowercased forms of `term` to look for.
///
/// A two-word term is treated as a personal name, so `"Luis Quan"` also
/// matches `"quan, luis"` and `"quan luis"`.
///
/// # Examples
///
/// ```
/// use marksplice::source::term_variations;
///
/// assert_eq!(
///     term_variations("Luis Quan"),
///     vec!["luis quan", "quan, luis", "quan luis"]
/// );
/// assert_eq!(term_variations("Verma"), vec!["verma"]);
/// ```
#[must_use]
pub fn term_variations(term: &str) -> Vec<String> {
    let lower = term.trim().to_lowercase();
    let parts: Vec<&str> = lower.split_whitespace().collect();

    let mut variations = vec![lower.clone()];
    if let [first, last] = parts.as_slice() {
        variations.push(format!("{last}, {first}"));
        variations.push(format!("{last} {first}"));
    }
    variations
}

/// Returns true if any variation occurs in the record's field values.
#[must_use]
pub fn record_matches(record: &Record, variations: &[String]) -> bool {
    let haystack = record.fields_json().to_lowercase();
    variations.iter().any(|v| haystack.contains(v.as_str()))
}

/// Keeps the first `limit` records that match `term`, in encounter order.
#[must_use]
pub fn filter_by_term<I>(records: I, term: &str, limit: usize) -> Vec<Record>
where
    I: IntoIterator<Item = Record>,
{
    let variations = term_variations(term);
    records
        .into_iter()
        .filter(|record| record_matches(record, &variations))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient(id: &str, name: &str) -> Record {
        Record::new(id)
            .with_field("Patient", json!(name))
            .with_field("Procedure", json!("laser"))
    }

    #[test]
    fn test_variations_for_single_word() {
        assert_eq!(term_variations("  Bastien "), vec!["bastien"]);
    }

    #[test]
    fn test_variations_ignore_three_part_names() {
        assert_eq!(
            term_variations("Anna Maria Lopez"),
            vec!["anna maria lopez"]
        );
    }

    #[test]
    fn test_matches_case_insensitively() {
        let variations = term_variations("LASER");
        assert!(record_matches(&patient("a", "Verma"), &variations));
    }

    #[test]
    fn test_matches_reordered_name() {
        let variations = term_variations("Luis Quan");
        assert!(record_matches(&patient("a", "Quan, Luis"), &variations));
        assert!(record_matches(&patient("b", "quan luis"), &variations));
        assert!(!record_matches(&patient("c", "Luisa Quant-Smith"), &term_variations("Bastien")));
    }

    #[test]
    fn test_matches_inside_lists() {
        let record = Record::new("r").with_field("Tags", json!(["acne scars", "peel"]));
        assert!(record_matches(&record, &term_variations("acne scars")));
    }

    #[test]
    fn test_filter_respects_limit_and_order() {
        let records = vec![
            patient("1", "Verma"),
            patient("2", "Bastien"),
            patient("3", "Verma, Raj"),
            patient("4", "Verma Jr"),
        ];
        let found = filter_by_term(records, "verma", 2);
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_filter_no_match() {
        let found = filter_by_term(vec![patient("1", "Verma")], "Anjalina", 10);
        assert!(found.is_empty());
    }
}
