// Search Filter - Client-side name matching

use crate::medicine::Medicine;

/// Narrow `records` to those whose English or Kannada name contains `query`,
/// ignoring case.
///
/// An empty query keeps every record in order. A missing list yields nothing.
/// The selected display language plays no part: both names are always
/// checked, and a record missing either name never matches.
pub fn filter_medicines<'a>(records: Option<&'a [Medicine]>, query: &str) -> Vec<&'a Medicine> {
    let Some(records) = records else {
        return Vec::new();
    };

    if query.is_empty() {
        return records.iter().collect();
    }

    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|med| matches_query(med, &needle))
        .collect()
}

/// `needle` must already be lower-cased.
pub fn matches_query(medicine: &Medicine, needle: &str) -> bool {
    match medicine.names().both() {
        Some((english, kannada)) => {
            english.to_lowercase().contains(needle) || kannada.to_lowercase().contains(needle)
        }
        None => false,
    }
}
