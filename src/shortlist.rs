// Shortlist - The "my medicines" selection

use crate::medicine::{Collection, Medicine};
use crate::search::matches_query;

/// One shortlisted record and the collection it was picked from.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortlistEntry {
    pub collection: Collection,
    pub medicine: Medicine,
}

/// Session-local selection of records, insertion ordered, unique by id.
///
/// Entries keep the record as it was when added, so the shortlist still
/// renders after the live list moves on.
#[derive(Debug, Clone, Default)]
pub struct Shortlist {
    entries: Vec<ShortlistEntry>,
}

impl Shortlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `medicine`, read from `collection`, unless an entry with the same
    /// id exists. Returns `true` when it was added.
    pub fn add(&mut self, collection: Collection, medicine: Medicine) -> bool {
        if self.contains(medicine.id()) {
            return false;
        }
        self.entries.push(ShortlistEntry { collection, medicine });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.medicine.id() == id)
    }

    pub fn entries(&self) -> &[ShortlistEntry] {
        &self.entries
    }

    /// Entries whose English or Kannada name contains `query`, ignoring case.
    pub fn matching(&self, query: &str) -> Vec<&ShortlistEntry> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| query.is_empty() || matches_query(&e.medicine, &needle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything (session reset).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use serde_json::json;

    fn product(id: &str, name: &str) -> Medicine {
        Medicine::from_document(Document::from_value(id, json!({"Product Name": name})))
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut list = Shortlist::new();
        assert!(list.add(Collection::Products, product("p1", "Dolo")));
        assert!(!list.add(Collection::Products, product("p1", "Dolo (renamed)")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries()[0].medicine.display_name(Default::default()), "Dolo");
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut list = Shortlist::new();
        list.add(Collection::Products, product("b", "B"));
        list.add(Collection::Products, product("a", "A"));
        let ids: Vec<&str> = list.entries().iter().map(|e| e.medicine.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_entry_keeps_source_collection() {
        let mut list = Shortlist::new();
        // a shapeless record read from the product list stays a product entry
        let odd = Medicine::from_document(Document::from_value("x1", json!({"Drug Name": "Para"})));
        list.add(Collection::Products, odd);
        assert_eq!(list.entries()[0].collection, Collection::Products);
    }

    #[test]
    fn test_matching_searches_both_names() {
        let mut list = Shortlist::new();
        list.add(
            Collection::Products,
            Medicine::from_document(Document::from_value(
                "p1",
                json!({"Product Name": "Dolo 650", "Product Name_kn": "ಡೋಲೊ 650"}),
            )),
        );
        list.add(Collection::Products, product("p2", "Crocin"));

        assert_eq!(list.matching("").len(), 2);
        let hits: Vec<&str> = list.matching("ಡೋಲೊ").iter().map(|e| e.medicine.id()).collect();
        assert_eq!(hits, vec!["p1"]);
    }

    #[test]
    fn test_clear() {
        let mut list = Shortlist::new();
        list.add(Collection::Products, product("a", "A"));
        list.clear();
        assert!(list.is_empty());
        assert!(!list.contains("a"));
    }
}
