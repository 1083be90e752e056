// Medicine Card - Display model shared by the terminal UI and the API

use crate::locale::{translate, Label, Language};
use crate::medicine::{Collection, Medicine};
use crate::normalize::{normalize_date, normalize_price, normalize_stock, EMPTY_SENTINEL};
use serde::Serialize;

/// One labelled value on a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRow {
    pub label: String,
    pub value: String,
}

impl CardRow {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// MedicineCard - Display-ready rendering of one record
///
/// Everything the presentation layers show is computed here, in the
/// selected language, so the TUI and the API render identical cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicineCard {
    pub id: String,
    pub collection: Collection,
    pub title: String,
    pub subtitle: String,
    pub rows: Vec<CardRow>,
    /// The out-of-stock badge text, when the stock row shows it.
    pub badge: Option<String>,
    pub out_of_stock: bool,
    /// Whether an "add" action is offered (false on the shortlist itself).
    pub show_add: bool,
}

impl MedicineCard {
    /// `collection` is the list the record was read from, which the add
    /// action looks it up in again.
    pub fn build(medicine: &Medicine, collection: Collection, language: Language, show_add: bool) -> Self {
        let out_of_stock_label = translate(Label::OutOfStock, language);
        let stock = normalize_stock(medicine.stock_or_qty(), out_of_stock_label);
        let out_of_stock = stock == out_of_stock_label;
        let price = normalize_price(medicine.price());
        let expiry = normalize_date(medicine.expiry());

        let rows = match medicine {
            Medicine::Product(_) => vec![
                CardRow::new(translate(Label::Stock, language), stock),
                CardRow::new("MRP", price),
                CardRow::new(translate(Label::Expiry, language), expiry),
            ],
            Medicine::JanAushadhi(record) => vec![
                CardRow::new(translate(Label::Quantity, language), stock),
                CardRow::new("UOM", or_sentinel(record.uom.as_deref())),
                CardRow::new(translate(Label::BatchNo, language), or_sentinel(record.batch_no.as_deref())),
                CardRow::new("MRP", price),
                CardRow::new(translate(Label::Expiry, language), expiry),
            ],
        };

        Self {
            id: medicine.id().to_string(),
            collection,
            title: medicine.display_name(language).to_string(),
            subtitle: medicine.subtitle(),
            rows,
            badge: out_of_stock.then(|| out_of_stock_label.to_string()),
            out_of_stock,
            show_add,
        }
    }

    /// The add action is offered and enabled.
    pub fn can_add(&self) -> bool {
        self.show_add && !self.out_of_stock
    }

    pub fn row(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.value.as_str())
    }
}

fn or_sentinel(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => EMPTY_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn med(id: &str, value: serde_json::Value) -> Medicine {
        Medicine::from_document(Document::from_value(id, value))
    }

    #[test]
    fn test_product_card() {
        let m = med(
            "p1",
            json!({
                "Product Name": "Dolo 650",
                "Product Name_kn": "ಡೋಲೊ 650",
                "Current Stock": 1234,
                "M.R.P.": "P30.5",
                "EXP": "05/01/2027"
            }),
        );
        let card = MedicineCard::build(&m, Collection::Products, Language::English, true);

        assert_eq!(card.title, "Dolo 650");
        assert_eq!(card.subtitle, "Generic");
        assert_eq!(
            card.rows,
            vec![
                CardRow::new("Stock", "1,234"),
                CardRow::new("MRP", "Rs 30.50"),
                CardRow::new("Expiry", "05 Jan 2027"),
            ]
        );
        assert!(card.can_add());
        assert_eq!(card.badge, None);
    }

    #[test]
    fn test_drug_card_in_kannada() {
        let m = med(
            "D1",
            json!({"Drug Code": "1042", "Drug Name": "Paracetamol", "Drug Name_kn": "ಪ್ಯಾರಸಿಟಮಾಲ್", "Qty": "0", "MRP": 12}),
        );
        let card = MedicineCard::build(&m, Collection::JanAushadhi, Language::Kannada, true);

        assert_eq!(card.title, "ಪ್ಯಾರಸಿಟಮಾಲ್");
        assert_eq!(card.subtitle, "Jan Aushadhi - 1042");
        assert_eq!(card.row("ಪ್ರಮಾಣ"), Some("ದಾಸ್ತಾನು ಇಲ್ಲ"));
        assert_eq!(card.row("UOM"), Some("-"));
        assert_eq!(card.row("ಬ್ಯಾಚ್ ಸಂಖ್ಯೆ"), Some("-"));
        assert_eq!(card.row("MRP"), Some("Rs 12.00"));
        assert_eq!(card.row("ಅವಧಿ ಮುಕ್ತಾಯ"), Some("-"));
        assert!(card.out_of_stock);
        assert_eq!(card.badge.as_deref(), Some("ದಾಸ್ತಾನು ಇಲ್ಲ"));
        assert!(!card.can_add());
    }

    #[test]
    fn test_missing_stock_is_not_out_of_stock() {
        let m = med("p", json!({"Product Name": "A"}));
        let card = MedicineCard::build(&m, Collection::Products, Language::English, true);
        assert_eq!(card.row("Stock"), Some("-"));
        assert!(!card.out_of_stock);
    }

    #[test]
    fn test_shortlist_cards_hide_add() {
        let m = med("p", json!({"Product Name": "A", "Current Stock": 5}));
        let card = MedicineCard::build(&m, Collection::Products, Language::English, false);
        assert!(!card.can_add());
        assert!(!card.out_of_stock);
    }
}
