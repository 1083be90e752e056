// Record Classifier
// Two inventory shapes share the stores:
//   medicine-1  "Generic" stock list  → keyed by `Product Name`
//   medicine-2  Jan Aushadhi list     → keyed by `Drug Name` / `Drug Code`
// The shape is decided once, when a document is ingested.

use crate::error::StoreError;
use crate::locale::Language;
use crate::normalize::RawField;
use crate::store::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// Field names as they appear in store documents
pub const PRODUCT_NAME: &str = "Product Name";
pub const PRODUCT_NAME_KN: &str = "Product Name_kn";
pub const CURRENT_STOCK: &str = "Current Stock";
pub const DRUG_CODE: &str = "Drug Code";
pub const DRUG_NAME: &str = "Drug Name";
pub const DRUG_NAME_KN: &str = "Drug Name_kn";
pub const UOM: &str = "UOM";
pub const BATCH_NO: &str = "Batch No";
pub const QTY: &str = "Qty";
pub const MRP_DOTTED: &str = "M.R.P.";
pub const MRP: &str = "MRP";
pub const EXP: &str = "EXP";
pub const EXPIRY_DATE: &str = "Expiry Date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// Has a `Product Name` field.
    A,
    /// Everything else.
    B,
}

/// The two inventory lists and the store collections they live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    /// Generic stock list (medicine-1)
    Products,
    /// Jan Aushadhi list (medicine-2)
    JanAushadhi,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Products, Collection::JanAushadhi];

    /// Default store collection name.
    pub fn default_name(self) -> &'static str {
        match self {
            Collection::Products => "medicine-1",
            Collection::JanAushadhi => "medicine-2",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::JanAushadhi => "jan-aushadhi",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    /// Accepts the slug or the default collection name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| s == c.slug() || s == c.default_name())
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// Primary (English) and secondary (Kannada) names of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NamePair {
    pub english: Option<String>,
    pub kannada: Option<String>,
}

impl NamePair {
    fn from_fields(fields: &Map<String, Value>, english: &str, kannada: &str) -> Self {
        Self {
            english: text_field(fields, english),
            kannada: text_field(fields, kannada),
        }
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        match language {
            Language::English => self.english.as_deref(),
            Language::Kannada => self.kannada.as_deref(),
        }
    }

    /// Both names, only when both are present and non-empty.
    pub fn both(&self) -> Option<(&str, &str)> {
        match (self.english.as_deref(), self.kannada.as_deref()) {
            (Some(en), Some(kn)) if !en.is_empty() && !kn.is_empty() => Some((en, kn)),
            _ => None,
        }
    }
}

/// Price read from `M.R.P.` first, then `MRP`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceFields {
    pub mrp_dotted: RawField,
    pub mrp: RawField,
}

impl PriceFields {
    fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            mrp_dotted: RawField::from_json(fields.get(MRP_DOTTED)),
            mrp: RawField::from_json(fields.get(MRP)),
        }
    }

    pub fn preferred(&self) -> &RawField {
        if self.mrp_dotted.is_absent() {
            &self.mrp
        } else {
            &self.mrp_dotted
        }
    }
}

/// Expiry read from `EXP` first, then `Expiry Date`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExpiryFields {
    pub exp: RawField,
    pub expiry_date: RawField,
}

impl ExpiryFields {
    fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            exp: RawField::from_json(fields.get(EXP)),
            expiry_date: RawField::from_json(fields.get(EXPIRY_DATE)),
        }
    }

    pub fn preferred(&self) -> &RawField {
        if self.exp.is_absent() {
            &self.expiry_date
        } else {
            &self.exp
        }
    }
}

/// Category A record (`medicine-1`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: NamePair,
    pub current_stock: RawField,
    pub price: PriceFields,
    pub expiry: ExpiryFields,
}

/// Category B record (`medicine-2`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugRecord {
    pub id: String,
    pub drug_code: Option<String>,
    pub name: NamePair,
    pub uom: Option<String>,
    pub batch_no: Option<String>,
    pub qty: RawField,
    pub price: PriceFields,
    pub expiry: ExpiryFields,
}

/// A classified inventory record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category")]
pub enum Medicine {
    Product(ProductRecord),
    JanAushadhi(DrugRecord),
}

impl Medicine {
    /// Classify and type a store document.
    ///
    /// A document carrying a `Product Name` key is category A whatever else
    /// it contains, even when the value is null.
    pub fn from_document(doc: Document) -> Self {
        let Document { id, fields } = doc;
        if fields.contains_key(PRODUCT_NAME) {
            Medicine::Product(ProductRecord {
                id,
                name: NamePair::from_fields(&fields, PRODUCT_NAME, PRODUCT_NAME_KN),
                current_stock: RawField::from_json(fields.get(CURRENT_STOCK)),
                price: PriceFields::from_fields(&fields),
                expiry: ExpiryFields::from_fields(&fields),
            })
        } else {
            Medicine::JanAushadhi(DrugRecord {
                id,
                drug_code: text_field(&fields, DRUG_CODE),
                name: NamePair::from_fields(&fields, DRUG_NAME, DRUG_NAME_KN),
                uom: text_field(&fields, UOM),
                batch_no: text_field(&fields, BATCH_NO),
                qty: RawField::from_json(fields.get(QTY)),
                price: PriceFields::from_fields(&fields),
                expiry: ExpiryFields::from_fields(&fields),
            })
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Medicine::Product(r) => &r.id,
            Medicine::JanAushadhi(r) => &r.id,
        }
    }

    pub fn names(&self) -> &NamePair {
        match self {
            Medicine::Product(r) => &r.name,
            Medicine::JanAushadhi(r) => &r.name,
        }
    }

    /// Name in the selected language; empty when that name is missing.
    pub fn display_name(&self, language: Language) -> &str {
        self.names().get(language).unwrap_or("")
    }

    /// `Current Stock` or `Qty`, depending on the shape.
    pub fn stock_or_qty(&self) -> &RawField {
        match self {
            Medicine::Product(r) => &r.current_stock,
            Medicine::JanAushadhi(r) => &r.qty,
        }
    }

    pub fn price(&self) -> &RawField {
        match self {
            Medicine::Product(r) => r.price.preferred(),
            Medicine::JanAushadhi(r) => r.price.preferred(),
        }
    }

    pub fn expiry(&self) -> &RawField {
        match self {
            Medicine::Product(r) => r.expiry.preferred(),
            Medicine::JanAushadhi(r) => r.expiry.preferred(),
        }
    }

    /// Card subtitle: `Generic` or `Jan Aushadhi - <code>`.
    pub fn subtitle(&self) -> String {
        match self {
            Medicine::Product(_) => "Generic".to_string(),
            Medicine::JanAushadhi(r) => {
                format!("Jan Aushadhi - {}", r.drug_code.as_deref().unwrap_or(""))
            }
        }
    }
}

/// Which shape a record was classified as.
pub fn classify(medicine: &Medicine) -> Category {
    match medicine {
        Medicine::Product(_) => Category::A,
        Medicine::JanAushadhi(_) => Category::B,
    }
}

/// String form of a scalar field; numbers are stringified, other
/// types and null count as missing.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
