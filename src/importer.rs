// Importer - CSV inventory exports into store documents
// Exports usually start with a few banner rows, so the header row is
// located by keyword before columns are mapped onto the document field
// names the browser reads.

use crate::error::Result;
use crate::medicine::{
    Collection, BATCH_NO, CURRENT_STOCK, DRUG_CODE, DRUG_NAME, DRUG_NAME_KN, EXP, EXPIRY_DATE,
    MRP, MRP_DOTTED, PRODUCT_NAME, PRODUCT_NAME_KN, QTY, UOM,
};
use crate::store::Document;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Rows scanned when looking for the header.
const HEADER_SCAN_ROWS: usize = 20;
/// Keyword hits needed for a row to count as the header.
const HEADER_MIN_MATCHES: usize = 2;
const MAX_ID_LEN: usize = 150;

fn header_keywords(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Products => &["productname", "currentstock", "mrp", "exp"],
        Collection::JanAushadhi => &["drugname", "drugcode", "mrp", "expirydate", "qty"],
    }
}

/// Normalized header → document field.
fn aliases(collection: Collection) -> &'static [(&'static str, &'static str)] {
    match collection {
        Collection::Products => &[
            ("productname", PRODUCT_NAME),
            ("name", PRODUCT_NAME),
            ("itemname", PRODUCT_NAME),
            ("productname_kn", PRODUCT_NAME_KN),
            ("productname_kan", PRODUCT_NAME_KN),
            ("currentstock", CURRENT_STOCK),
            ("stock", CURRENT_STOCK),
            ("qty", CURRENT_STOCK),
            ("mrp", MRP_DOTTED),
            ("rate", MRP_DOTTED),
            ("exp", EXP),
            ("expiry", EXP),
        ],
        Collection::JanAushadhi => &[
            ("drugname", DRUG_NAME),
            ("drugname_kn", DRUG_NAME_KN),
            ("drugname_kan", DRUG_NAME_KN),
            ("drugcode", DRUG_CODE),
            ("code", DRUG_CODE),
            ("mrp", MRP),
            ("expirydate", EXPIRY_DATE),
            ("exp", EXPIRY_DATE),
            ("expiry", EXPIRY_DATE),
            ("qty", QTY),
            ("quantity", QTY),
            ("stock", QTY),
            ("uom", UOM),
            ("batchno", BATCH_NO),
        ],
    }
}

// ============================================================================
// IMPORT
// ============================================================================

/// Outcome of one import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub documents: Vec<Document>,
    /// Zero-based row the header was taken from.
    pub header_row: usize,
    /// Data rows dropped because no document id could be derived.
    pub skipped: usize,
}

pub fn import_csv(path: &Path, collection: Collection) -> Result<ImportReport> {
    info!(path = %path.display(), %collection, "importing inventory export");
    let file = std::fs::File::open(path)?;
    import_reader(file, collection)
}

pub fn import_reader<R: Read>(reader: R, collection: Collection) -> Result<ImportReport> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let rows = rdr.records().collect::<std::result::Result<Vec<StringRecord>, _>>()?;

    let header_row = find_header_row(&rows, collection);
    let Some(header) = rows.get(header_row) else {
        warn!(%collection, "export is empty");
        return Ok(ImportReport {
            documents: Vec::new(),
            header_row,
            skipped: 0,
        });
    };

    let columns = map_columns(header, collection);
    debug!(%collection, header_row, ?columns, "columns mapped");

    let mut documents = Vec::new();
    let mut skipped = 0;

    for row in &rows[header_row + 1..] {
        let mut fields = Map::new();
        for (&target, &index) in &columns {
            let Some(raw) = row.get(index) else { continue };
            if let Some(value) = coerce_value(target, raw) {
                fields.insert(target.to_string(), value);
            }
        }

        match document_id(&fields, collection) {
            Some(id) => documents.push(Document::new(id, fields)),
            None => skipped += 1,
        }
    }

    info!(%collection, imported = documents.len(), skipped, "import finished");
    Ok(ImportReport {
        documents,
        header_row,
        skipped,
    })
}

/// Lower-case, drop spaces, dots and underscores. A trailing `_kn` / `_kan`
/// language suffix keeps its underscore.
pub fn normalize_header(header: &str) -> String {
    let lowered = header.trim().to_lowercase();
    let (stem, suffix) = ["_kn", "_kan"]
        .iter()
        .find_map(|s| lowered.strip_suffix(s).map(|stem| (stem, *s)))
        .unwrap_or((lowered.as_str(), ""));

    let mut normalized: String = stem
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '_'))
        .collect();
    normalized.push_str(suffix);
    normalized
}

/// First row within the scan window with enough header keywords; row 0
/// when none qualifies.
fn find_header_row(rows: &[StringRecord], collection: Collection) -> usize {
    let keywords = header_keywords(collection);
    rows.iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| {
            let joined: String = row
                .iter()
                .flat_map(|cell| cell.to_lowercase().chars().collect::<Vec<_>>())
                .filter(|c| !matches!(c, ' ' | '.'))
                .collect();
            keywords.iter().filter(|k| joined.contains(*k)).count() >= HEADER_MIN_MATCHES
        })
        .unwrap_or(0)
}

/// Document field → column index. Later columns win when two map to the
/// same field.
fn map_columns(header: &StringRecord, collection: Collection) -> BTreeMap<&'static str, usize> {
    let table = aliases(collection);
    let mut columns = BTreeMap::new();
    for (index, cell) in header.iter().enumerate() {
        let normalized = normalize_header(cell);
        if let Some((_, target)) = table.iter().find(|(alias, _)| *alias == normalized) {
            columns.insert(*target, index);
        }
    }
    columns
}

/// Typed payload value for one cell; blank cells are left out.
fn coerce_value(target: &str, raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let key = target.to_lowercase();
    let value = if key.contains("mrp") || key.contains("m.r.p.") {
        let price = trimmed.parse::<f64>().unwrap_or(0.0);
        Number::from_f64(price)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    } else if key.contains("qty") || key.contains("stock") {
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::String((n.trunc() as i64).to_string()),
            _ => Value::String(trimmed.to_string()),
        }
    } else if key.contains("exp") {
        Value::String(parse_import_date(trimmed))
    } else {
        Value::String(trimmed.to_string())
    };
    Some(value)
}

/// Rewrite a recognised date as `dd-MM-yy`; anything else is kept as-is.
pub fn parse_import_date(raw: &str) -> String {
    const DATE_FORMATS: [(&str, bool); 6] = [
        ("%d-%b-%y", false),
        ("%d-%m-%Y", true),
        ("%Y-%m-%d", true),
        ("%d/%m/%Y", true),
        ("%d%m%Y", true),
        ("%d%m%y", false),
    ];

    let s = raw.trim();
    for (fmt, four_digit_year) in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if four_digit_year && date.year() < 1000 {
                continue;
            }
            return date.format("%d-%m-%y").to_string();
        }
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return stamp.format("%d-%m-%y").to_string();
    }
    s.to_string()
}

fn document_id(fields: &Map<String, Value>, collection: Collection) -> Option<String> {
    let text = |key: &str| -> Option<String> {
        match fields.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    let from_name = |name: String| name.replace(['/', '\\'], "-").trim().to_string();

    let raw = match collection {
        Collection::Products => text(PRODUCT_NAME).map(from_name)?,
        Collection::JanAushadhi => text(DRUG_CODE).or_else(|| text(DRUG_NAME).map(from_name))?,
    };
    Some(sanitize_id(&raw))
}

/// Replace characters unsafe in a document id and cap the length.
/// Letters and digits of any script are kept.
pub fn sanitize_id(raw: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^\w\-. ]").expect("valid id pattern"));

    unsafe_chars
        .replace_all(raw, "_")
        .chars()
        .take(MAX_ID_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    const MARG_EXPORT: &str = "\
SHREE MEDICALS,,,,
Stock Report as on 01-05-2025,,,,
Product Name,Product Name_kn,Current Stock,M.R.P.,EXP
DOLO 650,ಡೋಲೊ 650,40,30.50,01-May-27
CROCIN 1/2,,12.0,18,2027-03-15
,,5,10,
";

    const PMBI_EXPORT: &str = "\
Drug Code,Drug Name,UOM,Batch No,MRP,Expiry Date,Qty
1042,Paracetamol 500mg,10's,B12,12.5,31/12/2026,150
,Cetirizine 10mg,10's,C7,abc,12-2026,
";

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Product Name "), "productname");
        assert_eq!(normalize_header("M.R.P."), "mrp");
        assert_eq!(normalize_header("Batch_No"), "batchno");
        assert_eq!(normalize_header("Product Name_kn"), "productname_kn");
        assert_eq!(normalize_header("Drug Name_KAN"), "drugname_kan");
    }

    #[test]
    fn test_products_import_skips_banner_rows() {
        let report = import_reader(MARG_EXPORT.as_bytes(), Collection::Products).unwrap();

        assert_eq!(report.header_row, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.documents.len(), 2);

        let dolo = &report.documents[0];
        assert_eq!(dolo.id, "DOLO 650");
        assert_eq!(
            Value::Object(dolo.fields.clone()),
            json!({
                "Product Name": "DOLO 650",
                "Product Name_kn": "ಡೋಲೊ 650",
                "Current Stock": "40",
                "M.R.P.": 30.5,
                "EXP": "01-05-27"
            })
        );

        let crocin = &report.documents[1];
        assert_eq!(crocin.id, "CROCIN 1-2");
        assert_eq!(crocin.fields.get("Current Stock"), Some(&json!("12")));
        assert_eq!(crocin.fields.get("EXP"), Some(&json!("15-03-27")));
        assert!(!crocin.fields.contains_key("Product Name_kn"));
    }

    #[test]
    fn test_jan_aushadhi_import() {
        let report = import_reader(PMBI_EXPORT.as_bytes(), Collection::JanAushadhi).unwrap();
        assert_eq!(report.header_row, 0);
        assert_eq!(report.documents.len(), 2);

        let first = &report.documents[0];
        assert_eq!(first.id, "1042");
        assert_eq!(first.fields.get("Drug Code"), Some(&json!("1042")));
        assert_eq!(first.fields.get("MRP"), Some(&json!(12.5)));
        assert_eq!(first.fields.get("Expiry Date"), Some(&json!("31-12-26")));
        assert_eq!(first.fields.get("Qty"), Some(&json!("150")));
        assert_eq!(first.fields.get("UOM"), Some(&json!("10's")));

        // no code: id falls back to the drug name, bad price becomes 0
        let second = &report.documents[1];
        assert_eq!(second.id, "Cetirizine 10mg");
        assert_eq!(second.fields.get("MRP"), Some(&json!(0.0)));
        assert_eq!(second.fields.get("Expiry Date"), Some(&json!("12-2026")));
        assert!(!second.fields.contains_key("Qty"));
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("Amoxy (500) #1"), "Amoxy _500_ _1");
        assert_eq!(sanitize_id("A-1.5 mg"), "A-1.5 mg");
        assert_eq!(sanitize_id(&"x".repeat(200)).len(), 150);
    }

    #[test]
    fn test_sanitize_id_keeps_kannada_names_distinct() {
        let dolo = sanitize_id("ಡೋಲೊ 650");
        let crocin = sanitize_id("ಕ್ರೋಸಿನ್");
        assert_eq!(dolo, "ಡೋಲೊ 650");
        assert_eq!(crocin, "ಕ್ರೋಸಿನ್");
        assert_ne!(dolo, crocin);
        assert_eq!(sanitize_id("Crème (x)"), "Crème _x_");
    }

    #[test]
    fn test_kannada_only_rows_do_not_collide() {
        let csv = "Product Name,Current Stock\nಡೋಲೊ,4\nಕ್ರೋಸಿನ್,6\n";
        let report = import_reader(csv.as_bytes(), Collection::Products).unwrap();
        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ಡೋಲೊ", "ಕ್ರೋಸಿನ್"]);
    }

    #[test]
    fn test_parse_import_date() {
        assert_eq!(parse_import_date("01-May-27"), "01-05-27");
        assert_eq!(parse_import_date("5/1/2027"), "05-01-27");
        assert_eq!(parse_import_date("2027-01-05 00:00:00"), "05-01-27");
        assert_eq!(parse_import_date("05012027"), "05-01-27");
        assert_eq!(parse_import_date("Nov-2025"), "Nov-2025");
    }

    #[test]
    fn test_header_falls_back_to_first_row() {
        let csv = "Item,Count\nA,1\n";
        let report = import_reader(csv.as_bytes(), Collection::Products).unwrap();
        assert_eq!(report.header_row, 0);
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_import_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PMBI_EXPORT.as_bytes()).unwrap();

        let report = import_csv(file.path(), Collection::JanAushadhi).unwrap();
        assert_eq!(report.documents.len(), 2);
    }
}
