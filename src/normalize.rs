// Field Normalizer
// Turns raw store values (price, stock, expiry) into display strings.
//
// None of these functions fail: a value that cannot be interpreted degrades
// to a sentinel ("-", the out-of-stock label) or is passed through verbatim.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::trace;

/// Placeholder shown when a field has no value.
pub const EMPTY_SENTINEL: &str = "-";

/// Glyphs stripped from price strings before parsing.
const CURRENCY_GLYPHS: [char; 4] = ['£', '₹', '$', '€'];

// ============================================================================
// RAW FIELD
// ============================================================================

/// RawField - A field value exactly as the store delivered it
///
/// Prices, stock counts and expiry dates arrive as numbers, strings or
/// timestamp objects depending on which export produced the document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum RawField {
    #[default]
    Absent,
    Number(f64),
    Text(String),
    Timestamp { seconds: i64, nanoseconds: u32 },
}

impl RawField {
    /// Build from an optional JSON payload value.
    ///
    /// `null` counts as absent. Objects carrying a numeric `seconds`
    /// (or `_seconds`, as emitted by admin exports) become timestamps.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawField::Absent,
            Some(Value::Number(n)) => n.as_f64().map(RawField::Number).unwrap_or_default(),
            Some(Value::String(s)) => RawField::Text(s.clone()),
            Some(Value::Bool(b)) => RawField::Text(b.to_string()),
            Some(obj @ Value::Object(map)) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(Value::as_f64);
                match seconds {
                    Some(seconds) => {
                        let nanoseconds = map
                            .get("nanoseconds")
                            .or_else(|| map.get("_nanoseconds"))
                            .and_then(Value::as_u64)
                            .unwrap_or(0);
                        RawField::Timestamp {
                            seconds: seconds as i64,
                            nanoseconds: nanoseconds.min(999_999_999) as u32,
                        }
                    }
                    None => RawField::Text(obj.to_string()),
                }
            }
            Some(other) => RawField::Text(other.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RawField::Absent)
    }

    /// String form of the value, `None` when absent.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawField::Absent => None,
            RawField::Number(n) => Some(n.to_string()),
            RawField::Text(s) => Some(s.clone()),
            RawField::Timestamp {
                seconds,
                nanoseconds,
            } => Some(format!(
                "{{seconds: {}, nanoseconds: {}}}",
                seconds, nanoseconds
            )),
        }
    }
}

impl From<&str> for RawField {
    fn from(s: &str) -> Self {
        RawField::Text(s.to_string())
    }
}

impl From<f64> for RawField {
    fn from(n: f64) -> Self {
        RawField::Number(n)
    }
}

// ============================================================================
// PRICE
// ============================================================================

/// Format a price as `Rs 0.00`.
///
/// Accepts numbers and strings like `"P1,234.50"`, `"Rs 12"` or `"£12"`. One
/// leading `P`/`p` or `Rs` is dropped, currency glyphs and thousands
/// separators are removed,
/// then the leading decimal number is read. Unparseable input comes back
/// unchanged.
pub fn normalize_price(raw: &RawField) -> String {
    let Some(text) = raw.as_text() else {
        return EMPTY_SENTINEL.to_string();
    };

    let stripped = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .unwrap_or(&text);
    let stripped = strip_rupee_prefix(stripped);

    let cleaned: String = stripped
        .chars()
        .filter(|c| *c != ',' && !CURRENCY_GLYPHS.contains(c))
        .collect();

    match parse_float_prefix(&cleaned) {
        Some(value) => format!("Rs {:.2}", value),
        None => {
            trace!(raw = %text, "price not numeric, passing through");
            text
        }
    }
}

/// `Rs`, `rs`, `RS` or `Rs.` at the start, as already-formatted prices carry.
fn strip_rupee_prefix(text: &str) -> &str {
    let mut chars = text.char_indices();
    match (chars.next(), chars.next()) {
        (Some((_, 'R' | 'r')), Some((i, 'S' | 's'))) => {
            let rest = &text[i + 1..];
            rest.strip_prefix('.').unwrap_or(rest).trim_start()
        }
        _ => text,
    }
}

// ============================================================================
// STOCK
// ============================================================================

/// Format a stock / quantity count.
///
/// Absent → `-`. Non-numeric strings and counts ≤ 0 → `out_of_stock`.
/// Otherwise the count with thousands grouping (`1,234`).
pub fn normalize_stock(raw: &RawField, out_of_stock: &str) -> String {
    let value = match raw {
        RawField::Absent => return EMPTY_SENTINEL.to_string(),
        RawField::Number(n) => *n,
        RawField::Text(s) => match parse_int_prefix(s) {
            Some(n) => n,
            None => return out_of_stock.to_string(),
        },
        RawField::Timestamp { .. } => return out_of_stock.to_string(),
    };

    if value <= 0.0 {
        return out_of_stock.to_string();
    }

    group_thousands(value)
}

/// `1234567.5` → `1,234,567.5` (at most three fraction digits).
fn group_thousands(value: f64) -> String {
    let formatted = format!("{:.3}", value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    if frac_part.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

// ============================================================================
// DATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    Day,
    Month,
}

#[derive(Debug, Clone, Copy)]
enum Token {
    /// `dd`: 1-2 digits
    Day,
    /// `MM`: 1-2 digits
    Month,
    /// `MMM`: English month abbreviation, any case
    MonthAbbr,
    /// `yyyy`: exactly 4 digits
    Year4,
    /// `yy`: 1-2 digits, century picked around the reference year
    Year2,
    Lit(char),
}

struct DateFormat {
    pattern: &'static str,
    tokens: &'static [Token],
    precision: Precision,
}

use Token::{Day, Lit, Month, MonthAbbr, Year2, Year4};

/// Known expiry formats. Order is the tie-break: first match wins.
const DATE_FORMATS: &[DateFormat] = &[
    DateFormat { pattern: "dd/MM/yyyy", tokens: &[Day, Lit('/'), Month, Lit('/'), Year4], precision: Precision::Day },
    DateFormat { pattern: "yyyy-MM-dd", tokens: &[Year4, Lit('-'), Month, Lit('-'), Day], precision: Precision::Day },
    DateFormat { pattern: "dd-MMM-yy", tokens: &[Day, Lit('-'), MonthAbbr, Lit('-'), Year2], precision: Precision::Day },
    DateFormat { pattern: "yyyy/MM/dd", tokens: &[Year4, Lit('/'), Month, Lit('/'), Day], precision: Precision::Day },
    DateFormat { pattern: "MM/yyyy", tokens: &[Month, Lit('/'), Year4], precision: Precision::Month },
    DateFormat { pattern: "MMM yyyy", tokens: &[MonthAbbr, Lit(' '), Year4], precision: Precision::Month },
    DateFormat { pattern: "MM-yyyy", tokens: &[Month, Lit('-'), Year4], precision: Precision::Month },
    DateFormat { pattern: "MMM-yyyy", tokens: &[MonthAbbr, Lit('-'), Year4], precision: Precision::Month },
    DateFormat { pattern: "MM.yy", tokens: &[Month, Lit('.'), Year2], precision: Precision::Month },
    DateFormat { pattern: "MMM-yy", tokens: &[MonthAbbr, Lit('-'), Year2], precision: Precision::Month },
];

const MMM_YY: &[Token] = &[MonthAbbr, Lit('-'), Year2];
const MMM_YYYY: &[Token] = &[MonthAbbr, Lit(' '), Year4];

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Single-letter month fallback, first letter wins (`j` → Jan, `m` → Mar).
const MONTH_INITIALS: [char; 12] = ['j', 'f', 'm', 'a', 'm', 'j', 'j', 'a', 's', 'o', 'n', 'd'];

fn month_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z]{3,})[-.\s]?([0-9]{4}|[0-9]{2})").expect("month/year pattern is valid")
    })
}

/// Format an expiry value for display, resolving two-digit years
/// against today's date.
pub fn normalize_date(raw: &RawField) -> String {
    normalize_date_at(raw, Utc::now().date_naive())
}

/// Format an expiry value for display.
///
/// Timestamps and epoch seconds render as `dd Mon yyyy` (UTC). Strings are
/// matched against [`DATE_FORMATS`]; day-precision matches render as
/// `dd Mon yyyy`, month-precision ones as `Mon yyyy`. `"Expired"` and
/// anything unrecognised are returned verbatim.
pub fn normalize_date_at(raw: &RawField, reference: NaiveDate) -> String {
    match raw {
        RawField::Absent => EMPTY_SENTINEL.to_string(),
        RawField::Number(n) if *n == 0.0 => EMPTY_SENTINEL.to_string(),
        RawField::Text(s) if s.is_empty() => EMPTY_SENTINEL.to_string(),
        RawField::Timestamp {
            seconds,
            nanoseconds,
        } => match DateTime::from_timestamp(*seconds, *nanoseconds) {
            Some(dt) => format_day(dt.date_naive()),
            None => raw.as_text().unwrap_or_default(),
        },
        RawField::Number(n) => match DateTime::from_timestamp_millis((n * 1000.0) as i64) {
            Some(dt) => format_day(dt.date_naive()),
            None => n.to_string(),
        },
        RawField::Text(s) => normalize_date_text(s, reference.year()),
    }
}

fn normalize_date_text(text: &str, reference_year: i32) -> String {
    if text.eq_ignore_ascii_case("expired") {
        return text.to_string();
    }

    for format in DATE_FORMATS {
        if let Some(date) = parse_with(text, format.tokens, reference_year) {
            trace!(raw = text, format = format.pattern, "expiry matched");
            return match format.precision {
                Precision::Day => format_day(date),
                Precision::Month => format_month(date),
            };
        }
    }

    // Embedded month/year such as "Exp Nov 25"
    if let Some(caps) = month_year_regex().captures(text) {
        let month = &caps[1];
        let year = &caps[2];
        let dashed = format!("{}-{}", month, year);
        let spaced = format!("{} {}", month, year);
        if let Some(date) = parse_with(&dashed, MMM_YY, reference_year)
            .or_else(|| parse_with(&spaced, MMM_YYYY, reference_year))
        {
            return format_month(date);
        }
    }

    trace!(raw = text, "expiry not recognised, passing through");
    text.to_string()
}

fn format_day(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

fn format_month(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Match `input` against a token sequence. Trailing whitespace is allowed,
/// anything else left over is a mismatch. A missing day means the 1st.
fn parse_with(input: &str, tokens: &[Token], reference_year: i32) -> Option<NaiveDate> {
    let mut rest = input;
    let mut year = None;
    let mut month = None;
    let mut day = None;

    for token in tokens {
        match *token {
            Token::Day => {
                let (value, r) = take_digits(rest, 2)?;
                day = Some(value);
                rest = r;
            }
            Token::Month => {
                let (value, r) = take_digits(rest, 2)?;
                month = Some(value);
                rest = r;
            }
            Token::MonthAbbr => {
                let (value, r) = take_month_abbr(rest)?;
                month = Some(value);
                rest = r;
            }
            Token::Year4 => {
                let (value, r) = take_digits(rest, 4)?;
                if rest.len() - r.len() != 4 || value == 0 {
                    return None;
                }
                year = Some(value as i32);
                rest = r;
            }
            Token::Year2 => {
                let (value, r) = take_digits(rest, 2)?;
                year = Some(resolve_two_digit_year(value as i32, reference_year));
                rest = r;
            }
            Token::Lit(c) => {
                rest = rest.strip_prefix(c)?;
            }
        }
    }

    if !rest.trim().is_empty() {
        return None;
    }

    let month = month?;
    if !(1..=12).contains(&month) {
        return None;
    }
    NaiveDate::from_ymd_opt(year?, month, day.unwrap_or(1))
}

fn take_digits(input: &str, max: usize) -> Option<(u32, &str)> {
    let len = input
        .bytes()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len == 0 {
        return None;
    }
    let value = input[..len].parse().ok()?;
    Some((value, &input[len..]))
}

fn take_month_abbr(input: &str) -> Option<(u32, &str)> {
    if let Some(prefix) = input.get(..3) {
        if let Some(idx) = MONTH_ABBREVIATIONS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(prefix))
        {
            return Some((idx as u32 + 1, &input[3..]));
        }
    }

    let first = input.chars().next()?.to_ascii_lowercase();
    let idx = MONTH_INITIALS.iter().position(|c| *c == first)?;
    Some((idx as u32 + 1, &input[1..]))
}

/// Two-digit years land within 50 years of the reference year.
fn resolve_two_digit_year(two_digit: i32, reference_year: i32) -> i32 {
    let range_end = reference_year + 50;
    let range_end_century = (range_end / 100) * 100;
    if two_digit >= range_end % 100 {
        two_digit + range_end_century - 100
    } else {
        two_digit + range_end_century
    }
}

// ============================================================================
// NUMBER PREFIX PARSING
// ============================================================================

/// Leading decimal number of `s`, ignoring whatever follows it
/// (`"12.5 tabs"` → 12.5). Leading whitespace is skipped.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leading integer of `s` (`"12 strips"` → 12).
fn parse_int_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let (sign, body) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let len = body.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    body[..len].parse::<f64>().ok().map(|v| sign * v)
}
