use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// Outcome of reading a numeric cell. Unlike [`parse_amount`], a failure is kept
/// apart from a genuine zero.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAmount {
    Parsed(f64),
    Unparseable(String),
}

impl ParsedAmount {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Parsed(v) => Some(*v),
            Self::Unparseable(_) => None,
        }
    }
}

pub fn parse_amount_checked(raw: &str) -> ParsedAmount {
    let trimmed = raw.trim();
    let mut negative = false;
    let mut body: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '(' | ')'))
        .collect();

    if let Some(inner) = body.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        body = inner.to_string();
    }
    if let Some(inner) = body.strip_suffix('-') {
        negative = !negative;
        body = inner.to_string();
    }
    if let Some(inner) = body.strip_prefix('-') {
        negative = !negative;
        body = inner.to_string();
    }
    if body.is_empty() || !body.chars().any(|c| c.is_ascii_digit()) {
        return ParsedAmount::Unparseable(raw.to_string());
    }

    let commas = body.matches(',').count();
    let dots = body.matches('.').count();
    let canonical = match (body.rfind(','), body.rfind('.')) {
        (Some(c), Some(d)) if c > d => body.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => body.replace(',', ""),
        (Some(_), None) if commas == 1 => body.replace(',', "."),
        (Some(_), None) => body.replace(',', ""),
        (None, Some(_)) if dots > 1 => body.replace('.', ""),
        _ => body,
    };

    match canonical.parse::<f64>() {
        Ok(v) if negative => ParsedAmount::Parsed(-v),
        Ok(v) => ParsedAmount::Parsed(v),
        Err(_) => ParsedAmount::Unparseable(raw.to_string()),
    }
}

/// Lenient variant: anything unreadable becomes `0.0`.
#[allow(dead_code)]
pub fn parse_amount(raw: &str) -> f64 {
    parse_amount_checked(raw).value().unwrap_or(0.0)
}

const TEXTUAL_FORMATS: &[&str] = &["%d %b %Y", "%d-%b-%Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y"];

fn numeric_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,4})[/.\-](\d{1,2})[/.\-](\d{1,4})$").unwrap())
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(year),
        2 if year < 70 => Some(2000 + year),
        2 => Some(1900 + year),
        _ => None,
    }
}

/// `DD/MM/YYYY` first, `MM/DD/YYYY` only when the day-first reading is impossible.
fn parse_numeric_date(raw: &str) -> Option<NaiveDate> {
    let caps = numeric_date_re().captures(raw)?;
    let (a, b, c) = (&caps[1], &caps[2], &caps[3]);
    if a.len() == 4 {
        return NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?);
    }
    let year = expand_year(c)?;
    let first: u32 = a.parse().ok()?;
    let second: u32 = b.parse().ok()?;
    NaiveDate::from_ymd_opt(year, second, first).or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // Spreadsheet exports often carry a time component; only the date matters.
    let head = match raw.split_once(|c| c == 'T' || c == ' ') {
        Some((date, rest)) if rest.contains(':') => date,
        _ => raw,
    };

    if let Some(date) = parse_numeric_date(head) {
        return Some(date);
    }
    if head.len() == 8 && head.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(head, "%Y%m%d").ok();
    }
    for fmt in TEXTUAL_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    if let Ok(serial) = head.parse::<f64>() {
        if (20_000.0..80_000.0).contains(&serial) {
            return excel_serial_to_date(serial);
        }
    }
    None
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}

/// Lowercase and strip Latin diacritics so "Descripción" and "DESCRIPCION" compare equal.
pub fn fold_text(raw: &str) -> String {
    raw.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
