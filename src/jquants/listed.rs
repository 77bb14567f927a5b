// src/jquants/listed.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::jquants::models::ListedCompany;

// A 4-digit query is a display code; J-Quants stores the 5-digit form with a trailing check digit.
static DISPLAY_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}$").expect("Failed to compile DISPLAY_CODE_RE")
});

static FIVE_DIGIT_ZERO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})0$").expect("Failed to compile FIVE_DIGIT_ZERO_RE")
});

/// Shows a J-Quants code the way investors know it: "72030" becomes "7203".
/// Codes that are not a zero-terminated 5-digit number are left in integer form.
pub fn display_code(code: &str) -> String {
    let trimmed = code.trim();
    let normalized = match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value >= 0.0 => {
            format!("{}", value as u64)
        }
        _ => return trimmed.to_string(),
    };

    match FIVE_DIGIT_ZERO_RE.captures(&normalized) {
        Some(caps) => caps[1].to_string(),
        None => normalized,
    }
}

/// Label used when listing candidates, e.g. "トヨタ自動車（7203）".
pub fn choice_label(company: &ListedCompany) -> String {
    format!("{}（{}）", company.company_name, display_code(&company.code))
}

/// The 5-digit J-Quants code a 4-digit query stands for, if it is one.
pub fn code_for_query(query: &str) -> Option<String> {
    let query = query.trim();
    DISPLAY_CODE_RE.is_match(query).then(|| format!("{}0", query))
}

/// 4-digit query: exact match on `query * 10`.
/// Anything else: substring of the company name or of the raw code.
pub fn search<'a>(companies: &'a [ListedCompany], query: &str) -> Vec<&'a ListedCompany> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    if let Some(five_digit) = code_for_query(query) {
        return companies.iter().filter(|c| c.code.trim() == five_digit).collect();
    }

    companies
        .iter()
        .filter(|c| c.company_name.contains(query) || c.code.contains(query))
        .collect()
}
