// src/jquants/models.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::ApiError;

/// Raw monetary figures arrive in yen; everything downstream works in millions.
pub const MILLION: f64 = 1_000_000.0;

/// Response of `POST /token/auth_user`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserResponse {
    pub refresh_token: Option<String>,
}

/// Response of `POST /token/auth_refresh`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRefreshResponse {
    pub id_token: Option<String>,
}

/// Response of `GET /listed/info`
#[derive(Debug, Deserialize)]
pub struct ListedInfoResponse {
    pub info: Vec<ListedCompany>,
    #[serde(default)]
    pub pagination_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ListedCompany {
    pub code: String,
    pub company_name: String,
    #[serde(default)]
    pub company_name_english: Option<String>,
    #[serde(default)]
    pub sector17_code_name: Option<String>,
    #[serde(default)]
    pub sector33_code_name: Option<String>,
    #[serde(default)]
    pub market_code_name: Option<String>,
}

/// Response of `GET /fins/statements`
#[derive(Debug, Deserialize)]
pub struct StatementsResponse {
    pub statements: Vec<StatementRow>,
    #[serde(default)]
    pub pagination_key: Option<String>,
}

/// One financial statement as J-Quants sends it. Numbers come as strings,
/// often empty, so they are kept as raw JSON until `DisclosureRecord::from_row`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatementRow {
    #[serde(default)]
    pub disclosed_date: Option<String>,
    #[serde(default)]
    pub local_code: Option<String>,
    #[serde(default)]
    pub type_of_current_period: Option<String>,
    #[serde(default)]
    pub current_fiscal_year_end_date: Option<String>,
    #[serde(default)]
    pub net_sales: Value,
    #[serde(default)]
    pub operating_profit: Value,
    #[serde(default)]
    pub total_assets: Value,
    #[serde(default)]
    pub equity: Value,
}

/// Response of `GET /prices/daily_quotes`
#[derive(Debug, Deserialize)]
pub struct DailyQuotesResponse {
    pub daily_quotes: Vec<DailyQuote>,
    #[serde(default)]
    pub pagination_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DailyQuote {
    pub date: NaiveDate,
    pub code: String,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub turnover_value: Option<f64>,
    #[serde(default)]
    pub adjustment_factor: Option<f64>,
    #[serde(default)]
    pub adjustment_close: Option<f64>,
}

/// Classification of a filing by the span it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeriodType {
    FirstQuarter,
    SecondQuarter,
    ThirdQuarter,
    FullYear,
    /// Anything J-Quants sends that is not one of the above; never matches a quarter.
    Other(String),
}

impl PeriodType {
    /// Parses `TypeOfCurrentPeriod` ("1Q", "2Q", "3Q", "FY", "通期", also "1Quarter" style).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.replace("Quarter", "Q").as_str() {
            "1Q" => Self::FirstQuarter,
            "2Q" => Self::SecondQuarter,
            "3Q" => Self::ThirdQuarter,
            "FY" | "通期" => Self::FullYear,
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

/// A filed statement after the one validated parsing step.
/// Monetary fields are cumulative since fiscal-year start, in millions.
#[derive(Debug, Clone, PartialEq)]
pub struct DisclosureRecord {
    pub fiscal_year_end: NaiveDate,
    /// Absent when J-Quants sent a blank or unreadable date.
    pub disclosed_date: Option<NaiveDate>,
    pub period_type: PeriodType,
    pub net_sales: Option<f64>,
    pub operating_profit: Option<f64>,
    pub total_assets: Option<f64>,
    pub equity: Option<f64>,
}

impl DisclosureRecord {
    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_year_end.year()
    }

    /// Returns `None` when `DisclosedDate` is missing or null, or when the
    /// fiscal-year end cannot be read; such rows cannot be placed on the fiscal
    /// calendar. A present but unreadable disclosed date becomes `None`.
    pub fn from_row(row: &StatementRow) -> Option<Self> {
        let disclosed_date = parse_date(row.disclosed_date.as_deref()?);
        let fiscal_year_end = row.current_fiscal_year_end_date.as_deref().and_then(parse_date)?;
        let period_type = PeriodType::parse(row.type_of_current_period.as_deref().unwrap_or_default());

        Some(Self {
            fiscal_year_end,
            disclosed_date,
            period_type,
            net_sales: parse_amount(&row.net_sales).map(|v| v / MILLION),
            operating_profit: parse_amount(&row.operating_profit).map(|v| v / MILLION),
            total_assets: parse_amount(&row.total_assets).map(|v| v / MILLION),
            equity: parse_amount(&row.equity).map(|v| v / MILLION),
        })
    }
}

/// Converts raw rows, dropping (and logging) rows that cannot be placed on the calendar.
pub fn to_records(rows: &[StatementRow]) -> Vec<DisclosureRecord> {
    rows.iter()
        .filter_map(|row| {
            let record = DisclosureRecord::from_row(row);
            if record.is_none() {
                tracing::debug!(
                    "Skipping statement without usable dates: code={:?}, disclosed={:?}, fiscal_year_end={:?}",
                    row.local_code,
                    row.disclosed_date,
                    row.current_fiscal_year_end_date
                );
            }
            record
        })
        .collect()
}

/// Parses a saved statements payload: either the API response object or a bare array.
pub fn parse_statements_json(text: &str) -> Result<Vec<StatementRow>, ApiError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ApiError::Parse(format!("statements payload is not valid JSON: {}", e)))?;

    let rows = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("statements").ok_or_else(|| {
            ApiError::Parse("statements payload object has no `statements` field".to_string())
        })?,
        other => {
            return Err(ApiError::Parse(format!(
                "statements payload must be an array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    if !rows.is_array() {
        return Err(ApiError::Parse(format!(
            "`statements` must be an array, got {}",
            json_kind(&rows)
        )));
    }

    serde_json::from_value(rows)
        .map_err(|e| ApiError::Parse(format!("malformed statement record: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accepts "2024-03-31" and the compact "20240331".
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

/// Numeric field that may be a JSON number, a numeric string, or junk.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> StatementRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_period_type_parsing() {
        assert_eq!(PeriodType::parse("1Q"), PeriodType::FirstQuarter);
        assert_eq!(PeriodType::parse("2Quarter"), PeriodType::SecondQuarter);
        assert_eq!(PeriodType::parse(" 3Q "), PeriodType::ThirdQuarter);
        assert_eq!(PeriodType::parse("FY"), PeriodType::FullYear);
        assert_eq!(PeriodType::parse("通期"), PeriodType::FullYear);
        assert_eq!(PeriodType::parse("5Q"), PeriodType::Other("5Q".to_string()));
        assert_eq!(PeriodType::parse(""), PeriodType::Other(String::new()));
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount(&json!("1500000")), Some(1_500_000.0));
        assert_eq!(parse_amount(&json!(" 42 ")), Some(42.0));
        assert_eq!(parse_amount(&json!(-7)), Some(-7.0));
        assert_eq!(parse_amount(&json!("")), None);
        assert_eq!(parse_amount(&json!("n/a")), None);
        assert_eq!(parse_amount(&json!("NaN")), None);
        assert_eq!(parse_amount(&Value::Null), None);
    }

    #[test]
    fn test_record_from_row_scales_to_millions() {
        let r = row(json!({
            "DisclosedDate": "2024-05-08",
            "LocalCode": "72030",
            "TypeOfCurrentPeriod": "FY",
            "CurrentFiscalYearEndDate": "2024-03-31",
            "NetSales": "45095325000000",
            "OperatingProfit": "5352934000000",
            "TotalAssets": "",
            "Equity": "35239338000000",
            "SomethingElse": "ignored"
        }));
        let record = DisclosureRecord::from_row(&r).unwrap();
        assert_eq!(record.fiscal_year(), 2024);
        assert_eq!(record.period_type, PeriodType::FullYear);
        assert_eq!(record.net_sales, Some(45_095_325.0));
        assert_eq!(record.operating_profit, Some(5_352_934.0));
        assert_eq!(record.total_assets, None);
        assert_eq!(record.equity, Some(35_239_338.0));
    }

    #[test]
    fn test_rows_without_dates_are_dropped() {
        let rows = vec![
            row(json!({"DisclosedDate": null, "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "1Q"})),
            row(json!({"DisclosedDate": "2023-08-01", "CurrentFiscalYearEndDate": "bogus", "TypeOfCurrentPeriod": "1Q"})),
            row(json!({"DisclosedDate": "20230801", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "1Q"})),
        ];
        let records = to_records(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].disclosed_date, NaiveDate::from_ymd_opt(2023, 8, 1));
    }

    #[test]
    fn test_unreadable_disclosed_date_keeps_the_row() {
        let rows = vec![
            row(json!({"DisclosedDate": "", "CurrentFiscalYearEndDate": "2024-03-31", "TypeOfCurrentPeriod": "1Q", "NetSales": "100000000"})),
            row(json!({"DisclosedDate": "soon", "CurrentFiscalYearEndDate": "2025-03-31", "TypeOfCurrentPeriod": "FY"})),
            row(json!({"CurrentFiscalYearEndDate": "2026-03-31", "TypeOfCurrentPeriod": "1Q"})),
        ];
        let records = to_records(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].disclosed_date, None);
        assert_eq!(records[0].fiscal_year(), 2024);
        assert_eq!(records[0].net_sales, Some(100.0));
        assert_eq!(records[1].disclosed_date, None);
        assert_eq!(records[1].period_type, PeriodType::FullYear);
    }

    #[test]
    fn test_parse_statements_json_shapes() {
        let wrapped = r#"{"statements": [{"DisclosedDate": "2023-08-01"}]}"#;
        assert_eq!(parse_statements_json(wrapped).unwrap().len(), 1);

        let bare = r#"[{"DisclosedDate": "2023-08-01"}, {}]"#;
        assert_eq!(parse_statements_json(bare).unwrap().len(), 2);

        let empty = r#"{"statements": []}"#;
        assert!(parse_statements_json(empty).unwrap().is_empty());
    }

    #[test]
    fn test_parse_statements_json_rejects_malformed_input() {
        for bad in [r#""hello""#, r#"{"info": []}"#, r#"{"statements": 3}"#, "[1, 2]", "not json"] {
            let err = parse_statements_json(bad).unwrap_err();
            assert!(matches!(err, ApiError::Parse(_)), "expected parse error for {}", bad);
        }
    }

    #[test]
    fn test_daily_quote_with_nulls() {
        let quote: DailyQuote = serde_json::from_value(json!({
            "Date": "2023-12-29",
            "Code": "72030",
            "Open": 2600.0,
            "High": null,
            "Close": 2594.5,
            "Volume": 10000
        }))
        .unwrap();
        assert_eq!(quote.date, NaiveDate::from_ymd_opt(2023, 12, 29).unwrap());
        assert_eq!(quote.high, None);
        assert_eq!(quote.low, None);
        assert_eq!(quote.close, Some(2594.5));
        assert_eq!(quote.volume, Some(10000.0));
    }
}
