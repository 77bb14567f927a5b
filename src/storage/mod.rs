// src/storage/mod.rs
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::edinet::models::EdinetDocument;
use crate::jquants::models::DailyQuote;
use crate::reconcile::period::{AnnualRow, QuarterSlot};
use crate::utils::error::StorageError;

/// Flat CSV shape of a `QuarterSlot`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QuarterCsvRow<'a> {
    period_label: &'a str,
    disclosed_date: Option<NaiveDate>,
    net_sales: Option<f64>,
    net_sales_single: Option<f64>,
    operating_profit: Option<f64>,
    operating_profit_single: Option<f64>,
    total_assets: Option<f64>,
    total_assets_single: Option<f64>,
    equity: Option<f64>,
    equity_single: Option<f64>,
    operating_margin_pct: Option<f64>,
    equity_ratio_pct: Option<f64>,
}

impl<'a> From<&'a QuarterSlot> for QuarterCsvRow<'a> {
    fn from(slot: &'a QuarterSlot) -> Self {
        Self {
            period_label: &slot.period_label,
            disclosed_date: slot.disclosed_date,
            net_sales: slot.cumulative.net_sales,
            net_sales_single: slot.single.net_sales,
            operating_profit: slot.cumulative.operating_profit,
            operating_profit_single: slot.single.operating_profit,
            total_assets: slot.cumulative.total_assets,
            total_assets_single: slot.single.total_assets,
            equity: slot.cumulative.equity,
            equity_single: slot.single.equity,
            operating_margin_pct: slot.operating_margin_pct,
            equity_ratio_pct: slot.equity_ratio_pct,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AnnualCsvRow<'a> {
    period_label: &'a str,
    disclosed_date: Option<NaiveDate>,
    net_sales: Option<f64>,
    operating_profit: Option<f64>,
    total_assets: Option<f64>,
    equity: Option<f64>,
    operating_margin_pct: Option<f64>,
    equity_ratio_pct: Option<f64>,
}

impl<'a> From<&'a AnnualRow> for AnnualCsvRow<'a> {
    fn from(row: &'a AnnualRow) -> Self {
        Self {
            period_label: &row.period_label,
            disclosed_date: row.disclosed_date,
            net_sales: row.figures.net_sales,
            operating_profit: row.figures.operating_profit,
            total_assets: row.figures.total_assets,
            equity: row.figures.equity,
            operating_margin_pct: row.operating_margin_pct,
            equity_ratio_pct: row.equity_ratio_pct,
        }
    }
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// `base_dir/<sub>/`, created on demand.
    fn target_dir(&self, sub: &str) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(sub);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }

    fn write_csv<T, I>(&self, file_path: PathBuf, rows: I) -> Result<PathBuf, StorageError>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut writer = csv::Writer::from_path(&file_path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(StorageError::IoError)?;

        tracing::info!("Saved CSV to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves the reconciled quarters as `<CODE>/quarters.csv`
    pub fn save_quarters(&self, code: &str, slots: &[QuarterSlot]) -> Result<PathBuf, StorageError> {
        let file_path = self.target_dir(&code.to_uppercase())?.join("quarters.csv");
        self.write_csv(file_path, slots.iter().map(QuarterCsvRow::from))
    }

    /// Saves the full-year series as `<CODE>/annual.csv`
    pub fn save_annual(&self, code: &str, rows: &[AnnualRow]) -> Result<PathBuf, StorageError> {
        let file_path = self.target_dir(&code.to_uppercase())?.join("annual.csv");
        self.write_csv(file_path, rows.iter().map(AnnualCsvRow::from))
    }

    /// Saves metadata about the reconciled window in JSON format
    pub fn save_quarters_metadata(
        &self,
        code: &str,
        company_name: &str,
        window: &[QuarterSlot],
        total_slots: usize,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self
            .target_dir(&code.to_uppercase())?
            .join("quarters_meta.json");

        let metadata = serde_json::json!({
            "code": code,
            "company_name": company_name,
            "window_start": window.first().map(|s| s.period_label.as_str()),
            "window_end": window.last().map(|s| s.period_label.as_str()),
            "window_slots": window.len(),
            "total_slots": total_slots,
            "unit": "million JPY",
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves the generated narrative as `<CODE>/insight.md`
    pub fn save_insight(&self, code: &str, text: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.target_dir(&code.to_uppercase())?.join("insight.md");
        fs::write(&file_path, text).map_err(StorageError::IoError)?;
        tracing::info!("Saved insight to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves quotes as `quotes/daily_quotes_<key>.csv`; nothing is written for an empty set.
    pub fn save_daily_quotes(
        &self,
        key: &str,
        quotes: &[DailyQuote],
    ) -> Result<Option<PathBuf>, StorageError> {
        if quotes.is_empty() {
            return Ok(None);
        }
        let file_path = self
            .target_dir("quotes")?
            .join(format!("daily_quotes_{}.csv", key));
        self.write_csv(file_path, quotes).map(Some)
    }

    /// Saves an EDINET document list as `edinet/documents_<date>.csv`
    pub fn save_documents(
        &self,
        date: NaiveDate,
        documents: &[EdinetDocument],
    ) -> Result<PathBuf, StorageError> {
        let file_path = self
            .target_dir("edinet")?
            .join(format!("documents_{}.csv", date.format("%Y-%m-%d")));
        self.write_csv(file_path, documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jquants::models::{DisclosureRecord, PeriodType};
    use crate::reconcile::period::{annual_series, reconcile};

    fn records() -> Vec<DisclosureRecord> {
        let fy_end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        vec![
            DisclosureRecord {
                fiscal_year_end: fy_end,
                disclosed_date: NaiveDate::from_ymd_opt(2023, 8, 1),
                period_type: PeriodType::FirstQuarter,
                net_sales: Some(100.0),
                operating_profit: Some(10.0),
                total_assets: Some(1000.0),
                equity: Some(400.0),
            },
            DisclosureRecord {
                fiscal_year_end: fy_end,
                disclosed_date: NaiveDate::from_ymd_opt(2024, 5, 8),
                period_type: PeriodType::FullYear,
                net_sales: Some(460.0),
                operating_profit: None,
                total_assets: Some(1200.0),
                equity: Some(500.0),
            },
        ]
    }

    #[test]
    fn test_save_quarters_csv() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("out")).unwrap();
        let slots = reconcile(&records());

        let path = storage.save_quarters("72030", &slots).unwrap();
        assert_eq!(path, dir.path().join("out").join("72030").join("quarters.csv"));

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "PeriodLabel,DisclosedDate,NetSales,NetSalesSingle,OperatingProfit,OperatingProfitSingle,\
             TotalAssets,TotalAssetsSingle,Equity,EquitySingle,OperatingMarginPct,EquityRatioPct"
        );
        assert_eq!(lines[1], "2024/1Q,2023-08-01,100.0,100.0,10.0,10.0,1000.0,1000.0,400.0,400.0,10.0,40.0");
        assert_eq!(lines[2], "2024/2Q,,,,,,,,,,,");
        // No 3Q filing, so the FY statement cannot stand in for 4Q.
        assert_eq!(lines[4], "2024/4Q,,,,,,,,,,,");
    }

    #[test]
    fn test_save_annual_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let recs = records();
        let slots = reconcile(&recs);

        let annual = storage.save_annual("72030", &annual_series(&recs)).unwrap();
        let text = fs::read_to_string(annual).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("2024/FY,2024-05-08,460.0,,1200.0,500.0,,"));

        let meta = storage
            .save_quarters_metadata("72030", "トヨタ自動車", &slots[..1], slots.len())
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(meta).unwrap()).unwrap();
        assert_eq!(json["window_start"], "2024/1Q");
        assert_eq!(json["window_end"], "2024/1Q");
        assert_eq!(json["total_slots"], 4);
        assert_eq!(json["company_name"], "トヨタ自動車");
    }

    #[test]
    fn test_empty_quotes_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        assert!(storage.save_daily_quotes("2023-12-29", &[]).unwrap().is_none());
        assert!(!dir.path().join("quotes").exists());

        let quote = DailyQuote {
            date: NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
            code: "72030".to_string(),
            open: Some(2600.0),
            high: None,
            low: None,
            close: Some(2594.5),
            volume: Some(100.0),
            turnover_value: None,
            adjustment_factor: Some(1.0),
            adjustment_close: None,
        };
        let path = storage.save_daily_quotes("2023-12-29", &[quote]).unwrap().unwrap();
        assert!(path.ends_with("quotes/daily_quotes_2023-12-29.csv"));
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(1), Some("2023-12-29,72030,2600.0,,,2594.5,100.0,,1.0,"));
    }

    #[test]
    fn test_save_documents_and_insight() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();
        let doc = EdinetDocument {
            doc_id: "S100R0Y1".to_string(),
            edinet_code: Some("E02144".to_string()),
            sec_code: Some("72030".to_string()),
            filer_name: Some("トヨタ自動車株式会社".to_string()),
            doc_description: None,
            submit_date_time: None,
        };
        let path = storage
            .save_documents(NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(), &[doc])
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("docID,edinetCode,secCode,filerName,docDescription,submitDateTime\n"));

        let path = storage.save_insight("72030", "# Summary\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "# Summary\n");
    }
}
