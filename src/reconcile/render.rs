// src/reconcile/render.rs
use std::fmt::Write;

use crate::reconcile::period::{AnnualRow, QuarterSlot};

const QUARTER_HEADER: [&str; 7] = [
    "PeriodLabel",
    "NetSales_single",
    "OperatingProfit_single",
    "TotalAssets",
    "Equity",
    "OperatingMargin(%)",
    "EquityRatio(%)",
];

const ANNUAL_HEADER: [&str; 8] = [
    "PeriodLabel",
    "DisclosedDate",
    "NetSales",
    "OperatingProfit",
    "OperatingMargin(%)",
    "TotalAssets",
    "Equity",
    "EquityRatio(%)",
];

// Shortest round-trip formatting keeps the table lossless.
fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn table(header: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(header.len()));
    for row in rows {
        let _ = writeln!(out, "| {} |", row.join(" | "));
    }
    out
}

/// Markdown table of the reconciled quarters, one row per slot.
pub fn render_quarters(slots: &[QuarterSlot]) -> String {
    table(
        &QUARTER_HEADER,
        slots.iter().map(|s| {
            vec![
                s.period_label.clone(),
                cell(s.single.net_sales),
                cell(s.single.operating_profit),
                cell(s.cumulative.total_assets),
                cell(s.cumulative.equity),
                cell(s.operating_margin_pct),
                cell(s.equity_ratio_pct),
            ]
        }),
    )
}

/// Markdown table of the full-year statements.
pub fn render_annual(rows: &[AnnualRow]) -> String {
    table(
        &ANNUAL_HEADER,
        rows.iter().map(|r| {
            vec![
                r.period_label.clone(),
                r.disclosed_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
                cell(r.figures.net_sales),
                cell(r.figures.operating_profit),
                cell(r.operating_margin_pct),
                cell(r.figures.total_assets),
                cell(r.figures.equity),
                cell(r.equity_ratio_pct),
            ]
        }),
    )
}
