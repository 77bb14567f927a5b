// src/reconcile/period.rs

//! Turns cumulative year-to-date disclosures into a gap-filled series of
//! fiscal quarters with single-quarter figures and ratios.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;

use crate::jquants::models::{DailyQuote, DisclosureRecord, PeriodType};
use crate::utils::error::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "1Q",
            Quarter::Q2 => "2Q",
            Quarter::Q3 => "3Q",
            Quarter::Q4 => "4Q",
        }
    }

    /// The filing that carries this quarter's cumulative figures.
    /// There is no discrete 4Q filing; the full-year statement stands in for it.
    pub fn source_period(self) -> PeriodType {
        match self {
            Quarter::Q1 => PeriodType::FirstQuarter,
            Quarter::Q2 => PeriodType::SecondQuarter,
            Quarter::Q3 => PeriodType::ThirdQuarter,
            Quarter::Q4 => PeriodType::FullYear,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four figures tracked per period, in millions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Figures {
    pub net_sales: Option<f64>,
    pub operating_profit: Option<f64>,
    pub total_assets: Option<f64>,
    pub equity: Option<f64>,
}

impl Figures {
    fn of(record: &DisclosureRecord) -> Self {
        Self {
            net_sales: record.net_sales,
            operating_profit: record.operating_profit,
            total_assets: record.total_assets,
            equity: record.equity,
        }
    }

    /// Within-quarter contribution given the previous quarter's cumulative figures.
    fn delta_from(&self, previous: &Figures) -> Self {
        Self {
            // Cumulative sales can only grow within a year; a drop means restated data.
            net_sales: match (self.net_sales, previous.net_sales) {
                (Some(current), Some(prior)) if prior <= current => Some(current - prior),
                _ => None,
            },
            operating_profit: difference(self.operating_profit, previous.operating_profit),
            total_assets: difference(self.total_assets, previous.total_assets),
            equity: difference(self.equity, previous.equity),
        }
    }
}

fn difference(current: Option<f64>, prior: Option<f64>) -> Option<f64> {
    Some(current? - prior?)
}

/// `numerator / denominator` as a percentage; absent on a missing operand or zero denominator.
fn percentage(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d * 100.0),
        _ => None,
    }
}

/// One (fiscal year, quarter) cell of the reconciled series.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterSlot {
    pub period_label: String,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub disclosed_date: Option<NaiveDate>,
    pub cumulative: Figures,
    pub single: Figures,
    pub operating_margin_pct: Option<f64>,
    pub equity_ratio_pct: Option<f64>,
}

impl QuarterSlot {
    fn build(
        fiscal_year: i32,
        quarter: Quarter,
        current: Option<&DisclosureRecord>,
        previous: Option<&DisclosureRecord>,
    ) -> Self {
        // 4Q is only derivable against a unique 3Q filing; otherwise the slot stays blank.
        let current = match (quarter, previous) {
            (Quarter::Q4, None) => None,
            _ => current,
        };
        let cumulative = current.map(Figures::of).unwrap_or_default();
        let single = match (quarter, current, previous) {
            (_, None, _) => Figures::default(),
            (Quarter::Q1, Some(_), _) => cumulative,
            (_, Some(_), Some(prev)) => cumulative.delta_from(&Figures::of(prev)),
            (_, Some(_), None) => Figures::default(),
        };

        Self {
            period_label: format!("{}/{}", fiscal_year, quarter.label()),
            fiscal_year,
            quarter,
            disclosed_date: current.and_then(|r| r.disclosed_date),
            cumulative,
            single,
            operating_margin_pct: percentage(cumulative.operating_profit, cumulative.net_sales),
            equity_ratio_pct: percentage(cumulative.equity, cumulative.total_assets),
        }
    }

    /// True when no disclosure backs this slot.
    pub fn is_empty(&self) -> bool {
        self.disclosed_date.is_none() && self.cumulative == Figures::default()
    }
}

/// The record for `(year, period)` if there is exactly one; ambiguity counts as no data.
fn unique_match<'a>(
    records: &'a [DisclosureRecord],
    fiscal_year: i32,
    period: &PeriodType,
) -> Option<&'a DisclosureRecord> {
    let mut matches = records
        .iter()
        .filter(|r| r.fiscal_year() == fiscal_year && &r.period_type == period);
    let first = matches.next()?;
    if matches.next().is_some() {
        tracing::debug!(
            "Ambiguous disclosures for {} {:?}; treating the quarter as missing",
            fiscal_year,
            period
        );
        return None;
    }
    Some(first)
}

/// Builds four slots for every fiscal year present in `records`, in chronological order.
pub fn reconcile(records: &[DisclosureRecord]) -> Vec<QuarterSlot> {
    let years: BTreeSet<i32> = records.iter().map(DisclosureRecord::fiscal_year).collect();
    let mut slots = Vec::with_capacity(years.len() * Quarter::ALL.len());

    for year in years {
        let mut previous: Option<&DisclosureRecord> = None;
        for quarter in Quarter::ALL {
            let current = unique_match(records, year, &quarter.source_period());
            slots.push(QuarterSlot::build(year, quarter, current, previous));
            previous = current;
        }
    }

    tracing::debug!("Reconciled {} disclosures into {} quarter slots", records.len(), slots.len());
    slots
}

fn position(slots: &[QuarterSlot], label: &str) -> Result<usize, ReconcileError> {
    slots
        .iter()
        .position(|s| s.period_label == label)
        .ok_or_else(|| ReconcileError::UnknownPeriod(label.to_string()))
}

/// Inclusive display window over an already reconciled series.
pub fn select_window<'a>(
    slots: &'a [QuarterSlot],
    start: Option<&str>,
    end: Option<&str>,
) -> Result<&'a [QuarterSlot], ReconcileError> {
    if slots.is_empty() {
        return match start.or(end) {
            Some(label) => Err(ReconcileError::UnknownPeriod(label.to_string())),
            None => Ok(slots),
        };
    }

    let from = start.map(|label| position(slots, label)).transpose()?.unwrap_or(0);
    let to = end
        .map(|label| position(slots, label))
        .transpose()?
        .unwrap_or(slots.len() - 1);

    if from > to {
        return Err(ReconcileError::InvalidRange {
            start: slots[from].period_label.clone(),
            end: slots[to].period_label.clone(),
        });
    }
    Ok(&slots[from..=to])
}

/// First and last labels that have a single-quarter net sales figure.
pub fn displayable_range(slots: &[QuarterSlot]) -> Option<(&str, &str)> {
    let mut chartable = slots.iter().filter(|s| s.single.net_sales.is_some());
    let first = chartable.next()?;
    let last = chartable.last().unwrap_or(first);
    Some((first.period_label.as_str(), last.period_label.as_str()))
}

/// Earliest and latest disclosure dates among `slots`.
pub fn disclosure_window(slots: &[QuarterSlot]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = slots.iter().filter_map(|s| s.disclosed_date);
    let min = dates.clone().min()?;
    let max = dates.max()?;
    Some((min, max))
}

/// Quotes dated inside `window`, inclusive.
pub fn quotes_within(quotes: &[DailyQuote], window: (NaiveDate, NaiveDate)) -> Vec<DailyQuote> {
    let (from, to) = window;
    quotes
        .iter()
        .filter(|q| q.date >= from && q.date <= to)
        .cloned()
        .collect()
}

/// A full-year statement as its own row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualRow {
    pub period_label: String,
    pub disclosed_date: Option<NaiveDate>,
    pub figures: Figures,
    pub operating_margin_pct: Option<f64>,
    pub equity_ratio_pct: Option<f64>,
}

/// Every full-year disclosure, ordered by disclosure date; undated ones go last.
pub fn annual_series(records: &[DisclosureRecord]) -> Vec<AnnualRow> {
    let mut rows: Vec<AnnualRow> = records
        .iter()
        .filter(|r| r.period_type == PeriodType::FullYear)
        .map(|r| {
            let figures = Figures::of(r);
            AnnualRow {
                period_label: format!("{}/FY", r.fiscal_year()),
                disclosed_date: r.disclosed_date,
                figures,
                operating_margin_pct: percentage(figures.operating_profit, figures.net_sales),
                equity_ratio_pct: percentage(figures.equity, figures.total_assets),
            }
        })
        .collect();
    rows.sort_by_key(|row| (row.disclosed_date.is_none(), row.disclosed_date));
    rows
}
