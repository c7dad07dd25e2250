use crate::scraper::cleaner::parse_number;
use crate::scraper::error::{FailureKind, ScrapeError};
use crate::valuation::beta_to_discount_rate;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── FieldTable ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRow {
    pub label: String,
    pub value: String,
}

/// Ordered label/value rows as scraped.
///
/// Labels are not unique. `search` returns the first row whose label contains
/// the term (case-insensitive), so when a page lists near-duplicate labels the
/// source order decides which one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldTable {
    rows: Vec<FieldRow>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.rows.push(FieldRow {
            label: label.into(),
            value: value.into(),
        });
    }

    pub fn append(&mut self, other: FieldTable) {
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[FieldRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&FieldRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row whose label contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Option<&FieldRow> {
        let term = term.to_lowercase();
        self.rows
            .iter()
            .find(|row| row.label.to_lowercase().contains(&term))
    }

    pub fn value(&self, term: &str) -> Option<&str> {
        self.search(term).map(|row| row.value.as_str())
    }

    /// Numeric value of the first matching row ("1,234.5" → 1234.5).
    pub fn number(&self, term: &str) -> Option<f64> {
        self.value(term).and_then(parse_number)
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&FieldRow) -> bool,
    {
        self.rows.retain(keep);
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for FieldTable {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        let mut table = FieldTable::new();
        for (label, value) in iter {
            table.push(label, value);
        }
        table
    }
}

// ── Scraper outputs ───────────────────────────────────────────────────────────

/// Quote page: key stats led by the last price, plus the site's internal id.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub table: FieldTable,
    pub internal_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthEstimate {
    pub rate: f64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetaEstimate {
    pub beta: f64,
    pub url: String,
}

/// One block of the annual financial summary (income statement, balance sheet…).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub title: String,
    pub table: FieldTable,
    pub highlights: FieldTable,
}

// ── StockRecord ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Overview,
    Ratios,
    CashFlow,
    BalanceSheet,
    FinancialSummary,
    GrowthRate,
    Beta,
}

impl RecordField {
    pub const ALL: [RecordField; 7] = [
        RecordField::Overview,
        RecordField::Ratios,
        RecordField::CashFlow,
        RecordField::BalanceSheet,
        RecordField::FinancialSummary,
        RecordField::GrowthRate,
        RecordField::Beta,
    ];
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordField::Overview => "overview",
            RecordField::Ratios => "ratios",
            RecordField::CashFlow => "cash flow",
            RecordField::BalanceSheet => "balance sheet",
            RecordField::FinancialSummary => "financial summary",
            RecordField::GrowthRate => "growth rate",
            RecordField::Beta => "beta",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub field: RecordField,
    pub kind: FailureKind,
    pub reason: String,
}

/// Everything scraped for one stock code. Produced by [`StockRecordBuilder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    pub code: String,
    pub internal_id: Option<String>,
    pub overview: Option<FieldTable>,
    pub ratios: Option<FieldTable>,
    pub cash_flow: Option<FieldTable>,
    pub balance_sheet: Option<FieldTable>,
    pub financial_summary: Option<Vec<SummarySection>>,
    pub beta: Option<f64>,
    pub growth_rate: Option<f64>,
    pub discount_rate: Option<f64>,
    pub sources: Vec<String>,
    pub failures: Vec<FieldFailure>,
    pub scraped_at: NaiveDateTime,
}

impl StockRecord {
    /// "abc-corp" → "Abc Corp"
    pub fn display_name(&self) -> String {
        self.code
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    /// Last traded price as scraped, thousands separators removed.
    pub fn last_price(&self) -> Option<String> {
        self.overview
            .as_ref()
            .and_then(|t| t.value("Last Price"))
            .map(|p| p.trim().replace(',', ""))
            .filter(|p| !p.is_empty())
    }

    pub fn failure(&self, field: RecordField) -> Option<&FieldFailure> {
        self.failures.iter().find(|f| f.field == field)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Accumulates scraper results one field at a time.
///
/// Failed scrapers leave their field `None` and are recorded in `failures`;
/// nothing is ever defaulted to zero.
pub struct StockRecordBuilder {
    record: StockRecord,
    settled: Vec<RecordField>,
}

const NOT_ATTEMPTED: &str = "not attempted";

impl StockRecordBuilder {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            record: StockRecord {
                code: code.into(),
                internal_id: None,
                overview: None,
                ratios: None,
                cash_flow: None,
                balance_sheet: None,
                financial_summary: None,
                beta: None,
                growth_rate: None,
                discount_rate: None,
                sources: Vec::new(),
                failures: Vec::new(),
                scraped_at: Utc::now().naive_utc(),
            },
            settled: Vec::new(),
        }
    }

    /// Internal id resolved by the overview scraper, if it succeeded.
    pub fn internal_id(&self) -> Option<&str> {
        self.record.internal_id.as_deref()
    }

    pub fn overview(&mut self, result: Result<Overview, ScrapeError>) -> &mut Self {
        if let Some(overview) = self.settle(RecordField::Overview, result) {
            info!("{}: internal id {}", self.record.code, overview.internal_id);
            self.record.internal_id = Some(overview.internal_id);
            self.record.overview = Some(overview.table);
            self.record.sources.push(overview.url);
        }
        self
    }

    pub fn ratios(&mut self, result: Result<FieldTable, ScrapeError>) -> &mut Self {
        self.record.ratios = self.settle(RecordField::Ratios, result);
        self
    }

    pub fn cash_flow(&mut self, result: Result<FieldTable, ScrapeError>) -> &mut Self {
        self.record.cash_flow = self.settle(RecordField::CashFlow, result);
        self
    }

    pub fn balance_sheet(&mut self, result: Result<FieldTable, ScrapeError>) -> &mut Self {
        self.record.balance_sheet = self.settle(RecordField::BalanceSheet, result);
        self
    }

    pub fn financial_summary(
        &mut self,
        result: Result<Vec<SummarySection>, ScrapeError>,
    ) -> &mut Self {
        self.record.financial_summary = self.settle(RecordField::FinancialSummary, result);
        self
    }

    pub fn growth_rate(&mut self, result: Result<GrowthEstimate, ScrapeError>) -> &mut Self {
        if let Some(growth) = self.settle(RecordField::GrowthRate, result) {
            info!("{}: growth rate {}", self.record.code, growth.rate);
            self.record.growth_rate = Some(growth.rate);
            self.record.sources.push(growth.url);
        }
        self
    }

    /// Records beta and the discount rate derived from it.
    pub fn beta(&mut self, result: Result<BetaEstimate, ScrapeError>) -> &mut Self {
        if let Some(estimate) = self.settle(RecordField::Beta, result) {
            let rate = beta_to_discount_rate(estimate.beta);
            info!("{}: beta {} → discount rate {}", self.record.code, estimate.beta, rate);
            self.record.beta = Some(estimate.beta);
            self.record.discount_rate = Some(rate);
            self.record.sources.push(estimate.url);
        }
        self
    }

    /// Marks a field as not attempted because a prerequisite was missing.
    pub fn skip(&mut self, field: RecordField, reason: impl Into<String>) -> &mut Self {
        self.settled.push(field);
        let reason = reason.into();
        warn!("{}: {} skipped: {}", self.record.code, field, reason);
        self.record.failures.push(FieldFailure {
            field,
            kind: FailureKind::Skipped,
            reason,
        });
        self
    }

    /// Fields that were never settled or skipped are recorded as skipped.
    pub fn build(mut self) -> StockRecord {
        for field in RecordField::ALL {
            if !self.settled.contains(&field) {
                self.skip(field, NOT_ATTEMPTED);
            }
        }
        self.record
    }

    fn settle<T>(&mut self, field: RecordField, result: Result<T, ScrapeError>) -> Option<T> {
        self.settled.push(field);
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}: {} unavailable: {}", self.record.code, field, e);
                self.record.failures.push(FieldFailure {
                    field,
                    kind: e.kind(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
