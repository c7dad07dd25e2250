//! Per-company report: a CSV laid out like the valuation worksheet, plus an
//! optional JSON sidecar carrying the full record.

use crate::config::ReportConfig;
use crate::models::StockRecord;
use crate::valuation::{ValuationError, ValuationResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Overview rows shown in the key-stats block (last price, then the stats
/// the worksheet has always carried).
const OVERVIEW_ROWS: [usize; 8] = [0, 5, 6, 7, 8, 9, 11, 15];

const NA: &str = "n/a";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stock code {0:?} is not a plain file name")]
    InvalidCode(String),
}

/// Codes become file names, so anything that could leave the output directory is refused.
fn check_code(code: &str) -> Result<(), ReportError> {
    let unsafe_code = code.is_empty()
        || code == "."
        || code == ".."
        || code.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if unsafe_code {
        return Err(ReportError::InvalidCode(code.to_string()));
    }
    Ok(())
}

/// `<code>-<npv per share, 2 dp>-<last price>.<ext>`
pub fn report_file_name(code: &str, npv_per_share: f64, last_price: &str, ext: &str) -> String {
    format!("{code}-{npv_per_share:.2}-{last_price}.{ext}")
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    record: &'a StockRecord,
    valuation: Option<&'a ValuationResult>,
    valuation_error: Option<String>,
}

pub struct ReportWriter {
    output_dir: PathBuf,
    extension: String,
    json_sidecar: bool,
}

impl ReportWriter {
    pub fn new(config: &ReportConfig) -> Result<Self, ReportError> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            output_dir: config.output_dir.clone(),
            extension: config.extension.clone(),
            json_sidecar: config.json_sidecar,
        })
    }

    /// Valued reports carry NPV and price in the name; others fall back to `<code>.<ext>`.
    pub fn file_name(
        &self,
        record: &StockRecord,
        valuation: &Result<ValuationResult, ValuationError>,
    ) -> Result<String, ReportError> {
        check_code(&record.code)?;
        Ok(match (valuation, record.last_price()) {
            (Ok(v), Some(price)) => {
                report_file_name(&record.code, v.npv_per_share, &price, &self.extension)
            }
            _ => format!("{}.{}", record.code, self.extension),
        })
    }

    pub fn write(
        &self,
        record: &StockRecord,
        valuation: &Result<ValuationResult, ValuationError>,
        first_year: i32,
    ) -> Result<PathBuf, ReportError> {
        let path = self.output_dir.join(self.file_name(record, valuation)?);

        let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        for row in worksheet_rows(record, valuation, first_year) {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        info!("{}: report written to {}", record.code, path.display());

        if self.json_sidecar {
            if let Err(e) = self.write_sidecar(&path, record, valuation) {
                // A company either gets both files or neither.
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        }
        Ok(path)
    }

    fn write_sidecar(
        &self,
        report: &Path,
        record: &StockRecord,
        valuation: &Result<ValuationResult, ValuationError>,
    ) -> Result<(), ReportError> {
        let doc = ReportDocument {
            record,
            valuation: valuation.as_ref().ok(),
            valuation_error: valuation.as_ref().err().map(|e| e.to_string()),
        };
        let path = report.with_extension("json");
        std::fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        info!("{}: metadata written to {}", record.code, path.display());
        Ok(())
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

fn money(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| NA.to_string())
}

fn percent(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}%", v * 100.0)).unwrap_or_else(|| NA.to_string())
}

fn labelled<I>(label: &str, values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    std::iter::once(label.to_string()).chain(values).collect()
}

fn worksheet_rows(
    record: &StockRecord,
    valuation: &Result<ValuationResult, ValuationError>,
    first_year: i32,
) -> Vec<Vec<String>> {
    let cash_flow = record.cash_flow.as_ref();
    let balance = record.balance_sheet.as_ref();
    let overview = record.overview.as_ref();
    let mut rows = Vec::new();

    // Inputs
    rows.push(labelled("Name of Stock", [record.display_name()]));
    rows.push(labelled(
        "Operating Cash Flow",
        [money(cash_flow.and_then(|t| t.number("Cash From Operating Activities")))],
    ));
    rows.push(labelled(
        "Total Debt",
        [money(balance.and_then(|t| t.number("Total Long Term Debt")))],
    ));
    rows.push(labelled(
        "Cash & Equivalent",
        [money(balance.and_then(|t| t.number("Cash & Equivalent")))],
    ));
    rows.push(labelled("Growth Rate", [percent(record.growth_rate)]));
    rows.push(labelled(
        "No. of Shares Outstanding",
        [money(overview.and_then(|t| t.number("Shares Outstanding")).map(|s| s / 1_000_000.0))],
    ));
    rows.push(labelled("Discount Rate", [percent(record.discount_rate)]));
    rows.push(Vec::new());

    // Projection and intrinsic value
    match valuation {
        Ok(v) => {
            let years = v.cash_flows.len();
            rows.push(labelled(
                "Year",
                (0..years).map(|i| (first_year + i as i32).to_string()),
            ));
            rows.push(labelled("Cash Flow", v.cash_flows.iter().map(|c| format!("{c:.2}"))));
            rows.push(labelled(
                "Discount Factor",
                v.discount_factors.iter().map(|f| format!("{f:.4}")),
            ));
            rows.push(labelled(
                "Discounted Value",
                v.present_values.iter().map(|p| format!("{p:.2}")),
            ));
            rows.push(Vec::new());

            rows.push(labelled(
                &format!("PV of {years} yr Cash Flows"),
                [money(Some(v.total_present_value))],
            ));
            rows.push(labelled("Intrinsic Value per Share", [money(Some(v.npv_per_share))]));
            rows.push(labelled("- Debt per Share", [money(v.debt_per_share)]));
            rows.push(labelled("+ Cash per Share", [money(v.cash_per_share)]));
            rows.push(labelled("Net Cash per Share", [money(v.net_cash_value_per_share)]));
        }
        Err(e) => rows.push(labelled("Valuation", [format!("{NA}: {e}")])),
    }
    rows.push(Vec::new());

    // Key stats
    if let Some(table) = overview {
        rows.push(vec!["Overview".to_string()]);
        for row in OVERVIEW_ROWS.iter().filter_map(|&i| table.get(i)) {
            rows.push(vec![row.label.clone(), row.value.clone()]);
        }
        rows.push(Vec::new());
    }

    rows.push(labelled("Sources", record.sources.iter().cloned()));
    for failure in &record.failures {
        rows.push(vec![
            "Unavailable".to_string(),
            failure.field.to_string(),
            failure.kind.to_string(),
            failure.reason.clone(),
        ]);
    }

    rows
}

// ── Tests ─────────────────────────────────────────────────────────────────────
