//! Pipeline orchestrator: ties scrapers → valuation → report together.
//!
//! Companies are processed strictly one after another. For each code:
//!   1. Overview (quote page) → internal id, last price, key stats
//!   2. Growth forecast and beta → discount rate
//!   3. Ratios, then the id-keyed cash flow, balance sheet and financial summary
//!   4. DCF valuation and the report file
//!
//! A scraper failure only blanks its field; a company only counts as failed
//! when its report cannot be written.

use crate::config::AppConfig;
use crate::models::{RecordField, StockRecord, StockRecordBuilder};
use crate::report::ReportWriter;
use crate::scraper::{HttpClient, InfrontSource, InvestingSource, PageFetcher, SimplyWallStSource};
use crate::utils::Timer;
use crate::valuation::value_record;
use anyhow::{Context, Result};
use chrono::Datelike;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NO_INTERNAL_ID: &str = "internal id unavailable";

pub struct Pipeline {
    config: AppConfig,
    investing: InvestingSource,
    simplywallst: SimplyWallStSource,
    infront: InfrontSource,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = HttpClient::new(&config.scraper).context("Failed to build HTTP client")?;
        Ok(Self::with_fetcher(config, Arc::new(client)))
    }

    pub fn with_fetcher(config: AppConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            investing: InvestingSource::new(Arc::clone(&fetcher), &config.scraper),
            simplywallst: SimplyWallStSource::new(Arc::clone(&fetcher), &config.scraper),
            infront: InfrontSource::new(fetcher, &config.scraper),
            config,
        }
    }

    pub async fn run(&self, codes: &[String]) -> Result<PipelineStats> {
        let writer = ReportWriter::new(&self.config.report).with_context(|| {
            format!("Failed to prepare report directory {:?}", self.config.report.output_dir)
        })?;
        let timer = Timer::start(format!("Valuing {} companies", codes.len()));

        let mut stats = PipelineStats {
            companies: codes.len(),
            ..PipelineStats::default()
        };

        for code in codes {
            match self.analyse(&writer, code).await {
                Ok(outcome) => {
                    debug!("{}: done, report {}", code, outcome.report.display());
                    stats.reports_written += 1;
                    if outcome.valued {
                        stats.valued += 1;
                    }
                }
                Err(e) => {
                    warn!("{}: {:#}", code, e);
                    stats.failed += 1;
                }
            }
        }

        info!(
            "=== Done: {} companies | {} valued | {} reports | {} failed | {:.2?} ===",
            stats.companies,
            stats.valued,
            stats.reports_written,
            stats.failed,
            timer.elapsed()
        );
        Ok(stats)
    }

    /// Scrape, value and report one company.
    pub async fn analyse(&self, writer: &ReportWriter, code: &str) -> Result<Outcome> {
        let _t = Timer::start(code);
        let record = self.collect(code).await;

        let valuation = value_record(&record, self.config.valuation.projection_years);
        match &valuation {
            Ok(v) => info!("{}: intrinsic value {:.2} per share", code, v.npv_per_share),
            Err(e) => warn!("{}: not valued: {}", code, e),
        }

        let year = chrono::Local::now().year();
        let report = writer
            .write(&record, &valuation, year)
            .with_context(|| format!("report for {}", code))?;

        Ok(Outcome {
            report,
            valued: valuation.is_ok(),
        })
    }

    /// Run every scraper for `code`; failures are recorded on the record.
    pub async fn collect(&self, code: &str) -> StockRecord {
        let mut builder = StockRecordBuilder::new(code);

        builder.overview(self.investing.overview(code).await);
        builder.growth_rate(self.simplywallst.growth_rate(code).await);
        builder.beta(self.infront.beta(code).await);
        builder.ratios(self.investing.ratios(code).await);

        match builder.internal_id().map(str::to_owned) {
            Some(id) => {
                builder.cash_flow(self.investing.cash_flow(&id).await);
                builder.balance_sheet(self.investing.balance_sheet(&id).await);
                builder.financial_summary(self.investing.financial_summary(&id).await);
            }
            None => {
                builder
                    .skip(RecordField::CashFlow, NO_INTERNAL_ID)
                    .skip(RecordField::BalanceSheet, NO_INTERNAL_ID)
                    .skip(RecordField::FinancialSummary, NO_INTERNAL_ID);
            }
        }

        builder.build()
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub report: PathBuf,
    pub valued: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub companies: usize,
    pub valued: usize,
    pub reports_written: usize,
    pub failed: usize,
}

impl PipelineStats {
    pub fn all_failed(&self) -> bool {
        self.companies > 0 && self.failed == self.companies
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::error::FailureKind;
    use crate::scraper::testing::StubFetcher;

    const QUOTE_PAGE: &str = r#"
        <div data-pair-id="41688"><span id="last_last">1,012.34</span></div>
        <span class="float_lang_base_1">Prev. Close</span><span class="float_lang_base_2">1,010.00</span>
        <span class="float_lang_base_1">Shares Outstanding</span><span class="float_lang_base_2">50,000,000</span>"#;

    fn config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.report.output_dir = dir.to_path_buf();
        config
    }

    /// Every page a fully scraped "abc-corp" needs, except the balance sheet.
    fn abc_corp_pages(config: &AppConfig) -> StubFetcher {
        let probe: Arc<dyn PageFetcher> = Arc::new(StubFetcher::new());
        let investing = InvestingSource::new(Arc::clone(&probe), &config.scraper);
        let swst = SimplyWallStSource::new(Arc::clone(&probe), &config.scraper);
        let infront = InfrontSource::new(probe, &config.scraper);

        StubFetcher::new()
            .page(investing.quote_url("abc-corp").unwrap(), QUOTE_PAGE)
            .page(
                investing
                    .statement_url("41688", crate::scraper::investing::StatementKind::CashFlow)
                    .unwrap(),
                "<table><tr><td>Cash From Operating Activities</td><td>100</td></tr></table>",
            )
            .page(swst.search_endpoint().unwrap(), r#"{"hits":[{"url":"/stocks/abc"}]}"#)
            .page(
                "https://simplywall.st/stocks/abc",
                r#"<p data-cy-id="key-metric-value-forecasted-annual-earnings-growth">10%</p>"#,
            )
            .page(
                infront.autocomplete_url("abc-corp").unwrap(),
                r#"[{"name":"ABC CORP","isin":"MY0000000001"}]"#,
            )
            .page(
                infront.beta_page_url("MY0000000001", "ABC CORP").unwrap(),
                "ABC CORP shows a Beta of 1.00.",
            )
    }

    #[tokio::test]
    async fn collect_gathers_every_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let pipeline = Pipeline::with_fetcher(config.clone(), Arc::new(abc_corp_pages(&config)));

        let record = pipeline.collect("abc-corp").await;
        assert_eq!(record.internal_id.as_deref(), Some("41688"));
        assert_eq!(record.last_price().as_deref(), Some("1012.34"));
        assert_eq!(record.growth_rate, Some(0.1));
        assert_eq!(record.beta, Some(1.0));
        assert_eq!(record.discount_rate, Some(0.06));
        assert!(record.cash_flow.is_some());
        assert_eq!(record.sources.len(), 3);

        assert_eq!(record.balance_sheet, None);
        assert_eq!(record.failure(RecordField::BalanceSheet).map(|f| f.kind), Some(FailureKind::Fetch));
    }

    #[tokio::test]
    async fn statements_skipped_without_internal_id() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubFetcher::new());
        let pipeline = Pipeline::with_fetcher(config(dir.path()), stub.clone());

        let record = pipeline.collect("ghost").await;
        assert!(stub.requested().iter().all(|url| !url.contains("/instruments/Financials/")));
        assert_eq!(record.failures.len(), 7);
        for field in [RecordField::CashFlow, RecordField::BalanceSheet, RecordField::FinancialSummary] {
            assert_eq!(record.failure(field).map(|f| f.kind), Some(FailureKind::Skipped));
        }
        assert_eq!(record.overview, None);
    }

    #[tokio::test]
    async fn batch_continues_after_failing_company() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let pipeline = Pipeline::with_fetcher(config.clone(), Arc::new(abc_corp_pages(&config)));

        // A code with a path separator cannot become a report file name.
        let codes = vec!["no-such-dir/x".to_string(), "abc-corp".to_string(), "ghost".to_string()];
        let stats = pipeline.run(&codes).await.unwrap();

        assert_eq!(
            stats,
            PipelineStats {
                companies: 3,
                valued: 1,
                reports_written: 2,
                failed: 1,
            }
        );
        assert!(!stats.all_failed());
        assert!(dir.path().join("ghost.csv").exists());

        let valued: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("abc-corp-") && name.ends_with("-1012.34.csv"))
            .collect();
        assert_eq!(valued.len(), 1);
    }

    #[test]
    fn all_failed_needs_every_company() {
        let stats = PipelineStats { companies: 2, failed: 2, ..Default::default() };
        assert!(stats.all_failed());
        assert!(!PipelineStats::default().all_failed());
    }
}
