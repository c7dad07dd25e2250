//! investing.com: quote page, ratios page and the annual statement endpoints.

use crate::config::ScraperConfig;
use crate::models::{FieldTable, Overview, SummarySection};
use crate::scraper::cleaner::retain_figures;
use crate::scraper::error::ScrapeError;
use crate::scraper::parsers::{HtmlTable, RawDocument};
use crate::scraper::{PageFetcher, build_url};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;
use std::sync::Arc;
use tracing::{debug, info, warn};

static PAIR_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-pair-id="(\d+)""#).expect("Failed to compile PAIR_ID_RE"));
static LAST_PRICE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#last_last").expect("Failed to compile LAST_PRICE_SEL"));
static SUMMARY_SECTION_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.companySummaryIncomeStatement")
        .expect("Failed to compile SUMMARY_SECTION_SEL")
});
static TITLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3").expect("Failed to compile TITLE_SEL"));

const LABEL_CLASS: &str = "float_lang_base_1";
const VALUE_CLASS: &str = "float_lang_base_2";

// The ratios page opens with a price summary table; the ratio groups follow.
const FIRST_RATIO_TABLE: usize = 1;
const LAST_RATIO_TABLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CashFlow,
    BalanceSheet,
}

impl StatementKind {
    fn report_type(self) -> &'static str {
        match self {
            StatementKind::CashFlow => "CAS",
            StatementKind::BalanceSheet => "BAL",
        }
    }
}

pub struct InvestingSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl InvestingSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            base_url: config.investing_url.clone(),
        }
    }

    /// e.g. top-glove-corp → /equities/top-glove-corp
    pub(crate) fn quote_url(&self, code: &str) -> Result<String, ScrapeError> {
        build_url(&self.base_url, &format!("/equities/{code}"), &[])
    }

    pub(crate) fn ratios_url(&self, code: &str) -> Result<String, ScrapeError> {
        build_url(&self.base_url, &format!("/equities/{code}-ratios"), &[])
    }

    pub(crate) fn statement_url(&self, id: &str, kind: StatementKind) -> Result<String, ScrapeError> {
        build_url(
            &self.base_url,
            "/instruments/Financials/changereporttypeajax",
            &[
                ("action", "change_report_type"),
                ("pair_ID", id),
                ("report_type", kind.report_type()),
                ("period_type", "Annual"),
            ],
        )
    }

    pub(crate) fn summary_url(&self, id: &str) -> Result<String, ScrapeError> {
        build_url(
            &self.base_url,
            "/instruments/Financials/changesummaryreporttypeajax",
            &[
                ("action", "change_report_type"),
                ("pid", id),
                ("financial_id", id),
                ("ratios_id", id),
                ("period_type", "Annual"),
            ],
        )
    }

    pub async fn overview(&self, code: &str) -> Result<Overview, ScrapeError> {
        let url = self.quote_url(code)?;
        info!("{}: fetching quote page", code);
        let body = self.fetcher.get_text(&url).await?;
        parse_overview(body, &url)
    }

    pub async fn ratios(&self, code: &str) -> Result<FieldTable, ScrapeError> {
        let url = self.ratios_url(code)?;
        info!("{}: fetching ratios", code);
        let body = self.fetcher.get_text(&url).await?;
        parse_ratios(body, &url)
    }

    pub async fn statement(&self, id: &str, kind: StatementKind) -> Result<FieldTable, ScrapeError> {
        let url = self.statement_url(id, kind)?;
        info!("pair {}: fetching {:?} statement", id, kind);
        let body = self.fetcher.get_text(&url).await?;
        parse_statement(body, &url)
    }

    pub async fn cash_flow(&self, id: &str) -> Result<FieldTable, ScrapeError> {
        self.statement(id, StatementKind::CashFlow).await
    }

    pub async fn balance_sheet(&self, id: &str) -> Result<FieldTable, ScrapeError> {
        self.statement(id, StatementKind::BalanceSheet).await
    }

    pub async fn financial_summary(&self, id: &str) -> Result<Vec<SummarySection>, ScrapeError> {
        let url = self.summary_url(id)?;
        info!("pair {}: fetching financial summary", id);
        let body = self.fetcher.get_text(&url).await?;
        parse_summary(body, &url)
    }
}

// ── Page parsers ──────────────────────────────────────────────────────────────

/// Internal id, last price and the key-stats block of a quote page.
pub fn parse_overview(body: String, url: &str) -> Result<Overview, ScrapeError> {
    let doc = RawDocument::parse(body);

    let internal_id = PAIR_ID_RE
        .captures(doc.html())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ScrapeError::parse(format!("no data-pair-id attribute on {url}")))?;

    let last_price = doc
        .select_text(&LAST_PRICE_SEL)
        .ok_or_else(|| ScrapeError::parse(format!("no last price element on {url}")))?;

    let mut table = FieldTable::new();
    table.push("Last Price", last_price);
    table.append(doc.paired_text("span", LABEL_CLASS, VALUE_CLASS)?);
    debug!("{}: {} overview rows", url, table.len());

    Ok(Overview {
        table,
        internal_id,
        url: url.to_string(),
    })
}

/// Ratio groups (tables 1..=8) concatenated in page order.
pub fn parse_ratios(body: String, url: &str) -> Result<FieldTable, ScrapeError> {
    let doc = RawDocument::parse(body);
    let tables = doc
        .tables()
        .ok_or_else(|| ScrapeError::parse(format!("no tables on {url}")))?;

    if tables.len() <= LAST_RATIO_TABLE {
        warn!(
            "{}: expected {} tables, found {}; using what is there",
            url,
            LAST_RATIO_TABLE + 1,
            tables.len()
        );
    }

    let end = tables.len().min(LAST_RATIO_TABLE + 1);
    let mut ratios = FieldTable::new();
    for table in tables.get(FIRST_RATIO_TABLE..end).unwrap_or(&[]) {
        ratios.append(table.field_table());
    }
    Ok(ratios)
}

/// First table of a statement response, narrative rows dropped.
pub fn parse_statement(body: String, url: &str) -> Result<FieldTable, ScrapeError> {
    let doc = RawDocument::parse(body);
    let table = doc
        .tables()
        .and_then(|t| t.first())
        .ok_or_else(|| ScrapeError::parse(format!("no statement table on {url}")))?;
    Ok(retain_figures(table.field_table()))
}

pub fn parse_summary(body: String, url: &str) -> Result<Vec<SummarySection>, ScrapeError> {
    let doc = RawDocument::parse(body);
    let blocks = doc.select_html(&SUMMARY_SECTION_SEL);
    if blocks.is_empty() {
        return Err(ScrapeError::parse(format!("no summary sections on {url}")));
    }

    blocks
        .into_iter()
        .map(|block| {
            let part = RawDocument::parse(block);
            Ok(SummarySection {
                title: part.select_text(&TITLE_SEL).unwrap_or_default(),
                table: part
                    .tables()
                    .and_then(|t| t.first())
                    .map(HtmlTable::field_table)
                    .unwrap_or_default(),
                highlights: part.paired_text("span", LABEL_CLASS, VALUE_CLASS)?,
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
