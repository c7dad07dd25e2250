//! Beta from Infront Analytics, located through its autocomplete endpoint.

use crate::config::ScraperConfig;
use crate::models::BetaEstimate;
use crate::scraper::cleaner::{beta_slug, search_name};
use crate::scraper::error::ScrapeError;
use crate::scraper::{PageFetcher, build_url};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

static BETA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"shows a Beta of ([+-]?\d+\.\d+).").expect("Failed to compile BETA_RE")
});

#[derive(Debug, Deserialize)]
struct Instrument {
    name: String,
    isin: String,
}

pub struct InfrontSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl InfrontSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            base_url: config.infront_url.clone(),
        }
    }

    pub(crate) fn autocomplete_url(&self, code: &str) -> Result<String, ScrapeError> {
        build_url(
            &self.base_url,
            "/Eurofin/autocomplete",
            &[("keyname", search_name(code).as_str())],
        )
    }

    pub(crate) fn beta_page_url(&self, isin: &str, name: &str) -> Result<String, ScrapeError> {
        build_url(
            &self.base_url,
            &format!("/fe-en/{}/{}/beta", isin, beta_slug(name)),
            &[],
        )
    }

    pub async fn beta(&self, code: &str) -> Result<BetaEstimate, ScrapeError> {
        let url = self.resolve(code).await?;
        info!("{}: fetching beta from {}", code, url);
        let body = self.fetcher.get_text(&url).await?;
        let beta = parse_beta(&body)?;
        Ok(BetaEstimate { beta, url })
    }

    /// Beta page of the first autocomplete match.
    async fn resolve(&self, code: &str) -> Result<String, ScrapeError> {
        let lookup = self.autocomplete_url(code)?;
        let text = self.fetcher.get_text(&lookup).await?;
        let matches: Vec<Instrument> = serde_json::from_str(&text)
            .map_err(|e| ScrapeError::parse(format!("autocomplete response: {e}")))?;
        debug!("{}: {} autocomplete matches", code, matches.len());

        let first = matches
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::lookup(format!("no instrument matches {:?}", search_name(code))))?;
        self.beta_page_url(&first.isin, &first.name)
    }
}

/// Signed decimal from "… shows a Beta of 1.07." on the beta page.
pub fn parse_beta(html: &str) -> Result<f64, ScrapeError> {
    let raw = BETA_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ScrapeError::parse("beta sentence not found"))?
        .as_str();
    raw.parse()
        .map_err(|e| ScrapeError::parse(format!("beta {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::StubFetcher;

    fn source(stub: StubFetcher) -> InfrontSource {
        InfrontSource::new(Arc::new(stub), &ScraperConfig::default())
    }

    #[test]
    fn beta_sentence_is_parsed() {
        let page = "<p>Over the last five years, Top Glove shows a Beta of 0.56. This is low.</p>";
        assert_eq!(parse_beta(page).unwrap(), 0.56);
        assert_eq!(parse_beta("shows a Beta of -1.20.").unwrap(), -1.2);
        assert_eq!(parse_beta("shows a Beta of +1.05.").unwrap(), 1.05);
    }

    #[test]
    fn missing_sentence_is_parse_error() {
        let err = parse_beta("<p>Beta not available</p>").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn beta_page_url_uses_slug() {
        let src = source(StubFetcher::new());
        assert_eq!(
            src.beta_page_url("MYL7113OO003", "TOP GLOVE CORP. BHD.").unwrap(),
            "https://www.infrontanalytics.com/fe-en/MYL7113OO003/TOP-GLOVE-CORP-BHD-/beta"
        );
    }

    #[tokio::test]
    async fn beta_follows_first_autocomplete_match() {
        let probe = source(StubFetcher::new());
        let lookup = probe.autocomplete_url("top-glove").unwrap();
        let page = probe.beta_page_url("MYL7113OO003", "TOP GLOVE CORP. BHD.").unwrap();

        let stub = StubFetcher::new()
            .page(
                lookup,
                r#"[{"name":"TOP GLOVE CORP. BHD.","isin":"MYL7113OO003","type":"equity"},
                    {"name":"TOP GLOVE WARRANT","isin":"MYJ7113WA001"}]"#,
            )
            .page(page.clone(), "<div>TOP GLOVE CORP. BHD. shows a Beta of 1.23.</div>");
        let src = source(stub);

        let estimate = src.beta("top-glove").await.unwrap();
        assert_eq!(estimate.beta, 1.23);
        assert_eq!(estimate.url, page);
    }

    #[tokio::test]
    async fn empty_autocomplete_is_lookup_error() {
        let probe = source(StubFetcher::new());
        let lookup = probe.autocomplete_url("ghost").unwrap();
        let src = source(StubFetcher::new().page(lookup, "[]"));

        let err = src.beta("ghost").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Lookup(_)));
    }
}
