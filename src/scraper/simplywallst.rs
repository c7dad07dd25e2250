//! Forecast earnings growth from Simply Wall St, located through its Algolia company index.

use crate::config::ScraperConfig;
use crate::models::GrowthEstimate;
use crate::scraper::cleaner::{parse_percent, search_name};
use crate::scraper::error::ScrapeError;
use crate::scraper::parsers::RawDocument;
use crate::scraper::{PageFetcher, build_url};
use once_cell::sync::Lazy;
use scraper::Selector;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

static GROWTH_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"p[data-cy-id="key-metric-value-forecasted-annual-earnings-growth"]"#)
        .expect("Failed to compile GROWTH_SEL")
});

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: Option<String>,
}

pub struct SimplyWallStSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    search_url: String,
    search_agent: String,
    app_id: String,
    api_key: String,
    market_qualifier: String,
}

impl SimplyWallStSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            base_url: config.simplywallst_url.trim_end_matches('/').to_string(),
            search_url: config.search_url.clone(),
            search_agent: config.search_agent.clone(),
            app_id: config.search_app_id.clone(),
            api_key: config.search_api_key.clone(),
            market_qualifier: config.market_qualifier.clone(),
        }
    }

    pub(crate) fn search_endpoint(&self) -> Result<String, ScrapeError> {
        build_url(&self.search_url, "", &[("x-algolia-agent", self.search_agent.as_str())])
    }

    /// Full-text query sent to the index: "top-glove" → "top glove klse".
    pub(crate) fn search_query(&self, code: &str) -> String {
        format!("{} {}", search_name(code), self.market_qualifier)
    }

    pub async fn growth_rate(&self, code: &str) -> Result<GrowthEstimate, ScrapeError> {
        let url = self.company_url(code).await?;
        info!("{}: fetching growth forecast from {}", code, url);
        let body = self.fetcher.get_text(&url).await?;
        let rate = parse_growth(body)?;
        Ok(GrowthEstimate { rate, url })
    }

    /// Canonical company page: first search hit's path on the Simply Wall St origin.
    async fn company_url(&self, code: &str) -> Result<String, ScrapeError> {
        let query = self.search_query(code);
        let body = json!({
            "query": query,
            "highlightPostTag": " ",
            "highlightPreTag": " ",
            "restrictHighlightAndSnippetArrays": true,
        });
        let headers = [
            ("X-Algolia-API-Key", self.api_key.as_str()),
            ("X-Algolia-Application-Id", self.app_id.as_str()),
        ];

        let endpoint = self.search_endpoint()?;
        let text = self.fetcher.post_json(&endpoint, &headers, &body).await?;
        let response: SearchResponse = serde_json::from_str(&text)
            .map_err(|e| ScrapeError::parse(format!("search response: {e}")))?;
        debug!("{:?}: {} hits", query, response.hits.len());

        let path = response
            .hits
            .into_iter()
            .next()
            .and_then(|hit| hit.url)
            .ok_or_else(|| ScrapeError::lookup(format!("no search hits for {query:?}")))?;
        Ok(format!("{}{}", self.base_url, path))
    }
}

/// "12.5%" in the forecast tile → 0.125.
pub fn parse_growth(body: String) -> Result<f64, ScrapeError> {
    let doc = RawDocument::parse(body);
    let text = doc
        .select_text(&GROWTH_SEL)
        .ok_or_else(|| ScrapeError::lookup("forecast growth metric absent"))?;
    let pct = parse_percent(&text)
        .ok_or_else(|| ScrapeError::parse(format!("growth {text:?} is not a number")))?;
    Ok(pct / 100.0)
}
