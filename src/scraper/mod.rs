pub mod cleaner;
pub mod error;
pub mod http_client;
pub mod infront;
pub mod investing;
pub mod parsers;
pub mod simplywallst;

use async_trait::async_trait;

use self::error::{FetchError, ScrapeError};

pub use self::http_client::HttpClient;
pub use self::infront::InfrontSource;
pub use self::investing::InvestingSource;
pub use self::simplywallst::SimplyWallStSource;

// ── Fetcher trait ─────────────────────────────────────────────────────────────

/// Transport seam shared by every source.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET a page as text. GETs take no caller headers: the configured user
    /// agent is the only header sent.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// POST a JSON body with explicit headers and return the response text.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, FetchError>;
}

/// `base` + `path` with the query pairs percent-encoded.
pub(crate) fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<String, ScrapeError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let parsed = if query.is_empty() {
        url::Url::parse(&raw)
    } else {
        url::Url::parse_with_params(&raw, query)
    };
    let url = parsed.map_err(|source| FetchError::Url { url: raw.clone(), source })?;
    Ok(url.to_string())
}

// ── Test support ──────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies keyed by exact URL; anything else is a 404.
    #[derive(Default)]
    pub struct StubFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.pages.insert(url.into(), body.into());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn serve(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.serve(url)
        }

        async fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            _body: &serde_json::Value,
        ) -> Result<String, FetchError> {
            self.serve(url)
        }
    }
}
