use crate::config::ScraperConfig;
use crate::scraper::PageFetcher;
use crate::scraper::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP client with a fixed browser user agent.
///
/// Every request goes out through `secure` first; a transport failure (TLS
/// handshake, connect, timeout) is retried exactly once through `insecure`,
/// which skips certificate verification. There is no further retry policy.
/// No cookie store is kept, so no session state carries over between requests.
pub struct HttpClient {
    secure: reqwest::Client,
    insecure: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        let secure = Self::builder(config).build().map_err(FetchError::Client)?;
        let insecure = Self::builder(config)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            secure,
            insecure,
            config: config.clone(),
        })
    }

    fn builder(config: &ScraperConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
    }

    async fn send<F>(&self, url: &str, request: F) -> Result<String, FetchError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        self.polite_delay().await;

        let response = match request(&self.secure).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("{} failed ({}), retrying without certificate verification", url, e);
                request(&self.insecure)
                    .send()
                    .await
                    .map_err(|source| FetchError::Transport {
                        url: url.to_string(),
                        source,
                    })?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!("{}: {} bytes", url, body.len());
        Ok(body)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = self.config.request_delay_ms + jitter;
        if total > 0 {
            sleep(Duration::from_millis(total)).await;
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);
        self.send(url, |client| client.get(url)).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, FetchError> {
        debug!("POST {}", url);
        self.send(url, |client| {
            let mut req = client.post(url).json(body);
            for (name, value) in headers {
                req = req.header(*name, *value);
            }
            req
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn quiet_config() -> ScraperConfig {
        ScraperConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            jitter_ms: 0,
            ..ScraperConfig::default()
        }
    }

    /// Lower-cased request head, read up to the blank line.
    async fn read_head(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        String::from_utf8_lossy(&buf).to_lowercase()
    }

    #[test]
    fn builds_both_clients() {
        let client = HttpClient::new(&ScraperConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn cookies_do_not_carry_between_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let heads = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&heads);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let head = read_head(&mut stream).await;
                log.lock().unwrap().push(head);
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nSet-Cookie: session=quote-page; Path=/\r\n\
                          Content-Length: 2\r\nConnection: close\r\n\r\nok",
                    )
                    .await;
                let _ = stream.shutdown().await;
            }
        });

        let client = HttpClient::new(&quiet_config()).unwrap();
        client.get_text(&format!("http://{addr}/equities/abc-corp")).await.unwrap();
        client.get_text(&format!("http://{addr}/equities/abc-corp-ratios")).await.unwrap();

        let heads = heads.lock().unwrap().clone();
        assert_eq!(heads.len(), 2);
        assert!(heads[1].starts_with("get /equities/abc-corp-ratios"));
        assert!(!heads[1].contains("\r\ncookie:"), "{}", heads[1]);
    }

    #[tokio::test]
    async fn transport_failure_retries_once_without_verification() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                read_head(&mut stream).await;
                drop(stream);
            }
        });

        let client = HttpClient::new(&quiet_config()).unwrap();
        let err = client
            .get_text(&format!("http://{addr}/equities/abc-corp"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }), "{err}");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                read_head(&mut stream).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = stream.shutdown().await;
            }
        });

        let client = HttpClient::new(&quiet_config()).unwrap();
        let err = client.get_text(&format!("http://{addr}/missing")).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 404), "{err}");
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
