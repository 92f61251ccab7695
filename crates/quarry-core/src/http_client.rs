use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;

/// HTTP request envelope used by scraper fetches.
///
/// The timeout is mandatory; a fetch that exceeds it surfaces as a transient
/// [`FetchError::Timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The request URL with query pairs appended, used by transports that
    /// take a single URL string.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let encoded = self
            .query
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, encoded)
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Source client transport contract.
///
/// One call performs one HTTP fetch; no state is retained between calls.
pub trait HttpClient: Send + Sync {
    fn fetch<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, FetchError>> + Send + 'a>>;
}

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: Option<&str>) -> Self {
        let builder = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(concat!("quarry/", env!("CARGO_PKG_VERSION"))));
        Self {
            client: Arc::new(builder.build().unwrap_or_else(|_| reqwest::Client::new())),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpClient for ReqwestHttpClient {
    fn fetch<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let timeout_ms = request.timeout.as_millis() as u64;
            let mut builder = self
                .client
                .get(request.full_url())
                .timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { timeout_ms }
                } else if e.is_connect() {
                    FetchError::Connect {
                        detail: e.to_string(),
                    }
                } else {
                    FetchError::Connect {
                        detail: format!("request failed: {e}"),
                    }
                }
            })?;

            let status = response.status().as_u16();
            if status == 429 {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(60);
                return Err(FetchError::RateLimited { retry_after_secs });
            }

            let body = response.text().await.map_err(|e| FetchError::Parse {
                detail: format!("failed to read response body: {e}"),
            })?;

            if !(200..300).contains(&status) {
                return Err(FetchError::Status { code: status });
            }

            Ok(HttpResponse { status, body })
        })
    }
}
