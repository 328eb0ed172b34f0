//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the HTTP client with the crawler's user agent
//! - Conditional GET with stored validators
//! - Classifying responses into the outcomes the worker acts on

use crate::config::UserAgentConfig;
use crate::storage::Validators;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Status recorded for attempts that never produced an HTTP response
pub const TRANSPORT_ERROR_STATUS: i64 = -1;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server confirmed the stored validators (304)
    NotModified,

    /// A 200 response with an HTML body
    Fetched {
        /// HTTP status code
        status: u16,
        /// New ETag, if any
        etag: Option<String>,
        /// New Last-Modified, if any
        last_modified: Option<String>,
        /// Raw response body
        body: Vec<u8>,
    },

    /// Any other status, or a 200 that is not HTML
    Rejected {
        /// HTTP status code
        status: u16,
        /// Content-Type header value (empty if absent)
        content_type: String,
    },

    /// Timeout, DNS, connection or body read failure
    TransportError {
        /// Error description
        error: String,
    },
}

impl FetchOutcome {
    /// Status to record in the fetch log
    pub fn status(&self) -> i64 {
        match self {
            FetchOutcome::NotModified => StatusCode::NOT_MODIFIED.as_u16() as i64,
            FetchOutcome::Fetched { status, .. } | FetchOutcome::Rejected { status, .. } => {
                *status as i64
            }
            FetchOutcome::TransportError { .. } => TRANSPORT_ERROR_STATUS,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout for page fetches
///
/// # Example
///
/// ```no_run
/// use anjso_crawler::config::UserAgentConfig;
/// use anjso_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(25)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true if a Content-Type header denotes an HTML document
pub fn is_html(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Fetches a URL, sending the stored validators as conditional headers
///
/// # Request Flow
///
/// | Response | Outcome |
/// |----------|---------|
/// | 304 | `NotModified` |
/// | 200 + `text/html` | `Fetched` with body and new validators |
/// | 200 other type, any other status | `Rejected` |
/// | timeout, connect, body read error | `TransportError` |
///
/// Redirects are followed by the client; the outcome always refers to the
/// requested URL.
pub async fn conditional_get(client: &Client, url: &str, validators: &Validators) -> FetchOutcome {
    let mut request = client.get(url);
    if let Some(etag) = &validators.etag {
        request = request.header(IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &validators.last_modified {
        request = request.header(IF_MODIFIED_SINCE, last_modified);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchOutcome::TransportError {
                error: describe_error(&e),
            }
        }
    };

    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        return FetchOutcome::NotModified;
    }

    let content_type = header_string(&response, CONTENT_TYPE).unwrap_or_default();
    if status != StatusCode::OK || !is_html(&content_type) {
        return FetchOutcome::Rejected {
            status: status.as_u16(),
            content_type,
        };
    }

    let etag = header_string(&response, ETAG);
    let last_modified = header_string(&response, LAST_MODIFIED);

    match response.bytes().await {
        Ok(body) => FetchOutcome::Fetched {
            status: status.as_u16(),
            etag,
            last_modified,
            body: body.to_vec(),
        },
        Err(e) => FetchOutcome::TransportError {
            error: describe_error(&e),
        },
    }
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timeout: {}", e)
    } else if e.is_connect() {
        format!("connect: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Client {
        build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap()
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=UTF-8")
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&UserAgentConfig::default(), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("Text/HTML; charset=utf-8"));
        assert!(!is_html("application/json"));
        assert!(!is_html(""));
    }

    #[tokio::test]
    async fn test_fetch_html_with_validators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/Nanjing"))
            .and(header("user-agent", "ANJSO-WikiCrawler/1.0 (+https://anjso.org/wiki)"))
            .respond_with(
                html("<html></html>")
                    .insert_header("etag", "\"v1\"")
                    .insert_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/wiki/Nanjing", server.uri());
        let outcome = conditional_get(&client(), &url, &Validators::default()).await;

        match outcome {
            FetchOutcome::Fetched {
                status,
                etag,
                last_modified,
                body,
                ..
            } => {
                assert_eq!(status, 200);
                assert_eq!(etag.as_deref(), Some("\"v1\""));
                assert_eq!(
                    last_modified.as_deref(),
                    Some("Wed, 21 Oct 2015 07:28:00 GMT")
                );
                assert_eq!(body, b"<html></html>");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conditional_headers_yield_not_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/Nanjing"))
            .and(header("if-none-match", "\"v1\""))
            .and(header_exists("if-modified-since"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let validators = Validators {
            etag: Some("\"v1\"".to_string()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        };
        let url = format!("{}/wiki/Nanjing", server.uri());
        let outcome = conditional_get(&client(), &url, &validators).await;

        assert!(matches!(outcome, FetchOutcome::NotModified));
        assert_eq!(outcome.status(), 304);
    }

    #[tokio::test]
    async fn test_last_modified_alone_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("if-modified-since"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let validators = Validators {
            etag: None,
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        };
        let outcome = conditional_get(&client(), &server.uri(), &validators).await;
        assert!(matches!(outcome, FetchOutcome::NotModified));
    }

    #[tokio::test]
    async fn test_non_html_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;

        let outcome = conditional_get(&client(), &server.uri(), &Validators::default()).await;
        match outcome {
            FetchOutcome::Rejected {
                status,
                content_type,
            } => {
                assert_eq!(status, 200);
                assert_eq!(content_type, "application/json");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = conditional_get(&client(), &server.uri(), &Validators::default()).await;
        assert!(matches!(outcome, FetchOutcome::Rejected { status: 404, .. }));
        assert_eq!(outcome.status(), 404);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let outcome =
            conditional_get(&client(), "http://127.0.0.1:1/wiki/Nanjing", &Validators::default())
                .await;
        assert!(matches!(outcome, FetchOutcome::TransportError { .. }));
        assert_eq!(outcome.status(), TRANSPORT_ERROR_STATUS);
    }
}
