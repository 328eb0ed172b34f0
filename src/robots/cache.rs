//! Robots.txt caching implementation
//!
//! Each host moves through `unknown -> fetched | unreachable` exactly once per
//! process. Concurrent first checks for the same host share a single fetch.

use crate::robots::{ParsedRobots, RobotsPolicy};
use crate::url::host_key;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Schemes tried, in order, when retrieving `/robots.txt`
const ROBOTS_SCHEMES: &[&str] = &["https", "http"];

/// Resolved robots.txt state for one host
#[derive(Debug, Clone)]
pub enum HostRobots {
    /// Rules were retrieved and parsed
    Fetched { rules: ParsedRobots },
    /// No usable robots.txt; every URL is allowed
    Unreachable,
}

impl HostRobots {
    /// Checks a URL against the cached state
    pub fn is_allowed(&self, url: &str) -> bool {
        match self {
            HostRobots::Fetched { rules } => rules.is_allowed(url),
            HostRobots::Unreachable => true,
        }
    }
}

/// Process-lifetime robots.txt cache with a fail-open default
pub struct RobotsCache {
    client: Client,
    timeout: Duration,
    hosts: Mutex<HashMap<String, Arc<OnceCell<HostRobots>>>>,
}

impl RobotsCache {
    /// Creates an empty cache that fetches with `client`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client carrying the crawler's user agent
    /// * `timeout` - Bound for each robots.txt attempt
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the resolved state for a host, fetching it on first use
    pub async fn host_robots(&self, host: &str) -> HostRobots {
        let cell = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| fetch_robots(&self.client, host, self.timeout))
            .await
            .clone()
    }

    /// Number of hosts resolved so far
    pub fn len(&self) -> usize {
        self.hosts.lock().map(|hosts| hosts.len()).unwrap_or(0)
    }

    /// Returns true if no host has been checked yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RobotsPolicy for RobotsCache {
    async fn can_fetch(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return true;
        };
        self.host_robots(&host).await.is_allowed(url.as_str())
    }
}

/// Fetches robots.txt for a host, HTTPS first and then HTTP
///
/// A non-200 status, an empty body or a transport error on every attempt
/// yields [`HostRobots::Unreachable`] and a warning.
pub async fn fetch_robots(client: &Client, host: &str, timeout: Duration) -> HostRobots {
    for scheme in ROBOTS_SCHEMES {
        let robots_url = format!("{}://{}/robots.txt", scheme, host);

        let response = match client
            .get(&robots_url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt request failed");
                continue;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::debug!(
                url = %robots_url,
                status = response.status().as_u16(),
                "robots.txt not available"
            );
            continue;
        }

        match response.text().await {
            Ok(body) if !body.trim().is_empty() => {
                tracing::debug!(host, "robots.txt cached");
                return HostRobots::Fetched {
                    rules: ParsedRobots::from_content(&body),
                };
            }
            Ok(_) => {
                tracing::debug!(url = %robots_url, "robots.txt is empty");
            }
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "failed to read robots.txt body");
            }
        }
    }

    tracing::warn!(host, "robots.txt unreadable; allowing by policy");
    HostRobots::Unreachable
}
