use serde::{Deserialize, Deserializer};

/// Crawl policy loaded once at startup
///
/// Every field has an explicit default so a minimal file (or an empty one)
/// still produces a usable policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial URLs, enqueued at depth 0
    #[serde(deserialize_with = "flattened_list")]
    pub seeds: Vec<String>,

    /// Regexes a URL must match at least one of (when non-empty)
    #[serde(deserialize_with = "flattened_list")]
    pub include_patterns: Vec<String>,

    /// Regexes a URL must match none of
    #[serde(deserialize_with = "flattened_list")]
    pub exclude_patterns: Vec<String>,

    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,

    /// Whether robots.txt rules are consulted before fetching
    pub respect_robots: bool,

    pub topic: TopicConfig,
    pub user_agent: UserAgentConfig,
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            limits: LimitsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            respect_robots: true,
            topic: TopicConfig::default(),
            user_agent: UserAgentConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    /// Applies environment/CLI overrides, which take precedence over the file
    pub fn apply_overrides(&mut self, max_pages: Option<u64>, max_depth: Option<u32>) {
        if let Some(max_pages) = max_pages {
            self.limits.max_pages = max_pages;
        }
        if let Some(max_depth) = max_depth {
            self.limits.max_depth = max_depth;
        }
    }
}

/// Crawl budget
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Successful 200-path fetches after which the crawl stops
    pub max_pages: u64,

    /// Maximum BFS distance from a seed
    pub max_depth: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: 900,
            max_depth: 3,
        }
    }
}

/// Politeness and concurrency settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second allowed against a single host
    pub per_host_rps: f64,

    /// Number of concurrent workers
    pub max_parallel: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_host_rps: 2.0,
            max_parallel: 8,
        }
    }
}

/// Topic the crawl is restricted to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Place name used for title matching (spaces are treated as underscores)
    pub name: String,

    /// Origin of the encyclopedia, e.g. `https://en.wikipedia.org`
    pub wiki_base: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: "Nanjing".to_string(),
            wiki_base: "https://en.wikipedia.org".to_string(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "ANJSO-WikiCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://anjso.org/wiki".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// HTTP timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout for page requests, in seconds
    pub request_timeout_secs: u64,

    /// Timeout for each robots.txt attempt, in seconds
    pub robots_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 25,
            robots_timeout_secs: 10,
        }
    }
}

/// A list entry that may itself be a list
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEntry {
    One(String),
    Many(Vec<String>),
}

/// Accepts `["a", ["b", "c"]]` and yields `["a", "b", "c"]`
fn flattened_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<ListEntry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .flat_map(|entry| match entry {
            ListEntry::One(value) => vec![value],
            ListEntry::Many(values) => values,
        })
        .collect())
}
