use crate::config::TopicConfig;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Joiners that make "X of Place" style titles part of the topic
const TITLE_JOINERS: &[&str] = &["in", "of", "from", "at"];

/// Predicate restricting which article and category URLs belong to the topic
///
/// A URL is in scope when it lives under `{wiki_base}/wiki/` and its title
///
/// - equals the place name or starts with `Place_` (`Nanjing`, `Nanjing_Metro`),
/// - ends with a joined place name, optionally followed by more words
///   (`History_of_Nanjing`, `Universities_in_Nanjing_Municipality`), or
/// - is a category whose name contains the place (`Category:Transport_in_Nanjing`).
#[derive(Debug, Clone)]
pub struct TopicScope {
    /// Place name as it appears in anchor text
    name: String,
    pattern: Regex,
}

impl TopicScope {
    /// Builds a scope for `name` on the encyclopedia rooted at `wiki_base`
    pub fn new(name: &str, wiki_base: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "topic name cannot be empty".to_string(),
            ));
        }

        let base = Url::parse(wiki_base).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid wiki_base '{}': {}", wiki_base, e))
        })?;
        let origin = base.origin().ascii_serialization();

        let title = regex::escape(&name.replace(' ', "_"));
        let joiners = TITLE_JOINERS.join("|");
        let pattern = format!(
            r"^{origin}/wiki/(?:{title}($|_)|[^:#]+_(?:{joiners})_{title}($|_)|Category:([^:]*{title}[^:]*)$)",
            origin = regex::escape(&origin),
            title = title,
            joiners = joiners,
        );

        let pattern = Regex::new(&pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("topic scope: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    /// Builds the scope described by the `[topic]` section
    pub fn from_config(config: &TopicConfig) -> Result<Self, ConfigError> {
        Self::new(&config.name, &config.wiki_base)
    }

    /// The configured place name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the URL belongs to the topic
    ///
    /// Percent-escapes are decoded first, so non-ASCII titles match however
    /// the link was encoded.
    pub fn is_in_topic_scope(&self, url: &str) -> bool {
        match urlencoding::decode(url) {
            Ok(decoded) => self.pattern.is_match(&decoded),
            Err(_) => self.pattern.is_match(url),
        }
    }

    /// Returns true if a piece of anchor text mentions the place
    pub fn mentions_topic(&self, text: &str) -> bool {
        text.contains(&self.name) || text.contains(&self.name.replace(' ', "_"))
    }
}
