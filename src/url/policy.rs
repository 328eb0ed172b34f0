use crate::ConfigError;
use regex::Regex;

/// Include/exclude regex policy applied to every frontier candidate
///
/// If any include patterns are configured, a URL must match at least one of
/// them; a URL matching any exclude pattern is always rejected.
#[derive(Debug, Clone, Default)]
pub struct PatternPolicy {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PatternPolicy {
    /// Compiles the policy from raw pattern strings
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    /// Returns true if the URL is allowed by the policy
    pub fn matches(&self, url: &str) -> bool {
        matches_policy(url, &self.include, &self.exclude)
    }
}

/// Checks a URL against compiled include and exclude patterns
///
/// Patterns are searched anywhere in the URL (unanchored), so anchoring is
/// left to the pattern author.
pub fn matches_policy(url: &str, include: &[Regex], exclude: &[Regex]) -> bool {
    if !include.is_empty() && !include.iter().any(|re| re.is_match(url)) {
        return false;
    }
    !exclude.iter().any(|re| re.is_match(url))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
        })
        .collect()
}
