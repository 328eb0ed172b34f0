use url::Url;

/// Query actions that turn an article URL into an editor view
const EDIT_ACTIONS: &[&str] = &["edit"];

/// Canonicalizes a URL into the form used as the frontier dedup key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed, not http(s), or host-less
/// 2. Remove the fragment (everything after #)
/// 3. Keep the query string as-is
/// 4. Reject edit-action URLs (`action=edit`); these are never crawlable
///
/// The result is the `url` crate's serialization, so host case and empty
/// paths are normalized and `canonicalize(canonicalize(u)) == canonicalize(u)`.
///
/// # Examples
///
/// ```
/// use anjso_crawler::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://en.wikipedia.org/wiki/Nanjing#History").as_deref(),
///     Some("https://en.wikipedia.org/wiki/Nanjing")
/// );
/// assert_eq!(
///     canonicalize("https://en.wikipedia.org/w/index.php?title=X&action=edit"),
///     None
/// );
/// ```
pub fn canonicalize(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.host_str()?;

    parsed.set_fragment(None);

    if is_edit_action(&parsed) {
        return None;
    }

    Some(parsed.to_string())
}

fn is_edit_action(url: &Url) -> bool {
    url.query().is_some()
        && url
            .query_pairs()
            .any(|(key, value)| key == "action" && EDIT_ACTIONS.contains(&value.as_ref()))
}

/// Returns the key used for per-host bookkeeping (robots cache, rate limiter)
///
/// The host is lowercased and an explicit port is kept, so two servers on the
/// same machine are treated as different hosts.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use anjso_crawler::url::host_key;
///
/// let url = Url::parse("https://EN.wikipedia.org/wiki/Nanjing").unwrap();
/// assert_eq!(host_key(&url), Some("en.wikipedia.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/wiki/Nanjing").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
