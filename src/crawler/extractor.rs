//! Link extraction from fetched encyclopedia pages
//!
//! Category listings and articles are handled by two disjoint routines:
//!
//! - **Category pages** yield member articles, subcategories that mention the
//!   topic, and listing pagination links. Members are not topic-filtered; being
//!   in the category is the scope signal.
//! - **Article pages** yield every in-namespace link that passes
//!   [`TopicScope::is_in_topic_scope`].
//!
//! Every returned URL is canonical.

use crate::url::{canonicalize, TopicScope};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Anchor stored for category pagination edges
pub const PAGINATION_ANCHOR: &str = "cat-page";

/// Longest anchor text kept on an edge, in characters
const MAX_ANCHOR_CHARS: usize = 200;

const ARTICLE_PREFIX: &str = "/wiki/";

/// Namespaces that are never followed
const SKIPPED_NAMESPACES: &[&str] = &[
    "/wiki/Talk:",
    "/wiki/Help:",
    "/wiki/File:",
    "/wiki/Special:",
    "/wiki/Template:",
    "/wiki/Portal:",
];

const MEMBER_SELECTOR: &str = "#mw-pages a[href^='/wiki/']";
const SUBCATEGORY_SELECTOR: &str = "#mw-subcategories a[href^='/wiki/Category:']";
const PAGINATION_SELECTOR: &str = "#mw-pages a[href*='/w/index.php'][href*='title=Category:']";
const ARTICLE_SELECTOR: &str = "a[href^='/wiki/']";

/// A candidate link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Canonical absolute URL
    pub url: String,
    /// Collapsed, truncated anchor text
    pub anchor: String,
}

/// Returns true if the URL is a category listing (first page or paginated)
pub fn is_category_page(url: &str) -> bool {
    url.contains("/wiki/Category:")
        || (url.contains("/w/index.php") && url.contains("title=Category:"))
}

/// Extracts candidate links from a fetched page
///
/// # Arguments
///
/// * `page_url` - URL the HTML was fetched from; selects the mode and resolves hrefs
/// * `html` - The HTML content
/// * `scope` - Topic scope used for subcategory anchors and article links
///
/// Links are de-duplicated by URL; the first anchor seen wins.
pub fn extract_links(page_url: &Url, html: &str, scope: &TopicScope) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);

    let links = if is_category_page(page_url.as_str()) {
        extract_category_links(&document, page_url, scope)
    } else {
        extract_article_links(&document, page_url, scope)
    };

    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

fn extract_category_links(
    document: &Html,
    page_url: &Url,
    scope: &TopicScope,
) -> Vec<ExtractedLink> {
    let mut out = Vec::new();

    for a in select(document, MEMBER_SELECTOR) {
        let Some(url) = article_url(page_url, a) else {
            continue;
        };
        if !is_main_namespace(&url) {
            continue;
        }
        out.push(ExtractedLink {
            url,
            anchor: anchor_text(a),
        });
    }

    for a in select(document, SUBCATEGORY_SELECTOR) {
        let anchor = anchor_text(a);
        if !scope.mentions_topic(&anchor) {
            continue;
        }
        if let Some(url) = article_url(page_url, a) {
            out.push(ExtractedLink { url, anchor });
        }
    }

    for a in select(document, PAGINATION_SELECTOR) {
        let Some(url) = a.value().attr("href").and_then(|href| resolve(page_url, href)) else {
            continue;
        };
        out.push(ExtractedLink {
            url,
            anchor: PAGINATION_ANCHOR.to_string(),
        });
    }

    out
}

fn extract_article_links(
    document: &Html,
    page_url: &Url,
    scope: &TopicScope,
) -> Vec<ExtractedLink> {
    select(document, ARTICLE_SELECTOR)
        .into_iter()
        .filter_map(|a| {
            let url = article_url(page_url, a)?;
            scope.is_in_topic_scope(&url).then(|| ExtractedLink {
                url,
                anchor: anchor_text(a),
            })
        })
        .collect()
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Resolves an in-namespace href, skipping non-article namespaces
fn article_url(page_url: &Url, a: ElementRef<'_>) -> Option<String> {
    let href = a.value().attr("href")?;
    if !href.starts_with(ARTICLE_PREFIX)
        || SKIPPED_NAMESPACES.iter().any(|ns| href.starts_with(ns))
    {
        return None;
    }
    resolve(page_url, href)
}

fn resolve(page_url: &Url, href: &str) -> Option<String> {
    let joined = page_url.join(href).ok()?;
    canonicalize(joined.as_str())
}

/// Main-namespace titles carry no `Namespace:` prefix
fn is_main_namespace(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path()
                .strip_prefix(ARTICLE_PREFIX)
                .map(|title| !title.contains(':'))
        })
        .unwrap_or(false)
}

fn anchor_text(a: ElementRef<'_>) -> String {
    let text = a.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_ANCHOR_CHARS).collect()
}
