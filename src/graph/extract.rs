//! HTML extraction for link discovery and classification context
//!
//! This module parses fetched HTML to extract:
//! - Links to follow (from <a> and <area> tags)
//! - The page title, first heading, and a short body excerpt

use scraper::{Html, Selector};
use url::Url;

/// Maximum excerpt length in characters
const EXCERPT_MAX_CHARS: usize = 800;

/// How many leading paragraphs feed the excerpt
const EXCERPT_PARAGRAPHS: usize = 3;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// The first <h1> heading text
    pub heading: Option<String>,

    /// Up to the first three paragraphs, truncated to 800 characters
    pub excerpt: Option<String>,

    /// All followable links on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and descriptors
///
/// # Link Extraction Rules
///
/// **Include:** `<a href>` and `<area href>` elements.
///
/// **Exclude:** `javascript:`, `mailto:`, `tel:`, `data:` schemes,
/// fragment-only anchors, hrefs with a `download` attribute, and
/// anything that is not HTTP(S) after resolution against the base URL.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
pub fn extract_page(html: &str, base_url: &Url) -> PageContent {
    let document = Html::parse_document(html);

    PageContent {
        title: select_text(&document, "title"),
        heading: select_text(&document, "h1"),
        excerpt: extract_excerpt(&document),
        links: extract_links(&document, base_url),
    }
}

/// Text of the first element matching the selector, trimmed
fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Joins the first few paragraphs into a bounded excerpt
fn extract_excerpt(document: &Html) -> Option<String> {
    let selector = Selector::parse("p").ok()?;

    let paragraphs: Vec<String> = document
        .select(&selector)
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .take(EXCERPT_PARAGRAPHS)
        .collect();

    if paragraphs.is_empty() {
        return None;
    }

    let joined = paragraphs.join(" ");
    if joined.chars().count() <= EXCERPT_MAX_CHARS {
        Some(joined)
    } else {
        Some(joined.chars().take(EXCERPT_MAX_CHARS).collect())
    }
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for selector in ["a[href]", "area[href]"] {
        if let Ok(selector) = Selector::parse(selector) {
            for element in document.select(&selector) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                if let Some(href) = element.value().attr("href") {
                    if let Some(absolute_url) = resolve_link(href, base_url) {
                        links.push(absolute_url);
                    }
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - Invalid URLs or non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/archive/index.htm").unwrap()
    }

    #[test]
    fn test_extract_title_and_heading() {
        let html = r#"<html><head><title> Works Archive </title></head>
            <body><h1>Collected Works</h1></body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(page.title, Some("Works Archive".to_string()));
        assert_eq!(page.heading, Some("Collected Works".to_string()));
    }

    #[test]
    fn test_no_title_no_heading() {
        let html = r#"<html><body><p>text</p></body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(page.title, None);
        assert_eq!(page.heading, None);
    }

    #[test]
    fn test_excerpt_takes_first_three_paragraphs() {
        let html = r#"<html><body>
            <p>First.</p><p>Second.</p><p>Third.</p><p>Fourth.</p>
            </body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(page.excerpt, Some("First. Second. Third.".to_string()));
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let long = "x".repeat(2000);
        let html = format!("<html><body><p>{}</p></body></html>", long);
        let page = extract_page(&html, &base_url());
        assert_eq!(page.excerpt.unwrap().chars().count(), 800);
    }

    #[test]
    fn test_excerpt_collapses_whitespace() {
        let html = "<html><body><p>spread\n  over\n  lines</p></body></html>";
        let page = extract_page(html, &base_url());
        assert_eq!(page.excerpt, Some("spread over lines".to_string()));
    }

    #[test]
    fn test_extract_relative_link() {
        let html = r#"<html><body><a href="works.htm">Works</a></body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(page.links, vec!["https://example.com/archive/works.htm"]);
    }

    #[test]
    fn test_extract_area_links() {
        let html = r#"<html><body><map><area href="/map-target" /></map></body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(page.links, vec!["https://example.com/map-target"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r##"<html><body>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:a@example.com">mail</a>
            <a href="tel:+123">tel</a>
            <a href="data:text/html,x">data</a>
            <a href="#section">anchor</a>
            </body></html>"##;
        let page = extract_page(html, &base_url());
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_skip_download_links() {
        let html = r#"<html><body><a href="/file.pdf" download>get</a></body></html>"#;
        let page = extract_page(html, &base_url());
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_mixed_valid_and_invalid_links() {
        let html = r#"<html><body>
            <a href="/valid">ok</a>
            <a href="javascript:alert('no')">bad</a>
            <a href="https://other.com/page">offsite</a>
            </body></html>"#;
        let page = extract_page(html, &base_url());
        assert_eq!(
            page.links,
            vec!["https://example.com/valid", "https://other.com/page"]
        );
    }
}
