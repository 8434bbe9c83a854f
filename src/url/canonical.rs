use crate::UrlError;
use url::Url;

/// File extensions that never contain crawlable HTML
const NON_HTML_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf", "txt", "epub", "mobi",
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff",
    "mp3", "mp4", "m4a", "ogg", "wav", "flac", "avi", "mov", "mkv", "webm", "wmv",
    "zip", "tar", "gz", "bz2", "7z", "rar", "iso", "dmg", "exe", "msi",
    "css", "js", "json", "xml", "rss", "atom", "woff", "woff2", "ttf", "eot",
];

/// Canonicalizes a URL into the single stored form
///
/// # Canonicalization Steps
///
/// 1. Strip all whitespace (pasted URLs are often line-wrapped)
/// 2. Parse the URL; reject if malformed or non-HTTP(S)
/// 3. Lowercase the scheme and host
/// 4. Remove the fragment
/// 5. Normalize the path: remove dot segments, collapse duplicate
///    slashes, drop the trailing slash except for the root path
///
/// The function is idempotent: canonicalizing an already-canonical URL
/// returns it unchanged.
///
/// # Arguments
///
/// * `raw` - The URL string as discovered (may be messy)
///
/// # Returns
///
/// * `Ok(String)` - The canonical form
/// * `Err(UrlError)` - Unparseable or unsupported URL
///
/// # Examples
///
/// ```
/// use arbor::url::canonicalize;
///
/// let url = canonicalize("HTTPS://Example.COM/a//b/../c/#top").unwrap();
/// assert_eq!(url, "https://example.com/a/c");
/// ```
pub fn canonicalize(raw: &str) -> Result<String, UrlError> {
    // Step 1: strip whitespace, including internal line breaks
    let cleaned: String = raw.split_whitespace().collect();
    if cleaned.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    // Step 2: parse (the url crate lowercases scheme and registered hosts)
    let mut url = Url::parse(&cleaned).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    // Step 4: remove fragment
    url.set_fragment(None);

    // Step 5: normalize path
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    Ok(url.to_string())
}

/// Normalizes a URL path: dot segments out, duplicate slashes collapsed,
/// trailing slash dropped except at the root
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Heuristic check for whether a URL plausibly points at an HTML page
///
/// URLs ending in a directory slash or with no file extension pass; known
/// binary and static-asset extensions are rejected. `.htm`/`.html` always
/// pass. Used to keep downloads and assets out of the frontier.
pub fn is_html_url(url_str: &str) -> bool {
    let path = match Url::parse(url_str) {
        Ok(url) => url.path().to_string(),
        Err(_) => return false,
    };

    if path.ends_with('/') {
        return true;
    }

    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        None => true,
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            if ext == "htm" || ext == "html" {
                return true;
            }
            !NON_HTML_EXTENSIONS.contains(&ext.as_str())
        }
    }
}
