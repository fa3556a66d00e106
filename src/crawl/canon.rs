// src/crawl/canon.rs
// =============================================================================
// URL helpers that do not need a browser:
// - canon_key: collapses URLs that only differ in query string or fragment
// - classification: is this link a PDF, a course content page, or neither?
// - file names: what a downloaded PDF is probably going to be called
// =============================================================================

use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Path fragments of course pages worth following
pub const CONTENT_PAGE_PATTERNS: &[&str] = &[
    "/mod/resource/view.php",
    "/mod/folder/view.php",
    "/mod/url/view.php",
    "/mod/book/view.php",
    "/mod/page/view.php",
];

/// Path fragments of scripts that serve files directly
pub const RESOURCE_PATH_PATTERNS: &[&str] = &["pluginfile.php"];

pub const RESOURCE_EXTENSIONS: &[&str] = &[".pdf"];

/// Maps a URL to a comparison key: scheme://host/path, lower-cased scheme
/// and host, no trailing slash, no query, no fragment.
///
/// Examples:
///   "HTTPS://Moodle.EDU/a/b.pdf?token=1#p2" -> "https://moodle.edu/a/b.pdf"
///   "https://moodle.edu/course/"           -> "https://moodle.edu/course"
pub fn canon_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("").to_lowercase();
            let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
            let path = parsed.path().trim_end_matches('/');
            format!("{}://{}{}{}", parsed.scheme(), host, port, path)
        }
        // Not a URL we can parse: cut query and fragment by hand
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            let trimmed = url[..end].trim_end_matches('/');
            lowercase_scheme_and_host(trimmed)
        }
    }
}

// "HTTP://Some Host/Path" -> "http://some host/Path"; no "://" means no
// scheme or host to lower-case, so the text is kept as it is
fn lowercase_scheme_and_host(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let host_start = scheme_end + 3;
    let host_end = url[host_start..]
        .find('/')
        .map_or(url.len(), |i| host_start + i);
    format!("{}{}", url[..host_end].to_lowercase(), &url[host_end..])
}

/// Several distinct URLs that collapse to the same canonical key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalCollision {
    pub key: String,
    pub urls: Vec<String>,
}

/// Groups `urls` by canonical key and returns the groups with more than one
/// member, in order of first appearance
pub fn find_canonical_collisions(urls: &[String]) -> Vec<CanonicalCollision> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for url in urls {
        let key = canon_key(url);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(url.clone());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let urls = groups.remove(&key)?;
            (urls.len() > 1).then_some(CanonicalCollision { key, urls })
        })
        .collect()
}

/// Links that are downloaded, not crawled:
/// anything ending in .pdf or served by pluginfile.php
pub fn looks_like_resource(url: &str) -> bool {
    let low = url.to_lowercase();
    let path_end = match Url::parse(&low) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => low.clone(),
    };
    RESOURCE_EXTENSIONS
        .iter()
        .any(|ext| low.ends_with(ext) || path_end.ends_with(ext))
        || RESOURCE_PATH_PATTERNS.iter().any(|p| low.contains(p))
}

/// Links to course pages that may contain more PDFs
pub fn looks_like_content_page(url: &str) -> bool {
    let low = url.to_lowercase();
    CONTENT_PAGE_PATTERNS.iter().any(|p| low.contains(p))
}

/// Replaces characters that are not allowed in file names
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Best guess at the file name a download will be saved under
///
/// "https://x.edu/pluginfile.php/9/Week%201.pdf?forcedownload=1" -> "Week 1.pdf"
pub fn guess_filename(url: &str) -> String {
    let last_segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let decoded = percent_decode(&last_segment);
    let mut name = if decoded.is_empty() {
        "file.pdf".to_string()
    } else {
        decoded
    };
    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    safe_name(&name)
}

fn percent_decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why build the canonical key by hand instead of using Url::to_string?
//    - to_string keeps the query and fragment, which is exactly what we
//      want to drop
//    - Url already lower-cases scheme and host, the path keeps its case
//
// 2. What does urlencoding::decode return?
//    - A Cow<str>: borrowed when nothing had to be decoded, owned otherwise
//    - into_owned() turns either case into a String
//
// 3. Why `then_some`?
//    - bool::then_some(x) is Some(x) when true and None when false, which
//      fits nicely inside filter_map
// -----------------------------------------------------------------------------
