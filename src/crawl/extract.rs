// src/crawl/extract.rs
// =============================================================================
// This module pulls candidate links out of rendered HTML.
//
// Course sites hide their files in more places than <a href>, so we run an
// ordered list of link sources over the same parsed document:
//
//   1. <a href>
//   2. <iframe src>, <embed src>
//   3. data-url / data-href attributes
//   4. onclick="window.open('...')" and friends (matched, never executed)
//   5. <meta http-equiv="refresh" content="0; url=...">
//   6. <div class="resourceworkaround"> <a href> (Moodle's "click here" box)
//
// Every value is resolved against the page URL. The result keeps the first
// occurrence of each absolute URL, in the order the sources found them.
// =============================================================================

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// One way of finding raw link values in a document
type LinkSource = fn(&Html) -> Vec<String>;

const LINK_SOURCES: &[(&str, LinkSource)] = &[
    ("anchor", anchor_hrefs),
    ("frame", frame_sources),
    ("data-attribute", data_attributes),
    ("onclick", onclick_targets),
    ("meta-refresh", meta_refresh_targets),
    ("resource-workaround", resource_workaround_hrefs),
];

// Extracts all candidate links from HTML content
//
// Parameters:
//   html: the rendered HTML of the page
//   base_url: the URL of the page (for resolving relative links)
//
// Returns: unique absolute http(s) URLs, first-seen order
//
// Example:
//   html = "<a href='/a.pdf'></a><iframe src='/a.pdf'></iframe>"
//   base_url = "https://example.com/course"
//   result = ["https://example.com/a.pdf"]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Invalid base URL {}: {}", base_url, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for (source, find) in LINK_SOURCES {
        for raw in find(&document) {
            let Some(absolute) = resolve_url(&base, &raw) else {
                continue;
            };
            if seen.insert(absolute.clone()) {
                tracing::trace!(source, url = %absolute, "link found");
                links.push(absolute);
            }
        }
    }

    links
}

// Resolves a possibly-relative link to an absolute http(s) URL
//
// Skips pure fragments ("#top") and non-web schemes (mailto:, tel:,
// javascript:, data:), and anything that does not parse.
fn resolve_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let resolved = base.join(raw).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

// Selector::parse only fails on invalid CSS; all selectors here are constants
fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

fn attr_values(document: &Html, css: &str, attr: &str) -> Vec<String> {
    let selector = selector(css);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::to_string)
        .collect()
}

fn anchor_hrefs(document: &Html) -> Vec<String> {
    attr_values(document, "a[href]", "href")
}

fn frame_sources(document: &Html) -> Vec<String> {
    attr_values(document, "iframe[src], embed[src]", "src")
}

fn data_attributes(document: &Html) -> Vec<String> {
    let mut values = attr_values(document, "[data-url]", "data-url");
    values.extend(attr_values(document, "[data-href]", "data-href"));
    values
}

fn onclick_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:window\.open|location\.href|document\.location)\s*(?:\(|=)\s*['"]([^'"]+)['"]"#,
        )
        .unwrap()
    })
}

fn onclick_targets(document: &Html) -> Vec<String> {
    attr_values(document, "[onclick]", "onclick")
        .iter()
        .filter_map(|script| onclick_pattern().captures(script))
        .map(|caps| caps[1].to_string())
        .collect()
}

fn refresh_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)url\s*=\s*([^;]+)").unwrap())
}

fn meta_refresh_targets(document: &Html) -> Vec<String> {
    let selector = selector("meta[http-equiv][content]");
    document
        .select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .filter_map(|content| refresh_pattern().captures(content))
        .map(|caps| {
            caps[1]
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string()
        })
        .collect()
}

fn resource_workaround_hrefs(document: &Html) -> Vec<String> {
    attr_values(document, "div.resourceworkaround a[href]", "href")
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is `type LinkSource = fn(&Html) -> Vec<String>`?
//    - A plain function pointer type
//    - LINK_SOURCES is a list of them, so adding a new place to look for
//      links is one new function plus one line in the list
//
// 2. What is OnceLock?
//    - A value that is initialized the first time it is used, then reused
//    - Compiling a Regex is slow, so we only do it once per program run
//
// 3. Why `let Some(x) = ... else { continue; }`?
//    - let-else: bind the value if the pattern matches, otherwise run the
//      else block (which has to leave the loop iteration or function)
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::canon::canon_key;

    const BASE: &str = "https://moodle.example.edu/course/view.php?id=7";

    #[test]
    fn test_resolve_relative_link() {
        let links = extract_links(r#"<a href="/mod/page/view.php?id=1">x</a>"#, BASE);
        assert_eq!(links, vec!["https://moodle.example.edu/mod/page/view.php?id=1"]);
    }

    #[test]
    fn test_duplicate_anchors_kept_once_in_order() {
        let html = r#"
            <a href="/b.pdf">B</a>
            <a href="/a.pdf">A</a>
            <a href="https://moodle.example.edu/b.pdf">B again</a>
            <a href="/a.pdf">A again</a>
        "#;
        let links = extract_links(html, BASE);
        assert_eq!(
            links,
            vec![
                "https://moodle.example.edu/b.pdf",
                "https://moodle.example.edu/a.pdf",
            ]
        );
    }

    #[test]
    fn test_query_variants_stay_distinct() {
        let html = r#"
            <a href="/file.pdf?token=abc">1</a>
            <a href="/file.pdf?token=xyz">2</a>
        "#;
        let links = extract_links(html, BASE);
        assert_eq!(links.len(), 2);
        assert_eq!(canon_key(&links[0]), canon_key(&links[1]));
    }

    #[test]
    fn test_all_sources() {
        let html = r#"
            <html><head>
              <meta http-equiv="Refresh" content="0; URL='/redirected.pdf'">
            </head><body>
              <a href="/anchor.pdf">a</a>
              <iframe src="/frame.pdf"></iframe>
              <embed src="embed.pdf">
              <span data-url="/data-url.pdf"></span>
              <span data-href="/data-href.pdf"></span>
              <button onclick="window.open('/popup.pdf', '_blank')">open</button>
              <button onclick="location.href = '/assigned.pdf'">go</button>
              <div class="resourceworkaround">Click <a href="/workaround.pdf">here</a></div>
            </body></html>
        "#;
        let links = extract_links(html, BASE);
        let host = "https://moodle.example.edu";
        assert_eq!(
            links,
            vec![
                format!("{host}/anchor.pdf"),
                format!("{host}/workaround.pdf"),
                format!("{host}/frame.pdf"),
                format!("{host}/course/embed.pdf"),
                format!("{host}/data-url.pdf"),
                format!("{host}/data-href.pdf"),
                format!("{host}/popup.pdf"),
                format!("{host}/assigned.pdf"),
                format!("{host}/redirected.pdf"),
            ]
        );
    }

    #[test]
    fn test_skip_non_web_links() {
        let html = r##"
            <a href="#top">top</a>
            <a href="mailto:prof@example.edu">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="tel:123">call</a>
            <a href="">empty</a>
        "##;
        assert!(extract_links(html, BASE).is_empty());
    }

    #[test]
    fn test_every_onclick_navigation_form() {
        let html = r#"
            <button onclick="window.open('/open.pdf')">1</button>
            <button onclick="location.href = '/href-assign.pdf'">2</button>
            <button onclick="location.href('/href-call.pdf')">3</button>
            <button onclick="document.location = '/doc-assign.pdf'">4</button>
            <button onclick="document.location('/doc-call.pdf')">5</button>
            <button onclick='Window.Open("/double-quoted.pdf")'>6</button>
        "#;
        let host = "https://moodle.example.edu";
        assert_eq!(
            extract_links(html, BASE),
            vec![
                format!("{host}/open.pdf"),
                format!("{host}/href-assign.pdf"),
                format!("{host}/href-call.pdf"),
                format!("{host}/doc-assign.pdf"),
                format!("{host}/doc-call.pdf"),
                format!("{host}/double-quoted.pdf"),
            ]
        );
    }

    #[test]
    fn test_onclick_without_navigation_is_ignored() {
        let html = r#"<button onclick="toggle('/not-a-link.pdf')">x</button>"#;
        assert!(extract_links(html, BASE).is_empty());
    }

    #[test]
    fn test_meta_without_refresh_is_ignored() {
        let html = r#"<meta http-equiv="content-type" content="text/html; url=/nope.pdf">"#;
        assert!(extract_links(html, BASE).is_empty());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(extract_links(r#"<a href="/a.pdf">a</a>"#, "not a url").is_empty());
    }
}
