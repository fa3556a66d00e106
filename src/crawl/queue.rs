// src/crawl/queue.rs
// =============================================================================
// This module implements the course crawl with a breadth-first approach.
//
// How it works:
// 1. Start with the course page in a queue at depth 0
// 2. Fetch the page through the driver (a logged-in browser)
// 3. Extract all candidate links from the rendered HTML
// 4. PDFs are collected; course content pages on the same host are queued
//    one level deeper, as long as we are below the depth limit
// 5. Repeat until the queue is empty
//
// Boundaries:
// - Only the course host is ever crawled
// - A raw URL is fetched at most once
// =============================================================================

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

use super::canon::{
    find_canonical_collisions, looks_like_content_page, looks_like_resource, CanonicalCollision,
};
use super::extract::extract_links;
use crate::browser::PageDriver;
use crate::error::{HarvestError, Result};

// Represents a page in the crawl queue
#[derive(Debug, Clone)]
struct CrawlItem {
    url: String,
    depth: usize, // How many link hops away from the course page
}

/// Host and port a URL must share with the course page to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    host: String,
    port: Option<u16>,
}

impl Origin {
    fn of(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_lowercase(),
            port: url.port_or_known_default(),
        })
    }
}

/// What a finished crawl found
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub pages_visited: usize,
    pub fetch_failures: usize,
    /// PDF-like URLs in the order they were first seen
    pub resources: Vec<String>,
    /// Groups of resources that only differ in query string or fragment
    pub canonical_collisions: Vec<CanonicalCollision>,
}

pub struct Crawler {
    start_url: String,
    origin: Origin,
    max_depth: usize,
    queue: VecDeque<CrawlItem>,
    visited: HashSet<String>,
    resources: Vec<String>,
    resource_set: HashSet<String>,
    pages_visited: usize,
    fetch_failures: usize,
}

impl Crawler {
    /// Sets up a crawl of `start_url`, following links at most
    /// `max_depth` hops away from it
    pub fn new(start_url: &str, max_depth: usize) -> Result<Self> {
        // Parse and validate the course URL
        let start = Url::parse(start_url).map_err(|e| HarvestError::invalid_url(start_url, e))?;

        // Only web pages can be crawled
        if !matches!(start.scheme(), "http" | "https") {
            return Err(HarvestError::invalid_url(
                start_url,
                format!("scheme '{}' is not supported", start.scheme()),
            ));
        }

        // Every page we crawl has to share this host and port
        let origin = Origin::of(&start).ok_or_else(|| HarvestError::NoHost(start_url.to_string()))?;

        // The queue starts with just the course page
        // Url::to_string normalizes it the same way extracted links are
        let mut queue = VecDeque::new();
        queue.push_back(CrawlItem {
            url: start.to_string(),
            depth: 0,
        });

        Ok(Self {
            start_url: start.to_string(),
            origin,
            max_depth,
            queue,
            visited: HashSet::new(),
            resources: Vec::new(),
            resource_set: HashSet::new(),
            pages_visited: 0,
            fetch_failures: 0,
        })
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// Drains the queue, fetching every page through `driver`
    pub async fn run(&mut self, driver: &mut dyn PageDriver) {
        while let Some(item) = self.queue.pop_front() {
            // Skip if already visited
            if !self.visited.insert(item.url.clone()) {
                continue;
            }

            // The seed is the only item not checked at enqueue time
            if !self.on_origin(&item.url) {
                debug!("Skipping off-site page {}", item.url);
                continue;
            }

            info!("Crawling [depth {}]: {}", item.depth, item.url);

            // A page that fails to load is treated like an empty one
            let html = match driver.fetch_html(&item.url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", item.url, e);
                    self.fetch_failures += 1;
                    String::new()
                }
            };
            self.pages_visited += 1;

            // Sort every link on the page into PDFs and pages to visit next
            let links = extract_links(&html, &item.url);
            self.process_links(links, item.depth);
        }
        debug!(
            pages = self.pages_visited,
            pdfs = self.resources().len(),
            "crawl queue drained"
        );
    }

    fn process_links(&mut self, links: Vec<String>, depth: usize) {
        for link in links {
            if looks_like_resource(&link) {
                // PDFs are collected wherever they live, never crawled
                if self.resource_set.insert(link.clone()) {
                    debug!("Found PDF: {}", link);
                    self.resources.push(link);
                }
            } else if looks_like_content_page(&link)
                // Followed while below the depth limit and on the course host
                && depth < self.max_depth
                && self.on_origin(&link)
                && !self.visited.contains(&link)
            {
                self.queue.push_back(CrawlItem {
                    url: link,
                    depth: depth + 1,
                });
            }
        }
    }

    fn on_origin(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| Origin::of(&u))
            .is_some_and(|origin| origin == self.origin)
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn into_outcome(self) -> CrawlOutcome {
        // Links like a.pdf?token=1 and a.pdf?token=2 are kept apart but reported
        let canonical_collisions = find_canonical_collisions(&self.resources);
        for collision in &canonical_collisions {
            warn!(
                "{} PDF links share the key {} (kept separately)",
                collision.urls.len(),
                collision.key
            );
        }
        CrawlOutcome {
            pages_visited: self.pages_visited,
            fetch_failures: self.fetch_failures,
            resources: self.resources,
            canonical_collisions,
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is the crawl state a struct and not local variables?
//    - The queue, the visited set and the PDF list all belong to one crawl
//    - Keeping them as fields lets tests inspect them after run()
//    - run() borrows &mut self, so only one crawl step touches them at a time
//
// 2. Why &mut dyn PageDriver?
//    - dyn = "some type that implements PageDriver, decided at runtime"
//    - The same crawler drives Chrome, plain HTTP, or a fake in tests
//
// 3. Why two sets (visited, resource_set)?
//    - visited: pages we already fetched (raw URL match)
//    - resource_set: PDFs we already recorded, so the Vec keeps first-seen
//      order without duplicates
//
// 4. What is port_or_known_default()?
//    - The explicit port, or 443 for https and 80 for http when none is given
//    - So https://x.edu and https://x.edu:443 count as the same origin,
//      while https://x.edu:8443 does not
// -----------------------------------------------------------------------------
