//! Map-listing engine backed by a headless Chromium dump.
//!
//! Spawns the browser with `--dump-dom` against a Google Maps search URL and
//! pulls listing anchors out of the rendered HTML. The child process is the
//! only resource: it is created per fetch and reaped on every exit path
//! (`kill_on_drop` covers the timeout).

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::process::Command;
use tokio::time::timeout;

use super::{looks_blocked, EngineError, StageEngine, StageResult};

const MAX_LISTINGS: usize = 20;

pub struct ChromeMapEngine {
    binary: String,
    timeout: Duration,
}

impl ChromeMapEngine {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StageEngine for ChromeMapEngine {
    fn name(&self) -> &'static str {
        "google-maps"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError> {
        let url = format!(
            "https://www.google.com/maps/search/{}?hl=en",
            urlencoding::encode(query)
        );

        // Fresh profile per fetch so state never leaks between queries.
        let profile = tempfile::tempdir()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-notifications")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg("--virtual-time-budget=10000")
            .arg("--dump-dom")
            .arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(url = %url, "Launching headless browser for map listings");

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| EngineError::Launch {
                command: self.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if looks_blocked(&stderr.to_lowercase()) {
                return Err(EngineError::Blocked(stderr));
            }
            return Err(EngineError::Process {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let html = String::from_utf8_lossy(&output.stdout);
        if looks_blocked(&html.to_lowercase()) {
            return Err(EngineError::Blocked("challenge page in map DOM".to_string()));
        }

        parse_map_listings(&html)
    }
}

/// Extract listing anchors (`/maps/place/` links) from the dumped DOM.
fn parse_map_listings(html: &str) -> Result<Vec<StageResult>, EngineError> {
    let doc = Html::parse_document(html);
    let anchors = Selector::parse(r#"a[href*="/maps/place/"]"#)
        .map_err(|e| EngineError::Parse(format!("{e:?}")))?;

    let mut seen_links: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    for element in doc.select(&anchors) {
        let href = element.value().attr("href").unwrap_or_default();
        if href.is_empty() {
            continue;
        }
        let link = absolutize(href);
        if !seen_links.insert(link.clone()) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ");
        let title = element
            .value()
            .attr("aria-label")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| text.trim().to_string());
        if title.is_empty() {
            continue;
        }

        results.push(StageResult {
            title,
            detail: text.trim().to_string(),
            link,
        });
        if results.len() >= MAX_LISTINGS {
            break;
        }
    }

    Ok(results)
}

fn absolutize(href: &str) -> String {
    if href.starts_with('/') {
        format!("https://www.google.com{href}")
    } else {
        href.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_anchors_with_aria_labels() {
        let html = r#"
            <html><body>
              <a href="/maps/place/Iron+Gym" aria-label="Iron Gym">Iron Gym · 020 7946 0000 · gym@example.com</a>
              <a href="/maps/place/Flow+Yoga" aria-label="Flow Yoga">Flow Yoga · Studio</a>
              <a href="/search/other">not a place</a>
            </body></html>
        "#;
        let results = parse_map_listings(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Iron Gym");
        assert!(results[0].link.starts_with("https://www.google.com/maps/place/"));
        assert!(results[0].detail.contains("gym@example.com"));
    }

    #[test]
    fn duplicate_place_links_collapse() {
        let html = r#"
            <a href="/maps/place/Iron+Gym" aria-label="Iron Gym">Iron Gym</a>
            <a href="/maps/place/Iron+Gym" aria-label="Iron Gym">Iron Gym again</a>
        "#;
        let results = parse_map_listings(html).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn caps_at_twenty_listings() {
        let mut html = String::new();
        for i in 0..30 {
            html.push_str(&format!(
                r#"<a href="/maps/place/p{i}" aria-label="Place {i}">Place {i}</a>"#
            ));
        }
        let results = parse_map_listings(&html).unwrap();
        assert_eq!(results.len(), MAX_LISTINGS);
    }
}
