//! Fallback search engine: DuckDuckGo's HTML endpoint over plain HTTP.
//!
//! No browser needed, which is exactly why it is the fallback: when the
//! primary engine's browser gets challenged, this path usually still works.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{Html, Selector};

use super::{looks_blocked, EngineError, StageEngine, StageResult};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

pub struct DuckDuckGoEngine {
    client: reqwest::Client,
}

impl DuckDuckGoEngine {
    pub fn new() -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StageEngine for DuckDuckGoEngine {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StageResult>, EngineError> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .send()
            .await?;

        if resp.status().as_u16() == 403 {
            return Err(EngineError::Blocked("HTTP 403 from search".to_string()));
        }

        let body = resp.text().await?;
        if looks_blocked(&body.to_lowercase()) {
            return Err(EngineError::Blocked(
                "challenge page in search response".to_string(),
            ));
        }

        parse_results(&body)
    }
}

fn parse_results(html: &str) -> Result<Vec<StageResult>, EngineError> {
    let doc = Html::parse_document(html);
    let result_sel =
        Selector::parse(".result").map_err(|e| EngineError::Parse(format!("{e:?}")))?;
    let title_sel =
        Selector::parse("a.result__a").map_err(|e| EngineError::Parse(format!("{e:?}")))?;
    let snippet_sel =
        Selector::parse(".result__snippet").map_err(|e| EngineError::Parse(format!("{e:?}")))?;

    let mut results = Vec::new();
    for result in doc.select(&result_sel) {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let link = resolve_redirect(anchor.value().attr("href").unwrap_or_default());
        if title.is_empty() || !link.starts_with("http") {
            continue;
        }
        let detail = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        results.push(StageResult { title, detail, link });
    }
    Ok(results)
}

/// Result links come wrapped in a `/l/?uddg=<encoded>` redirect.
fn resolve_redirect(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let encoded = href[idx + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_organic_results() {
        let html = r#"
            <div class="result">
              <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example%2Fprofile&rut=x">Jane | Personal Trainer</a>
              <a class="result__snippet">Email me at jane@x.com for sessions in London</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://b.example/page">Plain link result</a>
            </div>
        "#;
        let results = parse_results(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link, "https://a.example/profile");
        assert!(results[0].detail.contains("jane@x.com"));
        assert_eq!(results[1].detail, "");
    }

    #[test]
    fn redirect_decoding_falls_back_gracefully() {
        assert_eq!(
            resolve_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fx.example"),
            "https://x.example"
        );
        assert_eq!(
            resolve_redirect("//duckduckgo.com/html/"),
            "https://duckduckgo.com/html/"
        );
        assert_eq!(resolve_redirect("https://direct.example"), "https://direct.example");
    }

    #[test]
    fn results_without_anchor_are_skipped() {
        let html = r#"<div class="result"><span>no anchor</span></div>"#;
        assert!(parse_results(html).unwrap().is_empty());
    }
}
