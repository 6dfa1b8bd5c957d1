//! 웹 스크래퍼 모듈 - URL / HTML → 평문
//!
//! `script, style, nav, header, footer, svg`는 버리고 본문 텍스트만 남깁니다.
//! 블록 요소 경계는 빈 줄로 남겨 청커가 문단으로 나눌 수 있게 합니다.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::RagError;
use crate::extractor::{LoadedText, TextLoader};
use crate::knowledge::collapse_whitespace;

/// 본문에서 제외하는 요소
const EXCLUDED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "svg", "noscript", "template"];

/// 문단 경계로 취급하는 요소
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "aside", "li", "ul", "ol", "dl", "dt", "dd", "tr",
    "table", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "form",
];

/// 스크랩된 페이지
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub title: Option<String>,
    /// 본문 텍스트 (문단은 빈 줄로 구분)
    pub text: String,
    pub url: String,
}

// ============================================================================
// HTML → Text
// ============================================================================

/// HTML 문서를 평문으로 변환
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = match Selector::parse("body") {
        Ok(selector) => document.select(&selector).next(),
        Err(_) => None,
    }
    .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);

    raw.split("\n\n")
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if EXCLUDED_TAGS.contains(&name) {
                continue;
            }

            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push_str("\n\n");
            }
            collect_text(child_element, out);
            if block {
                out.push_str("\n\n");
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

/// 제목 추출 (`<title>`, 없으면 첫 `<h1>`)
fn extract_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(element) = document.select(&selector).next() {
                let title = collapse_whitespace(&element.text().collect::<String>());
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }
    None
}

/// http/https URL 검증
pub fn parse_url(raw: &str) -> Result<Url, RagError> {
    let url = Url::parse(raw.trim()).map_err(|e| RagError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RagError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

// ============================================================================
// WebScraper
// ============================================================================

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("asistente-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// URL에서 본문 추출
    pub async fn scrape(&self, raw_url: &str) -> Result<ScrapedPage> {
        let url = parse_url(raw_url)?;
        tracing::info!("Scraping: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP error status: {}", url))?;

        let html = response.text().await.context("Failed to read response body")?;
        let title = extract_title(&Html::parse_document(&html));
        let text = html_to_text(&html);

        Ok(ScrapedPage {
            title,
            text,
            url: raw_url.trim().to_string(),
        })
    }
}

#[async_trait]
impl TextLoader for WebScraper {
    async fn load(&self, target: &str) -> Result<Vec<LoadedText>> {
        let page = self.scrape(target).await?;
        if let Some(title) = &page.title {
            tracing::debug!("Fetched page: {}", title);
        }

        Ok(vec![LoadedText {
            source: page.url,
            text: page.text,
        }])
    }

    fn name(&self) -> &'static str {
        "web"
    }
}

// ============================================================================
// Tests
// ============================================================================
