//! 웹 스크래퍼 모듈 - URL 문서 소스
//!
//! URL에서 HTML을 가져와 제목과 본문 텍스트를 추출하고
//! `DocumentType::Url` 문서로 넘겨줍니다.

use async_trait::async_trait;
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::knowledge::DocumentType;

/// 본문 텍스트에서 제외하는 태그
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// 본문으로 인정하는 최소 길이 (바이트)
const MIN_CONTENT_LEN: usize = 100;

// ============================================================================
// Document Source
// ============================================================================

/// 외부에서 가져온 문서
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// 문서 이름 (제목, 없으면 위치)
    pub name: String,
    pub content: String,
    pub doc_type: DocumentType,
    /// 원본 위치 (URL 등)
    pub location: String,
}

/// 문서 소스 (URL 등 파일 시스템 밖의 입력)
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// 위치에서 문서 가져오기
    async fn fetch(&self, location: &str) -> Result<SourceDocument>;

    /// 소스 이름
    fn name(&self) -> &str;
}

// ============================================================================
// WebScraper
// ============================================================================

/// 스크랩된 페이지
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    /// 페이지 제목
    pub title: Option<String>,
    /// 본문 텍스트 (HTML 태그 제거됨)
    pub content: String,
    /// 원본 URL
    pub url: String,
}

impl ScrapedContent {
    /// 문서로 변환 (제목이 있으면 마크다운 헤더로 앞에 붙임)
    pub fn into_document(self) -> SourceDocument {
        let (name, content) = match self.title {
            Some(title) => {
                let content = format!("# {}\n\n{}", title, self.content);
                (title, content)
            }
            None => (self.url.clone(), self.content),
        };

        SourceDocument {
            name,
            content,
            doc_type: DocumentType::Url,
            location: self.url,
        }
    }
}

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("agentforge-kb/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// URL에서 콘텐츠 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        let url = parse_http_url(url)?;
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

        Ok(parse_html(&html, url.as_str()))
    }
}

impl Default for WebScraper {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("Failed to build configured HTTP client: {}", e);
            Self {
                client: reqwest::Client::new(),
            }
        })
    }
}

#[async_trait]
impl DocumentSource for WebScraper {
    async fn fetch(&self, location: &str) -> Result<SourceDocument> {
        let scraped = self.scrape(location).await?;
        if scraped.content.trim().is_empty() {
            tracing::warn!("No text content found at {}", location);
        }
        Ok(scraped.into_document())
    }

    fn name(&self) -> &str {
        "web"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// http/https URL만 허용
fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid URL: {}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("Unsupported URL scheme '{}': {}", other, raw),
    }
}

/// HTML 문서에서 제목과 본문 추출
fn parse_html(html: &str, url: &str) -> ScrapedContent {
    let document = Html::parse_document(html);
    ScrapedContent {
        title: extract_title(&document),
        content: extract_content(&document),
        url: url.to_string(),
    }
}

/// 제목 추출 (<title> → <h1>)
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].into_iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let title = collapse_whitespace(&element.text().collect::<String>());
        (!title.is_empty()).then_some(title)
    })
}

/// 본문 추출 (article > main > ... > body 순)
fn extract_content(document: &Html) -> String {
    let selectors = ["article", "main", "[role=main]", ".content", "#content", "body"];

    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = extract_text_from_element(element);
                if text.len() > MIN_CONTENT_LEN {
                    return text;
                }
            }
        }
    }

    // 폴백: 짧더라도 body 전체
    Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(extract_text_from_element)
        .unwrap_or_default()
}

/// 요소에서 텍스트 추출 (스크립트/스타일 제외)
fn extract_text_from_element(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| SKIPPED_TAGS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !skipped {
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
