//! PDF 텍스트 추출
//!
//! pdf-extract로 전체 텍스트를 뽑은 뒤 페이지 단위로 나눕니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// 추출된 PDF 페이지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    /// 1부터 시작
    pub number: usize,
    pub text: String,
}

/// PDF 파일에서 페이지별 텍스트 추출
///
/// 텍스트가 전혀 없으면 (스캔 문서 등) 빈 목록을 반환합니다.
pub fn extract_pages(path: &Path) -> Result<Vec<PdfPage>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| PdfPage { number: i + 1, text })
        .collect())
}

/// 페이지 구분선 (예: "--- Page 3 ---", "=== 3 ===")
fn page_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?m)^\s*[-=]+\s*(?:Page\s*)?\d+\s*[-=]+\s*$").expect("valid page marker regex")
    })
}

/// 텍스트를 페이지별로 분리
///
/// 폼피드(`\x0c`) 우선, 없으면 페이지 구분선, 둘 다 없으면 전체가 한 페이지입니다.
pub fn split_pages(text: &str) -> Vec<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    let marker = page_marker();
    if marker.is_match(text) {
        let pages: Vec<String> = marker
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    let whole = text.trim();
    if whole.is_empty() {
        vec![]
    } else {
        vec![whole.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0c\x0cPage 3 content";
        let pages = split_pages(text);
        assert_eq!(pages, vec!["Page 1 content", "Page 2 content", "Page 3 content"]);
    }

    #[test]
    fn test_split_pages_with_markers() {
        let text = "Intro text\n--- Page 2 ---\nSecond page\n=== 3 ===\nThird page";
        let pages = split_pages(text);
        assert_eq!(pages, vec!["Intro text", "Second page", "Third page"]);
    }

    #[test]
    fn test_split_pages_no_separator() {
        let pages = split_pages("  Just some text without page breaks ");
        assert_eq!(pages, vec!["Just some text without page breaks"]);
        assert!(split_pages("   ").is_empty());
    }

    #[test]
    fn test_extract_pages_missing_file() {
        assert!(extract_pages(Path::new("/nonexistent/file.pdf")).is_err());
    }
}
