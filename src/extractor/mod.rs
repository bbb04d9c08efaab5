//! 콘텐츠 추출 모듈
//!
//! 수집된 파일에서 문서로 추가할 텍스트를 추출합니다.
//! - 텍스트/마크다운/코드/CSV: 직접 읽기
//! - PDF: pdf-extract로 페이지별 추출

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::knowledge::DocumentType;

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub text: String,
    pub doc_type: DocumentType,
    /// PDF 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
    /// 총 페이지 수 (PDF)
    pub total_pages: Option<usize>,
}

impl ExtractedContent {
    /// 문서 이름 (PDF는 페이지 번호 포함)
    pub fn document_name(&self, file_name: &str) -> String {
        match (self.page_number, self.total_pages) {
            (Some(page), Some(total)) if total > 1 => format!("{} (Page {})", file_name, page),
            _ => file_name.to_string(),
        }
    }
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 콘텐츠 추출
    pub async fn extract(&self, path: &Path, doc_type: DocumentType) -> Result<Vec<ExtractedContent>> {
        match doc_type {
            DocumentType::Pdf => self.extract_pdf(path).await,
            DocumentType::Url => {
                anyhow::bail!("URL documents are fetched by a document source, not read from {:?}", path)
            }
            _ => self.extract_text(path, doc_type).await,
        }
    }

    /// 텍스트 파일에서 추출 (UTF-8이 아니면 손실 변환)
    async fn extract_text(&self, path: &Path, doc_type: DocumentType) -> Result<Vec<ExtractedContent>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Non UTF-8 content in {:?}, decoding lossily", path);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(vec![ExtractedContent {
            text,
            doc_type,
            page_number: None,
            total_pages: None,
        }])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&path))
            .await
            .context("PDF extraction task failed")??;

        let total_pages = pages.len();

        Ok(pages
            .into_iter()
            .map(|page| ExtractedContent {
                text: page.text,
                doc_type: DocumentType::Pdf,
                page_number: Some(page.number),
                total_pages: Some(total_pages),
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome content.").unwrap();

        let contents = ContentExtractor::new()
            .extract(&path, DocumentType::Markdown)
            .await
            .unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].text, "# Notes\n\nSome content.");
        assert_eq!(contents[0].doc_type, DocumentType::Markdown);
        assert_eq!(contents[0].document_name("notes.md"), "notes.md");
    }

    #[tokio::test]
    async fn test_extract_non_utf8_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        let contents = ContentExtractor::new()
            .extract(&path, DocumentType::Text)
            .await
            .unwrap();
        assert!(contents[0].text.starts_with("caf"));
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let result = ContentExtractor::new()
            .extract(Path::new("/nonexistent/file.txt"), DocumentType::Text)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_rejects_url_type() {
        let result = ContentExtractor::new()
            .extract(Path::new("page.html"), DocumentType::Url)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_document_name_for_pages() {
        let page = ExtractedContent {
            text: "text".to_string(),
            doc_type: DocumentType::Pdf,
            page_number: Some(2),
            total_pages: Some(5),
        };
        assert_eq!(page.document_name("paper.pdf"), "paper.pdf (Page 2)");

        let single = ExtractedContent {
            total_pages: Some(1),
            page_number: Some(1),
            ..page
        };
        assert_eq!(single.document_name("paper.pdf"), "paper.pdf");
    }
}
