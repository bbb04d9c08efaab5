//! 지식베이스 데이터 모델
//!
//! KnowledgeBase → Document → DocumentChunk 소유 관계와
//! 지식베이스 설정(검증 포함)을 정의합니다.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{KnowledgeError, KnowledgeResult};

use super::chunker::{ChunkConfig, DEFAULT_CHUNK_SIZE};
use super::scorer::TermVector;

/// 기본 검색 결과 개수
pub const DEFAULT_TOP_K: usize = 5;

// ============================================================================
// Settings
// ============================================================================

/// 지식베이스 설정
///
/// 생성/수정 시점에 검증되며, 범위를 벗어난 값은 보정 없이 거부됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseSettings {
    /// 목표 청크 크기 (문자 수, 1 이상)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수, chunk_size 미만)
    pub chunk_overlap: usize,
    /// 기본 검색 결과 개수 (1 이상)
    pub retrieval_top_k: usize,
    /// 최소 유사도 점수 (0.0 ~ 1.0)
    #[serde(default)]
    pub score_threshold: Option<f64>,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_SIZE / 10,
            retrieval_top_k: DEFAULT_TOP_K,
            score_threshold: None,
        }
    }
}

impl KnowledgeBaseSettings {
    /// 설정 값 검증
    pub fn validate(&self) -> KnowledgeResult<()> {
        if self.chunk_size == 0 {
            return Err(KnowledgeError::validation("chunk_size must be a positive integer"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(KnowledgeError::validation(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_top_k == 0 {
            return Err(KnowledgeError::validation(
                "retrieval_top_k must be a positive integer",
            ));
        }
        if let Some(threshold) = self.score_threshold {
            if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
                return Err(KnowledgeError::validation(format!(
                    "score_threshold ({}) must be between 0.0 and 1.0",
                    threshold
                )));
            }
        }
        Ok(())
    }

    /// 기본값에 생성 시 오버라이드 적용
    ///
    /// chunk_size만 지정되면 오버랩은 chunk_size / 10 으로 맞춥니다.
    pub fn with_overrides(&self, overrides: &SettingsUpdate) -> Self {
        let mut merged = self.apply(overrides);
        if overrides.chunk_size.is_some() && overrides.chunk_overlap.is_none() {
            merged.chunk_overlap = merged.chunk_size / 10;
        }
        merged
    }

    /// 기존 설정에 부분 수정 적용
    pub fn apply(&self, update: &SettingsUpdate) -> Self {
        Self {
            chunk_size: update.chunk_size.unwrap_or(self.chunk_size),
            chunk_overlap: update.chunk_overlap.unwrap_or(self.chunk_overlap),
            retrieval_top_k: update.retrieval_top_k.unwrap_or(self.retrieval_top_k),
            score_threshold: update.score_threshold.unwrap_or(self.score_threshold),
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }
}

/// 설정 부분 수정
///
/// `score_threshold: Some(None)` 은 임계값 제거를 뜻합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    #[serde(default)]
    pub retrieval_top_k: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<Option<f64>>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.chunk_size.is_none()
            && self.chunk_overlap.is_none()
            && self.retrieval_top_k.is_none()
            && self.score_threshold.is_none()
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// 지식베이스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub settings: KnowledgeBaseSettings,
    /// 소속 문서 ID (추가 순서)
    pub document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 지식베이스 수정 입력
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<SettingsUpdate>,
}

/// 지식베이스 목록 필터
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseFilter {
    pub owner_id: Option<String>,
    /// 이름 부분 일치 (대소문자 무시)
    pub name_contains: Option<String>,
}

impl KnowledgeBaseFilter {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, kb: &KnowledgeBase) -> bool {
        if let Some(ref owner) = self.owner_id {
            if &kb.owner_id != owner {
                return false;
            }
        }
        if let Some(ref needle) = self.name_contains {
            if !kb.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Document
// ============================================================================

/// 문서 타입
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// 일반 텍스트
    #[default]
    Text,
    /// 마크다운
    Markdown,
    /// URL에서 가져온 콘텐츠
    Url,
    /// 소스 코드
    Code,
    /// CSV
    Csv,
    /// PDF에서 추출한 텍스트
    Pdf,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Text,
        DocumentType::Markdown,
        DocumentType::Url,
        DocumentType::Code,
        DocumentType::Csv,
        DocumentType::Pdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Text => "text",
            DocumentType::Markdown => "markdown",
            DocumentType::Url => "url",
            DocumentType::Code => "code",
            DocumentType::Csv => "csv",
            DocumentType::Pdf => "pdf",
        }
    }

    /// 확장자로 문서 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "txt" | "text" | "log" => Some(DocumentType::Text),
            "md" | "markdown" | "mdx" => Some(DocumentType::Markdown),
            "csv" | "tsv" => Some(DocumentType::Csv),
            "pdf" => Some(DocumentType::Pdf),
            "rs" | "ts" | "tsx" | "js" | "jsx" | "py" | "json" | "toml" | "yaml" | "yml"
            | "html" | "css" | "scss" | "go" | "java" | "c" | "cpp" | "h" | "hpp" | "sh"
            | "bash" | "zsh" | "sql" | "xml" => Some(DocumentType::Code),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| {
                format!(
                    "unknown document type '{}' (expected one of: text, markdown, url, code, csv, pdf)",
                    s
                )
            })
    }
}

/// 문서
///
/// 콘텐츠는 수집 이후 직접 수정되지 않습니다. 수정은 콘텐츠 교체 + 전체 재청킹입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub knowledge_base_id: String,
    pub name: String,
    pub doc_type: DocumentType,
    pub content: String,
    pub tags: BTreeSet<String>,
    /// 원문 위치 순서
    pub chunks: Vec<DocumentChunk>,
    /// 콘텐츠 바이트 길이
    pub size: usize,
    /// SHA-256 (hex)
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// 태그 중 하나라도 일치하는지 (정규화된 태그 집합 기준)
    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }
}

/// 문서 추가 옵션
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    pub tags: Vec<String>,
}

impl DocumentOptions {
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// 문서 수정 입력
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// 문서 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub knowledge_base_id: String,
    pub text: String,
    /// 문서 내 0-based 순번
    pub position: usize,
    /// 생성 시 한 번 계산되는 단어 벡터
    pub term_vector: TermVector,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 콘텐츠 SHA-256 해시 (hex)
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// 태그 정규화 (공백 제거, 빈 태그 제외)
pub(crate) fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = KnowledgeBaseSettings::default();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.retrieval_top_k, 5);
        assert!(settings.score_threshold.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation_errors() {
        let base = KnowledgeBaseSettings::default();

        let zero_size = KnowledgeBaseSettings { chunk_size: 0, chunk_overlap: 0, ..base };
        assert!(matches!(zero_size.validate(), Err(KnowledgeError::Validation(_))));

        let big_overlap = KnowledgeBaseSettings { chunk_size: 100, chunk_overlap: 100, ..base };
        assert_eq!(
            big_overlap.validate(),
            Err(KnowledgeError::Validation(
                "chunk_overlap (100) must be less than chunk_size (100)".to_string()
            ))
        );

        let zero_top_k = KnowledgeBaseSettings { retrieval_top_k: 0, ..base };
        assert!(zero_top_k.validate().is_err());

        let bad_threshold = KnowledgeBaseSettings { score_threshold: Some(1.5), ..base };
        assert!(bad_threshold.validate().is_err());

        let nan_threshold = KnowledgeBaseSettings { score_threshold: Some(f64::NAN), ..base };
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn test_overrides_derive_overlap() {
        let merged = KnowledgeBaseSettings::default().with_overrides(&SettingsUpdate {
            chunk_size: Some(100),
            ..Default::default()
        });
        assert_eq!(merged.chunk_size, 100);
        assert_eq!(merged.chunk_overlap, 10);
        assert_eq!(merged.retrieval_top_k, 5);

        let explicit = KnowledgeBaseSettings::default().with_overrides(&SettingsUpdate {
            chunk_size: Some(100),
            chunk_overlap: Some(0),
            ..Default::default()
        });
        assert_eq!(explicit.chunk_overlap, 0);
    }

    #[test]
    fn test_apply_keeps_existing_values() {
        let current = KnowledgeBaseSettings {
            score_threshold: Some(0.2),
            ..Default::default()
        };
        let updated = current.apply(&SettingsUpdate {
            retrieval_top_k: Some(3),
            ..Default::default()
        });
        assert_eq!(updated.retrieval_top_k, 3);
        assert_eq!(updated.chunk_size, 500);
        assert_eq!(updated.score_threshold, Some(0.2));

        let cleared = current.apply(&SettingsUpdate {
            score_threshold: Some(None),
            ..Default::default()
        });
        assert!(cleared.score_threshold.is_none());
    }

    #[test]
    fn test_document_type_parsing() {
        assert_eq!("markdown".parse::<DocumentType>(), Ok(DocumentType::Markdown));
        assert_eq!(" PDF ".parse::<DocumentType>(), Ok(DocumentType::Pdf));
        assert!("image".parse::<DocumentType>().is_err());
        assert_eq!(DocumentType::Csv.to_string(), "csv");
    }

    #[test]
    fn test_document_type_from_extension() {
        assert_eq!(DocumentType::from_extension("md"), Some(DocumentType::Markdown));
        assert_eq!(DocumentType::from_extension("RS"), Some(DocumentType::Code));
        assert_eq!(DocumentType::from_extension("txt"), Some(DocumentType::Text));
        assert_eq!(DocumentType::from_extension("csv"), Some(DocumentType::Csv));
        assert_eq!(DocumentType::from_extension("pdf"), Some(DocumentType::Pdf));
        assert_eq!(DocumentType::from_extension("png"), None);
    }

    #[test]
    fn test_document_type_serde() {
        let json = serde_json::to_string(&DocumentType::Markdown).unwrap();
        assert_eq!(json, "\"markdown\"");
        let parsed: DocumentType = serde_json::from_str("\"code\"").unwrap();
        assert_eq!(parsed, DocumentType::Code);
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let kb = KnowledgeBase {
            id: "kb-1".to_string(),
            name: "Product Docs".to_string(),
            description: String::new(),
            owner_id: "alice".to_string(),
            settings: KnowledgeBaseSettings::default(),
            document_ids: vec![],
            created_at: now,
            updated_at: now,
        };

        assert!(KnowledgeBaseFilter::default().matches(&kb));
        assert!(KnowledgeBaseFilter::owned_by("alice").matches(&kb));
        assert!(!KnowledgeBaseFilter::owned_by("bob").matches(&kb));

        let by_name = KnowledgeBaseFilter {
            name_contains: Some("product".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&kb));
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![" rust ", "", "ai", "rust"]);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["ai", "rust"]);
    }
}
