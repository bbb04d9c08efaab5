//! 에러 타입
//!
//! 지식베이스 코어가 호출자에게 돌려주는 에러 분류입니다.
//! 외곽 레이어(CLI, 저장소, 수집기)는 `anyhow`를 그대로 사용합니다.

use thiserror::Error;

/// 지식베이스 코어 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KnowledgeError {
    /// 존재하지 않는 지식베이스 ID (항상 해당 ID를 포함)
    #[error("knowledge base not found: {id}")]
    NotFound { id: String },

    /// 설정 값 범위 오류 (메시지를 그대로 노출, 보정하지 않음)
    #[error("validation error: {0}")]
    Validation(String),

    /// 백그라운드 청킹 작업이 완료되지 못함 (KnowledgeService 전용)
    #[error("ingestion task failed: {0}")]
    Ingestion(String),
}

impl KnowledgeError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_carries_id() {
        let err = KnowledgeError::not_found("kb-123");
        assert_eq!(err, KnowledgeError::NotFound { id: "kb-123".to_string() });
        assert_eq!(err.to_string(), "knowledge base not found: kb-123");
    }

    #[test]
    fn test_validation_message_verbatim() {
        let err = KnowledgeError::validation("chunk_overlap (600) must be less than chunk_size (500)");
        assert_eq!(
            err.to_string(),
            "validation error: chunk_overlap (600) must be less than chunk_size (500)"
        );
    }
}
