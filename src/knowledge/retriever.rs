//! Retriever - 지식베이스 청크 검색
//!
//! 쿼리를 한 번 벡터화한 뒤 대상 청크 전체와 코사인 유사도를 계산하고,
//! 점수 내림차순 → (document_id, position) 오름차순으로 정렬합니다.
//! 같은 입력이면 항상 같은 순서의 결과를 돌려줍니다.

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::{KnowledgeError, KnowledgeResult};

use super::index::KnowledgeIndex;
use super::model::{normalize_tags, DocumentChunk};
use super::scorer::{similarity, vectorize};

// ============================================================================
// Types
// ============================================================================

/// 검색 옵션
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// 최대 결과 수 (기본: 지식베이스 retrieval_top_k)
    pub top_k: Option<usize>,
    /// 태그 필터 (비어 있으면 필터 없음)
    pub tags: Vec<String>,
    /// 최소 점수 (기본: 지식베이스 score_threshold, 없으면 0)
    pub min_score: Option<f64>,
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    /// 유사도 점수 (높을수록 관련성 높음)
    pub score: f64,
    /// 원본 문서 이름 (표시용)
    pub document_name: String,
}

/// 정렬 전 후보 (복제 없이 참조만 보관)
struct Candidate<'a> {
    chunk: &'a DocumentChunk,
    score: f64,
    document_name: &'a str,
}

// ============================================================================
// Retriever
// ============================================================================

/// 지식베이스 검색기
pub struct Retriever<'a> {
    index: &'a KnowledgeIndex,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a KnowledgeIndex) -> Self {
        Self { index }
    }

    /// 지식베이스 검색
    ///
    /// 공통 단어가 하나도 없는 청크(점수 0)는 결과에 포함되지 않습니다.
    /// 지식베이스가 없을 때만 에러이고, 일치하는 청크가 없으면 빈 목록입니다.
    ///
    /// # Arguments
    /// * `kb_id` - 지식베이스 ID
    /// * `query` - 검색 쿼리
    /// * `options` - top_k / 태그 / 최소 점수
    pub fn search(
        &self,
        kb_id: &str,
        query: &str,
        options: &SearchOptions,
    ) -> KnowledgeResult<Vec<RetrievalResult>> {
        let kb = self
            .index
            .get_knowledge_base(kb_id)
            .ok_or_else(|| KnowledgeError::not_found(kb_id))?;

        let top_k = options.top_k.unwrap_or(kb.settings.retrieval_top_k);
        let min_score = options
            .min_score
            .or(kb.settings.score_threshold)
            .unwrap_or(0.0);

        // 저장된 문서 태그와 같은 방식으로 정규화 (정규화 후 비면 필터 없음)
        let tag_filter = normalize_tags(&options.tags);

        let query_vector = vectorize(query);
        if query_vector.is_empty() || top_k == 0 {
            tracing::debug!("Empty query vector or top_k=0 for kb {}", kb_id);
            return Ok(vec![]);
        }

        let mut eligible = 0usize;
        let mut candidates: Vec<Candidate<'_>> = Vec::new();

        for doc in self.index.list_documents(kb_id) {
            // 태그가 하나도 겹치지 않는 문서는 통째로 제외
            if !tag_filter.is_empty() && !doc.has_any_tag(&tag_filter) {
                continue;
            }

            for chunk in &doc.chunks {
                eligible += 1;
                let score = similarity(&query_vector, &chunk.term_vector);
                if score <= 0.0 || score < min_score {
                    continue;
                }
                candidates.push(Candidate {
                    chunk,
                    score,
                    document_name: &doc.name,
                });
            }
        }

        candidates.sort_by(compare_candidates);
        candidates.truncate(top_k);

        tracing::debug!(
            "Search kb={} query={:?}: {} eligible chunks, {} results",
            kb_id,
            query,
            eligible,
            candidates.len()
        );

        Ok(candidates
            .into_iter()
            .map(|c| RetrievalResult {
                chunk: c.chunk.clone(),
                score: c.score,
                document_name: c.document_name.to_string(),
            })
            .collect())
    }
}

/// 점수 내림차순, 동점이면 (document_id, position) 오름차순
fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
        .then_with(|| a.chunk.position.cmp(&b.chunk.position))
}

// ============================================================================
// Tests
// ============================================================================
