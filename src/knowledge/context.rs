//! ContextBuilder - 검색 결과를 프롬프트용 컨텍스트로 조립
//!
//! 점수 순으로 청크를 이어 붙이되 `max_chars` (문자 수)를 절대 넘지 않습니다.
//! 청크는 잘라내지 않고, 들어가지 않는 청크를 만나면 거기서 멈춥니다.

use serde::Serialize;

use crate::error::KnowledgeResult;

use super::index::KnowledgeIndex;
use super::retriever::{RetrievalResult, Retriever, SearchOptions};

/// 기본 컨텍스트 크기 (문자 수)
pub const DEFAULT_CONTEXT_CHARS: usize = 4000;

/// 청크 사이 구분자
const PASSAGE_SEPARATOR: &str = "\n\n";

/// 검색 결과가 없을 때 컨텍스트 자리에 들어가는 문구
const NO_CONTEXT_PLACEHOLDER: &str = "(관련 문서를 찾지 못했습니다)";

/// 조립된 RAG 컨텍스트
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagContext {
    pub query: String,
    /// 실제로 컨텍스트에 포함된 결과 (점수 순)
    pub results: Vec<RetrievalResult>,
    pub formatted_context: String,
}

impl RagContext {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// 컨텍스트 조립기
pub struct ContextBuilder<'a> {
    index: &'a KnowledgeIndex,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(index: &'a KnowledgeIndex) -> Self {
        Self { index }
    }

    /// 지식베이스 기본 top_k로 검색한 뒤 `max_chars` 안에서 컨텍스트 조립
    pub fn build_context(&self, kb_id: &str, query: &str, max_chars: usize) -> KnowledgeResult<RagContext> {
        let ranked = Retriever::new(self.index).search(kb_id, query, &SearchOptions::default())?;
        let ranked_count = ranked.len();

        let mut formatted_context = String::new();
        let mut used_chars = 0usize;
        let mut results = Vec::with_capacity(ranked.len());

        for result in ranked {
            let passage = format_passage(&result);
            let separator_chars = if results.is_empty() {
                0
            } else {
                PASSAGE_SEPARATOR.chars().count()
            };
            let passage_chars = passage.chars().count();

            if used_chars + separator_chars + passage_chars > max_chars {
                break;
            }

            if separator_chars > 0 {
                formatted_context.push_str(PASSAGE_SEPARATOR);
            }
            formatted_context.push_str(&passage);
            used_chars += separator_chars + passage_chars;
            results.push(result);
        }

        tracing::debug!(
            "Built context for kb {}: {}/{} chunks, {}/{} chars",
            kb_id,
            results.len(),
            ranked_count,
            used_chars,
            max_chars
        );

        Ok(RagContext {
            query: query.to_string(),
            results,
            formatted_context,
        })
    }

    /// 시스템 프롬프트 + Context + Question 형태의 프롬프트 생성
    ///
    /// `max_chars`가 없으면 [`DEFAULT_CONTEXT_CHARS`]를 사용합니다.
    pub fn get_rag_prompt(
        &self,
        kb_id: &str,
        query: &str,
        system_prompt: &str,
        max_chars: Option<usize>,
    ) -> KnowledgeResult<String> {
        let context = self.build_context(kb_id, query, max_chars.unwrap_or(DEFAULT_CONTEXT_CHARS))?;
        Ok(render_prompt(system_prompt, &context))
    }
}

/// `[Source: 문서명]` 인용 라벨 + 청크 본문
fn format_passage(result: &RetrievalResult) -> String {
    format!("[Source: {}]\n{}", result.document_name, result.chunk.text)
}

fn render_prompt(system_prompt: &str, context: &RagContext) -> String {
    let mut prompt = String::new();

    let system_prompt = system_prompt.trim();
    if !system_prompt.is_empty() {
        prompt.push_str(system_prompt);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Context\n");
    if context.is_empty() {
        prompt.push_str(NO_CONTEXT_PLACEHOLDER);
    } else {
        prompt.push_str(&context.formatted_context);
    }

    prompt.push_str("\n\n## Question\n");
    prompt.push_str(context.query.trim());
    prompt
}

// ============================================================================
// Tests
// ============================================================================
