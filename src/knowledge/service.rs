//! KnowledgeService - 비동기 지식베이스 파사드
//!
//! `KnowledgeIndex` 하나를 `RwLock`으로 감싸 여러 태스크에서 공유합니다.
//! 청킹/벡터화는 락 없이 `spawn_blocking`에서 수행하고, 결과 반영만 쓰기 락으로 처리합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{KnowledgeError, KnowledgeResult};

use super::analytics::{AnalyticsReporter, KnowledgeBaseAnalytics, QueryRecord};
use super::chunker::ChunkConfig;
use super::context::{ContextBuilder, RagContext};
use super::index::{KnowledgeIndex, PreparedContent};
use super::model::{
    Document, DocumentOptions, DocumentType, DocumentUpdate, KnowledgeBase, KnowledgeBaseFilter,
    KnowledgeBaseUpdate, SettingsUpdate,
};
use super::retriever::{RetrievalResult, Retriever, SearchOptions};

/// 공유 가능한 지식베이스 핸들
#[derive(Debug, Clone, Default)]
pub struct KnowledgeService {
    index: Arc<RwLock<KnowledgeIndex>>,
}

impl KnowledgeService {
    pub fn new(index: KnowledgeIndex) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
        }
    }

    /// 읽기 락을 잡고 인덱스 조회 (스냅샷 저장 등)
    pub async fn with_index<R>(&self, f: impl FnOnce(&KnowledgeIndex) -> R) -> R {
        let index = self.index.read().await;
        f(&index)
    }

    // ------------------------------------------------------------------------
    // Knowledge Bases
    // ------------------------------------------------------------------------

    pub async fn create_knowledge_base(
        &self,
        name: &str,
        description: &str,
        owner_id: &str,
        settings: Option<SettingsUpdate>,
    ) -> KnowledgeResult<KnowledgeBase> {
        self.index
            .write()
            .await
            .create_knowledge_base(name, description, owner_id, settings)
    }

    pub async fn get_knowledge_base(&self, id: &str) -> Option<KnowledgeBase> {
        self.index.read().await.get_knowledge_base(id).cloned()
    }

    pub async fn list_knowledge_bases(&self, filter: &KnowledgeBaseFilter) -> Vec<KnowledgeBase> {
        self.index
            .read()
            .await
            .list_knowledge_bases(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn update_knowledge_base(
        &self,
        id: &str,
        update: KnowledgeBaseUpdate,
    ) -> KnowledgeResult<KnowledgeBase> {
        self.index.write().await.update_knowledge_base(id, update)
    }

    pub async fn delete_knowledge_base(&self, id: &str) -> KnowledgeResult<KnowledgeBase> {
        self.index.write().await.delete_knowledge_base(id)
    }

    /// 현재 설정으로 전체 문서 재청킹. 생성된 청크 수 반환.
    pub async fn reindex_knowledge_base(&self, id: &str) -> KnowledgeResult<usize> {
        self.index.write().await.reindex_knowledge_base(id)
    }

    // ------------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------------

    /// 문서 추가
    ///
    /// 청킹은 락 밖에서 수행됩니다. 그 사이 지식베이스가 삭제되면 `NotFound`.
    pub async fn add_document(
        &self,
        kb_id: &str,
        name: &str,
        content: impl Into<String>,
        doc_type: DocumentType,
        options: DocumentOptions,
    ) -> KnowledgeResult<Document> {
        let config = self.index.read().await.chunk_config(kb_id)?;
        let prepared = prepare(content.into(), config).await?;

        self.index
            .write()
            .await
            .insert_document(kb_id, name, doc_type, options, prepared)
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        self.index.read().await.get_document(id).cloned()
    }

    pub async fn list_documents(&self, kb_id: &str) -> Vec<Document> {
        self.index
            .read()
            .await
            .list_documents(kb_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 문서 수정 (전체 재청킹). 문서가 없으면 `Ok(None)`.
    pub async fn update_document(
        &self,
        id: &str,
        update: DocumentUpdate,
    ) -> KnowledgeResult<Option<Document>> {
        let source = self.index.read().await.update_source(id, &update);
        let Some((content, config)) = source else {
            return Ok(None);
        };

        let prepared = prepare(content, config).await?;
        Ok(self
            .index
            .write()
            .await
            .commit_document_update(id, update.name, update.tags, prepared))
    }

    pub async fn delete_document(&self, id: &str) -> Option<Document> {
        self.index.write().await.delete_document(id)
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    pub async fn search_knowledge_base(
        &self,
        kb_id: &str,
        query: &str,
        options: &SearchOptions,
    ) -> KnowledgeResult<Vec<RetrievalResult>> {
        let index = self.index.read().await;
        Retriever::new(&index).search(kb_id, query, options)
    }

    pub async fn build_rag_context(
        &self,
        kb_id: &str,
        query: &str,
        max_chars: usize,
    ) -> KnowledgeResult<RagContext> {
        let index = self.index.read().await;
        ContextBuilder::new(&index).build_context(kb_id, query, max_chars)
    }

    pub async fn get_rag_prompt(
        &self,
        kb_id: &str,
        query: &str,
        system_prompt: &str,
        max_chars: Option<usize>,
    ) -> KnowledgeResult<String> {
        let index = self.index.read().await;
        ContextBuilder::new(&index).get_rag_prompt(kb_id, query, system_prompt, max_chars)
    }

    // ------------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------------

    pub async fn track_query(
        &self,
        kb_id: &str,
        query: &str,
        result_count: usize,
        timestamp: DateTime<Utc>,
    ) -> KnowledgeResult<QueryRecord> {
        self.index
            .write()
            .await
            .track_query(kb_id, query, result_count, timestamp)
    }

    pub async fn get_knowledge_base_analytics(
        &self,
        kb_id: &str,
    ) -> KnowledgeResult<KnowledgeBaseAnalytics> {
        let index = self.index.read().await;
        AnalyticsReporter::new(&index).knowledge_base_analytics(kb_id)
    }
}

/// CPU 바운드 청킹을 블로킹 스레드에서 수행
async fn prepare(content: String, config: ChunkConfig) -> KnowledgeResult<PreparedContent> {
    tokio::task::spawn_blocking(move || PreparedContent::prepare(content, config))
        .await
        .map_err(|e| KnowledgeError::Ingestion(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_service() -> (KnowledgeService, String) {
        let service = KnowledgeService::default();
        let kb = service
            .create_knowledge_base(
                "Service KB",
                "test",
                "owner",
                Some(SettingsUpdate {
                    chunk_size: Some(100),
                    chunk_overlap: Some(10),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        (service, kb.id)
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let (service, kb_id) = create_test_service().await;
        let ai = service
            .add_document(
                &kb_id,
                "AI Document",
                "Artificial intelligence is transforming technology.",
                DocumentType::Text,
                DocumentOptions::default(),
            )
            .await
            .unwrap();
        service
            .add_document(
                &kb_id,
                "Cooking",
                "How to make pasta with tomato sauce.",
                DocumentType::Text,
                DocumentOptions::default(),
            )
            .await
            .unwrap();

        let results = service
            .search_knowledge_base(&kb_id, "artificial intelligence", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results[0].chunk.document_id, ai.id);

        let kb = service.get_knowledge_base(&kb_id).await.unwrap();
        assert_eq!(kb.document_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let (service, kb_id) = create_test_service().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = service.clone();
            let kb_id = kb_id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .add_document(
                        &kb_id,
                        &format!("Doc {}", i),
                        format!("Concurrent document about topic {}. ", i).repeat(10),
                        DocumentType::Text,
                        DocumentOptions::default(),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let docs = service.list_documents(&kb_id).await;
        assert_eq!(docs.len(), 10);
        let kb = service.get_knowledge_base(&kb_id).await.unwrap();
        assert_eq!(kb.document_ids.len(), 10);
        assert!(docs.iter().all(|d| !d.chunks.is_empty()));
    }

    #[tokio::test]
    async fn test_update_and_delete_document() {
        let (service, kb_id) = create_test_service().await;
        let doc = service
            .add_document(&kb_id, "Doc", "old content here", DocumentType::Text, DocumentOptions::default())
            .await
            .unwrap();

        let updated = service
            .update_document(
                &doc.id,
                DocumentUpdate {
                    content: Some("brand new material".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "brand new material");
        assert!(updated.chunks.iter().all(|c| !c.text.contains("old")));

        let results = service
            .search_knowledge_base(&kb_id, "old content", &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());

        assert!(service.delete_document(&doc.id).await.is_some());
        assert!(service.get_document(&doc.id).await.is_none());
        assert!(service.delete_document(&doc.id).await.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let (service, _) = create_test_service().await;
        let result = service
            .update_document("missing", DocumentUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_add_to_missing_knowledge_base() {
        let service = KnowledgeService::default();
        let err = service
            .add_document("missing", "Doc", "content", DocumentType::Text, DocumentOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, KnowledgeError::not_found("missing"));
    }

    #[tokio::test]
    async fn test_context_prompt_and_analytics() {
        let (service, kb_id) = create_test_service().await;
        service
            .add_document(
                &kb_id,
                "Guide",
                "Deployment requires a configured server.",
                DocumentType::Markdown,
                DocumentOptions::default(),
            )
            .await
            .unwrap();

        let context = service.build_rag_context(&kb_id, "deployment server", 500).await.unwrap();
        assert_eq!(context.results.len(), 1);
        assert!(context.formatted_context.starts_with("[Source: Guide]"));

        let prompt = service
            .get_rag_prompt(&kb_id, "deployment server", "Answer briefly.", None)
            .await
            .unwrap();
        assert!(prompt.contains("## Context"));

        service
            .track_query(&kb_id, "deployment server", context.results.len(), Utc::now())
            .await
            .unwrap();

        let analytics = service.get_knowledge_base_analytics(&kb_id).await.unwrap();
        assert_eq!(analytics.document_stats.total, 1);
        assert_eq!(analytics.query_stats.total_queries, 1);
    }

    #[tokio::test]
    async fn test_delete_knowledge_base_cascades() {
        let (service, kb_id) = create_test_service().await;
        let doc = service
            .add_document(&kb_id, "Doc", "some content", DocumentType::Text, DocumentOptions::default())
            .await
            .unwrap();

        service.delete_knowledge_base(&kb_id).await.unwrap();
        assert!(service.get_document(&doc.id).await.is_none());
        assert!(service.list_documents(&kb_id).await.is_empty());
        assert_eq!(service.with_index(|index| index.chunk_count()).await, 0);
    }
}
