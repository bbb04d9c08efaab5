//! Knowledge Index - 인메모리 지식베이스 저장소
//!
//! 지식베이스, 문서, 청크의 생성/조회/수정/삭제를 담당합니다.
//! 프로세스 전역 상태가 아닌 인스턴스이므로 테스트나 멀티 테넌트 환경에서
//! 여러 개를 독립적으로 만들 수 있습니다.
//!
//! 조회는 없는 ID에 대해 `None`/빈 목록을 반환하고,
//! 존재하지 않는 지식베이스를 대상으로 한 변경만 `NotFound` 에러를 반환합니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{KnowledgeError, KnowledgeResult};

use super::analytics::{QueryLog, QueryRecord};
use super::chunker::{ChunkConfig, Chunker, SentenceChunker};
use super::model::{
    content_hash, normalize_tags, Document, DocumentChunk, DocumentOptions, DocumentType,
    DocumentUpdate, KnowledgeBase, KnowledgeBaseFilter, KnowledgeBaseSettings,
    KnowledgeBaseUpdate, SettingsUpdate,
};
use super::scorer::{vectorize, TermVector};

// ============================================================================
// Prepared Content
// ============================================================================

/// 청킹 + 벡터화가 끝난 콘텐츠
///
/// 순수 CPU 작업이라 락 밖(또는 블로킹 스레드)에서 만들고, 커밋만 인덱스에서 합니다.
#[derive(Debug, Clone)]
pub struct PreparedContent {
    config: ChunkConfig,
    content: String,
    content_hash: String,
    chunks: Vec<(String, TermVector)>,
}

impl PreparedContent {
    /// 콘텐츠를 청킹하고 각 청크를 벡터화
    pub fn prepare(content: String, config: ChunkConfig) -> Self {
        let chunker = SentenceChunker::new(config);
        let chunks = chunker
            .chunk(&content)
            .into_iter()
            .map(|text| {
                let vector = vectorize(&text);
                (text, vector)
            })
            .collect();

        Self {
            config,
            content_hash: content_hash(&content),
            content,
            chunks,
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// 설정이 바뀌었으면 다시 준비
    fn ensure_config(self, config: ChunkConfig) -> Self {
        if self.config == config {
            self
        } else {
            Self::prepare(self.content, config)
        }
    }

    fn into_chunks(self, document_id: &str, knowledge_base_id: &str) -> Vec<DocumentChunk> {
        self.chunks
            .into_iter()
            .enumerate()
            .map(|(position, (text, term_vector))| DocumentChunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                knowledge_base_id: knowledge_base_id.to_string(),
                text,
                position,
                term_vector,
            })
            .collect()
    }
}

// ============================================================================
// KnowledgeIndex
// ============================================================================

/// 인메모리 지식베이스 인덱스
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    knowledge_bases: HashMap<String, KnowledgeBase>,
    documents: HashMap<String, Document>,
    query_log: QueryLog,
    default_settings: KnowledgeBaseSettings,
}

impl KnowledgeIndex {
    /// 기본 설정으로 빈 인덱스 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 지식베이스에 적용할 기본 설정 지정
    pub fn with_default_settings(settings: KnowledgeBaseSettings) -> KnowledgeResult<Self> {
        settings.validate()?;
        Ok(Self {
            default_settings: settings,
            ..Self::default()
        })
    }

    /// 저장된 스냅샷에서 인덱스 복원
    ///
    /// `document_ids`는 문서의 `knowledge_base_id`로부터 입력 순서대로 다시 만들고,
    /// 소속 지식베이스가 없는 문서는 버립니다.
    pub fn restore(
        default_settings: KnowledgeBaseSettings,
        knowledge_bases: Vec<KnowledgeBase>,
        documents: Vec<Document>,
        queries: Vec<QueryRecord>,
    ) -> Self {
        let mut knowledge_bases: HashMap<String, KnowledgeBase> = knowledge_bases
            .into_iter()
            .map(|mut kb| {
                kb.document_ids.clear();
                (kb.id.clone(), kb)
            })
            .collect();

        let mut restored = HashMap::with_capacity(documents.len());
        for mut doc in documents {
            match knowledge_bases.get_mut(&doc.knowledge_base_id) {
                Some(kb) => {
                    doc.chunks.sort_by_key(|c| c.position);
                    kb.document_ids.push(doc.id.clone());
                    restored.insert(doc.id.clone(), doc);
                }
                None => {
                    tracing::warn!(
                        "Dropping orphaned document {} (knowledge base {} missing)",
                        doc.id,
                        doc.knowledge_base_id
                    );
                }
            }
        }

        let mut query_log = QueryLog::default();
        for record in queries {
            if knowledge_bases.contains_key(&record.knowledge_base_id) {
                query_log.record(record);
            }
        }

        Self {
            knowledge_bases,
            documents: restored,
            query_log,
            default_settings,
        }
    }

    pub fn default_settings(&self) -> &KnowledgeBaseSettings {
        &self.default_settings
    }

    // ------------------------------------------------------------------------
    // Knowledge Base
    // ------------------------------------------------------------------------

    /// 지식베이스 생성
    pub fn create_knowledge_base(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        owner_id: impl Into<String>,
        settings: Option<SettingsUpdate>,
    ) -> KnowledgeResult<KnowledgeBase> {
        let name = name.into();
        validate_name(&name)?;

        let settings = match settings {
            Some(ref overrides) => self.default_settings.with_overrides(overrides),
            None => self.default_settings,
        };
        settings.validate()?;

        let now = Utc::now();
        let kb = KnowledgeBase {
            id: Uuid::new_v4().to_string(),
            name,
            description: description.into(),
            owner_id: owner_id.into(),
            settings,
            document_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        tracing::info!("Created knowledge base: {} (id={})", kb.name, kb.id);
        self.knowledge_bases.insert(kb.id.clone(), kb.clone());
        Ok(kb)
    }

    pub fn get_knowledge_base(&self, id: &str) -> Option<&KnowledgeBase> {
        self.knowledge_bases.get(id)
    }

    /// 필터에 맞는 지식베이스 (생성 순)
    pub fn list_knowledge_bases(&self, filter: &KnowledgeBaseFilter) -> Vec<&KnowledgeBase> {
        let mut list: Vec<&KnowledgeBase> = self
            .knowledge_bases
            .values()
            .filter(|kb| filter.matches(kb))
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// 지식베이스 수정
    ///
    /// 청킹 설정이 바뀌어도 기존 청크는 유지됩니다 (`reindex_knowledge_base` 참고).
    pub fn update_knowledge_base(
        &mut self,
        id: &str,
        update: KnowledgeBaseUpdate,
    ) -> KnowledgeResult<KnowledgeBase> {
        let kb = self
            .knowledge_bases
            .get_mut(id)
            .ok_or_else(|| KnowledgeError::not_found(id))?;

        if let Some(ref name) = update.name {
            validate_name(name)?;
        }
        let settings = match update.settings {
            Some(ref patch) => kb.settings.apply(patch),
            None => kb.settings,
        };
        settings.validate()?;

        if let Some(name) = update.name {
            kb.name = name;
        }
        if let Some(description) = update.description {
            kb.description = description;
        }
        kb.settings = settings;
        kb.updated_at = Utc::now();

        tracing::info!("Updated knowledge base: {} (id={})", kb.name, kb.id);
        Ok(kb.clone())
    }

    /// 지식베이스 삭제 (문서, 청크, 쿼리 기록까지 함께 삭제)
    pub fn delete_knowledge_base(&mut self, id: &str) -> KnowledgeResult<KnowledgeBase> {
        let kb = self
            .knowledge_bases
            .remove(id)
            .ok_or_else(|| KnowledgeError::not_found(id))?;

        for doc_id in &kb.document_ids {
            self.documents.remove(doc_id);
        }
        self.query_log.remove_knowledge_base(id);

        tracing::info!(
            "Deleted knowledge base: {} (id={}, documents={})",
            kb.name,
            kb.id,
            kb.document_ids.len()
        );
        Ok(kb)
    }

    /// 현재 설정으로 모든 문서의 청크를 다시 생성
    ///
    /// # Returns
    /// 새로 생성된 청크 수
    pub fn reindex_knowledge_base(&mut self, id: &str) -> KnowledgeResult<usize> {
        let kb = self
            .knowledge_bases
            .get(id)
            .ok_or_else(|| KnowledgeError::not_found(id))?;
        let config = kb.settings.chunk_config();
        let doc_ids = kb.document_ids.clone();

        let mut total = 0;
        for doc_id in doc_ids {
            if let Some(doc) = self.documents.get_mut(&doc_id) {
                let prepared = PreparedContent::prepare(doc.content.clone(), config);
                doc.chunks = prepared.into_chunks(&doc.id, id);
                doc.updated_at = Utc::now();
                total += doc.chunks.len();
            }
        }

        tracing::info!("Reindexed knowledge base {} ({} chunks)", id, total);
        Ok(total)
    }

    // ------------------------------------------------------------------------
    // Document
    // ------------------------------------------------------------------------

    /// 지식베이스의 청킹 설정
    pub fn chunk_config(&self, kb_id: &str) -> KnowledgeResult<ChunkConfig> {
        self.knowledge_bases
            .get(kb_id)
            .map(|kb| kb.settings.chunk_config())
            .ok_or_else(|| KnowledgeError::not_found(kb_id))
    }

    /// 문서 추가 (청킹 + 벡터화 후 저장)
    pub fn add_document(
        &mut self,
        kb_id: &str,
        name: impl Into<String>,
        content: impl Into<String>,
        doc_type: DocumentType,
        options: DocumentOptions,
    ) -> KnowledgeResult<Document> {
        let config = self.chunk_config(kb_id)?;
        let prepared = PreparedContent::prepare(content.into(), config);
        self.insert_document(kb_id, name, doc_type, options, prepared)
    }

    /// 준비된 콘텐츠로 문서 저장
    ///
    /// 준비 이후 지식베이스 청킹 설정이 바뀌었으면 현재 설정으로 다시 청킹합니다.
    pub fn insert_document(
        &mut self,
        kb_id: &str,
        name: impl Into<String>,
        doc_type: DocumentType,
        options: DocumentOptions,
        prepared: PreparedContent,
    ) -> KnowledgeResult<Document> {
        let kb = self
            .knowledge_bases
            .get_mut(kb_id)
            .ok_or_else(|| KnowledgeError::not_found(kb_id))?;

        let prepared = prepared.ensure_config(kb.settings.chunk_config());
        if prepared.chunks.is_empty() {
            tracing::warn!("No chunks generated for document in knowledge base {}", kb_id);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let size = prepared.content.len();
        let hash = prepared.content_hash.clone();
        let content = prepared.content.clone();
        let chunks = prepared.into_chunks(&id, kb_id);

        let doc = Document {
            id: id.clone(),
            knowledge_base_id: kb_id.to_string(),
            name: name.into(),
            doc_type,
            content,
            tags: normalize_tags(&options.tags),
            chunks,
            size,
            content_hash: hash,
            created_at: now,
            updated_at: now,
        };

        kb.document_ids.push(id.clone());
        kb.updated_at = now;

        tracing::info!(
            "Added document: {} (id={}, kb={}, chunks={})",
            doc.name,
            doc.id,
            kb_id,
            doc.chunks.len()
        );

        self.documents.insert(id, doc.clone());
        Ok(doc)
    }

    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// 지식베이스 문서 목록 (추가 순). 없는 지식베이스면 빈 목록.
    pub fn list_documents(&self, kb_id: &str) -> Vec<&Document> {
        self.knowledge_bases
            .get(kb_id)
            .map(|kb| {
                kb.document_ids
                    .iter()
                    .filter_map(|id| self.documents.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 태그로 문서 조회 (앞뒤 공백 무시)
    pub fn documents_by_tag(&self, kb_id: &str, tag: &str) -> Vec<&Document> {
        let tag = tag.trim();
        self.list_documents(kb_id)
            .into_iter()
            .filter(|doc| doc.tags.contains(tag))
            .collect()
    }

    /// 콘텐츠 해시로 문서 조회 (중복 수집 방지)
    pub fn find_by_content_hash(&self, kb_id: &str, hash: &str) -> Option<&Document> {
        self.list_documents(kb_id)
            .into_iter()
            .find(|doc| doc.content_hash == hash)
    }

    /// 청크 ID로 조회
    pub fn get_chunk(&self, chunk_id: &str) -> Option<&DocumentChunk> {
        self.documents
            .values()
            .flat_map(|doc| doc.chunks.iter())
            .find(|chunk| chunk.id == chunk_id)
    }

    /// 수정 시 다시 청킹할 콘텐츠와 설정
    ///
    /// 문서가 없으면 `None`.
    pub fn update_source(&self, id: &str, update: &DocumentUpdate) -> Option<(String, ChunkConfig)> {
        let doc = self.documents.get(id)?;
        let kb = self.knowledge_bases.get(&doc.knowledge_base_id)?;
        let content = update.content.clone().unwrap_or_else(|| doc.content.clone());
        Some((content, kb.settings.chunk_config()))
    }

    /// 문서 수정 (콘텐츠/태그 교체 후 전체 재청킹)
    ///
    /// 문서가 없으면 `None`.
    pub fn update_document(&mut self, id: &str, update: DocumentUpdate) -> Option<Document> {
        let (content, config) = self.update_source(id, &update)?;
        let prepared = PreparedContent::prepare(content, config);
        self.commit_document_update(id, update.name, update.tags, prepared)
    }

    /// 준비된 콘텐츠로 문서 교체
    pub fn commit_document_update(
        &mut self,
        id: &str,
        name: Option<String>,
        tags: Option<Vec<String>>,
        prepared: PreparedContent,
    ) -> Option<Document> {
        let doc = self.documents.get_mut(id)?;
        let kb = self.knowledge_bases.get_mut(&doc.knowledge_base_id)?;

        let prepared = prepared.ensure_config(kb.settings.chunk_config());
        let now = Utc::now();

        if let Some(name) = name {
            doc.name = name;
        }
        if let Some(tags) = tags {
            doc.tags = normalize_tags(&tags);
        }
        doc.size = prepared.content.len();
        doc.content_hash = prepared.content_hash.clone();
        doc.content = prepared.content.clone();
        doc.chunks = prepared.into_chunks(&doc.id, &doc.knowledge_base_id);
        doc.updated_at = now;
        kb.updated_at = now;

        tracing::info!(
            "Updated document: {} (id={}, chunks={})",
            doc.name,
            doc.id,
            doc.chunks.len()
        );
        Some(doc.clone())
    }

    /// 문서 삭제 (청크 포함). 없으면 `None`.
    pub fn delete_document(&mut self, id: &str) -> Option<Document> {
        let doc = self.documents.remove(id)?;
        if let Some(kb) = self.knowledge_bases.get_mut(&doc.knowledge_base_id) {
            kb.document_ids.retain(|d| d != id);
            kb.updated_at = Utc::now();
        }

        tracing::info!("Deleted document: {} (id={})", doc.name, doc.id);
        Some(doc)
    }

    // ------------------------------------------------------------------------
    // Query Log
    // ------------------------------------------------------------------------

    /// 검색 기록 추가. 추가된 기록을 반환합니다.
    pub fn track_query(
        &mut self,
        kb_id: &str,
        query: impl Into<String>,
        result_count: usize,
        timestamp: DateTime<Utc>,
    ) -> KnowledgeResult<QueryRecord> {
        if !self.knowledge_bases.contains_key(kb_id) {
            return Err(KnowledgeError::not_found(kb_id));
        }

        let record = QueryRecord {
            knowledge_base_id: kb_id.to_string(),
            query: query.into(),
            result_count,
            timestamp,
        };
        self.query_log.record(record.clone());
        Ok(record)
    }

    pub fn query_log(&self) -> &QueryLog {
        &self.query_log
    }

    // ------------------------------------------------------------------------
    // Snapshot Access
    // ------------------------------------------------------------------------

    /// 모든 지식베이스 (생성 순)
    pub fn knowledge_bases(&self) -> Vec<&KnowledgeBase> {
        self.list_knowledge_bases(&KnowledgeBaseFilter::default())
    }

    /// 모든 문서 (지식베이스 생성 순, 문서 추가 순)
    pub fn documents(&self) -> Vec<&Document> {
        self.knowledge_bases()
            .into_iter()
            .flat_map(|kb| self.list_documents(&kb.id))
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.values().map(|d| d.chunks.len()).sum()
    }
}

/// 이름 검증 (비어 있으면 안 됨)
fn validate_name(name: &str) -> KnowledgeResult<()> {
    if name.trim().is_empty() {
        return Err(KnowledgeError::validation("name must not be empty"));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> Option<SettingsUpdate> {
        Some(SettingsUpdate {
            chunk_size: Some(100),
            chunk_overlap: Some(10),
            ..Default::default()
        })
    }

    fn create_test_index() -> (KnowledgeIndex, String) {
        let mut index = KnowledgeIndex::new();
        let kb = index
            .create_knowledge_base("Test KB", "for tests", "owner-1", small_settings())
            .unwrap();
        (index, kb.id)
    }

    #[test]
    fn test_create_knowledge_base_defaults() {
        let mut index = KnowledgeIndex::new();
        let kb = index
            .create_knowledge_base("Docs", "", "owner-1", None)
            .unwrap();

        assert_eq!(kb.settings, KnowledgeBaseSettings::default());
        assert!(kb.document_ids.is_empty());
        assert_eq!(index.get_knowledge_base(&kb.id), Some(&kb));
    }

    #[test]
    fn test_create_knowledge_base_validation() {
        let mut index = KnowledgeIndex::new();
        let err = index
            .create_knowledge_base(
                "Bad",
                "",
                "owner-1",
                Some(SettingsUpdate {
                    chunk_size: Some(100),
                    chunk_overlap: Some(100),
                    ..Default::default()
                }),
            )
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Validation(_)));

        let err = index.create_knowledge_base("  ", "", "owner-1", None).unwrap_err();
        assert!(matches!(err, KnowledgeError::Validation(_)));
        assert!(index.knowledge_bases().is_empty());
    }

    #[test]
    fn test_with_default_settings() {
        let settings = KnowledgeBaseSettings {
            chunk_size: 200,
            chunk_overlap: 20,
            retrieval_top_k: 3,
            score_threshold: None,
        };
        let mut index = KnowledgeIndex::with_default_settings(settings).unwrap();
        let kb = index.create_knowledge_base("KB", "", "o", None).unwrap();
        assert_eq!(kb.settings, settings);

        let invalid = KnowledgeBaseSettings { chunk_overlap: 300, ..settings };
        assert!(KnowledgeIndex::with_default_settings(invalid).is_err());
    }

    #[test]
    fn test_add_document_chunks_and_links() {
        let (mut index, kb_id) = create_test_index();
        let content = "This is a sentence. ".repeat(50);

        let doc = index
            .add_document(&kb_id, "Sentences", content.clone(), DocumentType::Text, DocumentOptions::default())
            .unwrap();

        assert!(doc.chunks.len() > 1);
        assert_eq!(doc.size, 1000);
        for (i, chunk) in doc.chunks.iter().enumerate() {
            assert_eq!(chunk.position, i);
            assert_eq!(chunk.document_id, doc.id);
            assert_eq!(chunk.knowledge_base_id, kb_id);
            assert!(chunk.text.chars().count() <= 125);
            assert!(!chunk.term_vector.is_empty());
        }

        let kb = index.get_knowledge_base(&kb_id).unwrap();
        assert_eq!(kb.document_ids, vec![doc.id.clone()]);
        assert_eq!(index.get_document(&doc.id), Some(&doc));
    }

    #[test]
    fn test_add_document_unknown_knowledge_base() {
        let mut index = KnowledgeIndex::new();
        let err = index
            .add_document("missing", "Doc", "content", DocumentType::Text, DocumentOptions::default())
            .unwrap_err();
        assert_eq!(err, KnowledgeError::not_found("missing"));
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let (mut index, kb_id) = create_test_index();
        let doc = index
            .add_document(&kb_id, "Empty", "   \n ", DocumentType::Text, DocumentOptions::default())
            .unwrap();
        assert!(doc.chunks.is_empty());
        assert_eq!(index.list_documents(&kb_id).len(), 1);
    }

    #[test]
    fn test_reads_degrade_for_missing_ids() {
        let index = KnowledgeIndex::new();
        assert!(index.get_knowledge_base("nope").is_none());
        assert!(index.get_document("nope").is_none());
        assert!(index.list_documents("nope").is_empty());
        assert!(index.documents_by_tag("nope", "tag").is_empty());
        assert!(index.get_chunk("nope").is_none());
    }

    #[test]
    fn test_update_document_regenerates_chunks() {
        let (mut index, kb_id) = create_test_index();
        let doc = index
            .add_document(&kb_id, "Doc", "Old content here.", DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let old_chunk_id = doc.chunks[0].id.clone();

        let updated = index
            .update_document(
                &doc.id,
                DocumentUpdate {
                    content: Some("New content about rust ownership. ".repeat(10)),
                    tags: Some(vec!["rust".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, doc.id);
        assert!(updated.chunks.len() > 1);
        assert!(updated.chunks.iter().all(|c| c.id != old_chunk_id));
        assert!(updated.tags.contains("rust"));
        assert_ne!(updated.content_hash, doc.content_hash);
        assert!(index.get_chunk(&old_chunk_id).is_none());
        assert!(index.get_chunk(&updated.chunks[0].id).is_some());
    }

    #[test]
    fn test_update_missing_document() {
        let (mut index, _) = create_test_index();
        assert!(index.update_document("missing", DocumentUpdate::default()).is_none());
        assert!(index.delete_document("missing").is_none());
    }

    #[test]
    fn test_delete_document_unlinks() {
        let (mut index, kb_id) = create_test_index();
        let a = index
            .add_document(&kb_id, "A", "alpha text", DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let b = index
            .add_document(&kb_id, "B", "beta text", DocumentType::Text, DocumentOptions::default())
            .unwrap();

        let deleted = index.delete_document(&a.id).unwrap();
        assert_eq!(deleted.id, a.id);
        assert!(index.get_document(&a.id).is_none());
        assert_eq!(index.get_knowledge_base(&kb_id).unwrap().document_ids, vec![b.id]);
    }

    #[test]
    fn test_delete_knowledge_base_cascades() {
        let (mut index, kb_id) = create_test_index();
        let doc = index
            .add_document(&kb_id, "Doc", "Some content. ".repeat(20), DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let chunk_id = doc.chunks[0].id.clone();
        index.track_query(&kb_id, "content", 1, Utc::now()).unwrap();

        let deleted = index.delete_knowledge_base(&kb_id).unwrap();
        assert_eq!(deleted.id, kb_id);
        assert!(index.get_knowledge_base(&kb_id).is_none());
        assert!(index.get_document(&doc.id).is_none());
        assert!(index.list_documents(&kb_id).is_empty());
        assert!(index.get_chunk(&chunk_id).is_none());
        assert_eq!(index.document_count(), 0);
        assert!(index.query_log().is_empty());

        assert_eq!(
            index.delete_knowledge_base(&kb_id).unwrap_err(),
            KnowledgeError::not_found(kb_id)
        );
    }

    #[test]
    fn test_update_knowledge_base() {
        let (mut index, kb_id) = create_test_index();
        let updated = index
            .update_knowledge_base(
                &kb_id,
                KnowledgeBaseUpdate {
                    name: Some("Renamed".to_string()),
                    settings: Some(SettingsUpdate {
                        retrieval_top_k: Some(2),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.settings.retrieval_top_k, 2);
        assert_eq!(updated.settings.chunk_size, 100);

        let err = index
            .update_knowledge_base(
                &kb_id,
                KnowledgeBaseUpdate {
                    settings: Some(SettingsUpdate {
                        chunk_overlap: Some(500),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Validation(_)));
        // 실패한 수정은 반영되지 않음
        assert_eq!(index.get_knowledge_base(&kb_id).unwrap().settings.chunk_overlap, 10);

        let err = index
            .update_knowledge_base("missing", KnowledgeBaseUpdate::default())
            .unwrap_err();
        assert_eq!(err, KnowledgeError::not_found("missing"));
    }

    #[test]
    fn test_list_knowledge_bases_filter() {
        let mut index = KnowledgeIndex::new();
        index.create_knowledge_base("Alpha", "", "alice", None).unwrap();
        index.create_knowledge_base("Beta", "", "bob", None).unwrap();
        index.create_knowledge_base("Alpine", "", "alice", None).unwrap();

        assert_eq!(index.list_knowledge_bases(&KnowledgeBaseFilter::default()).len(), 3);
        assert_eq!(index.list_knowledge_bases(&KnowledgeBaseFilter::owned_by("alice")).len(), 2);

        let filter = KnowledgeBaseFilter {
            owner_id: Some("alice".to_string()),
            name_contains: Some("alp".to_string()),
        };
        assert_eq!(index.list_knowledge_bases(&filter).len(), 2);
    }

    #[test]
    fn test_documents_by_tag_and_hash() {
        let (mut index, kb_id) = create_test_index();
        let tagged = index
            .add_document(&kb_id, "Tagged", "tagged body", DocumentType::Markdown, DocumentOptions::with_tags(["guide", "ai"]))
            .unwrap();
        index
            .add_document(&kb_id, "Plain", "plain body", DocumentType::Text, DocumentOptions::default())
            .unwrap();

        let by_tag = index.documents_by_tag(&kb_id, "guide");
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, tagged.id);
        assert_eq!(index.documents_by_tag(&kb_id, " guide ").len(), 1);

        let found = index.find_by_content_hash(&kb_id, &content_hash("tagged body"));
        assert_eq!(found.map(|d| d.id.as_str()), Some(tagged.id.as_str()));
        assert!(index.find_by_content_hash(&kb_id, &content_hash("other")).is_none());
    }

    #[test]
    fn test_reindex_applies_new_settings() {
        let (mut index, kb_id) = create_test_index();
        let doc = index
            .add_document(&kb_id, "Doc", "This is a sentence. ".repeat(50), DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let before = doc.chunks.len();

        index
            .update_knowledge_base(
                &kb_id,
                KnowledgeBaseUpdate {
                    settings: Some(SettingsUpdate {
                        chunk_size: Some(400),
                        chunk_overlap: Some(0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        // 설정 변경만으로는 재청킹하지 않음
        assert_eq!(index.get_document(&doc.id).unwrap().chunks.len(), before);

        let total = index.reindex_knowledge_base(&kb_id).unwrap();
        let after = index.get_document(&doc.id).unwrap().chunks.len();
        assert_eq!(total, after);
        assert!(after < before);

        assert!(index.reindex_knowledge_base("missing").is_err());
    }

    #[test]
    fn test_insert_prepared_with_stale_config() {
        let (mut index, kb_id) = create_test_index();
        let prepared = PreparedContent::prepare(
            "This is a sentence. ".repeat(50),
            ChunkConfig::new(400, 0),
        );
        assert_eq!(prepared.config().chunk_size, 400);

        let doc = index
            .insert_document(&kb_id, "Doc", DocumentType::Text, DocumentOptions::default(), prepared)
            .unwrap();
        assert!(doc.chunks.iter().all(|c| c.text.chars().count() <= 125));
    }

    #[test]
    fn test_track_query_requires_knowledge_base() {
        let (mut index, kb_id) = create_test_index();
        index.track_query(&kb_id, "hello", 2, Utc::now()).unwrap();
        assert_eq!(index.query_log().len(), 1);

        let err = index.track_query("missing", "hello", 0, Utc::now()).unwrap_err();
        assert_eq!(err, KnowledgeError::not_found("missing"));
    }

    #[test]
    fn test_restore_rebuilds_document_ids() {
        let (mut index, kb_id) = create_test_index();
        let a = index
            .add_document(&kb_id, "A", "alpha", DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let b = index
            .add_document(&kb_id, "B", "beta", DocumentType::Text, DocumentOptions::default())
            .unwrap();

        let mut orphan = a.clone();
        orphan.id = "orphan".to_string();
        orphan.knowledge_base_id = "gone".to_string();

        let kbs: Vec<KnowledgeBase> = index.knowledge_bases().into_iter().cloned().collect();
        let docs = vec![b.clone(), a.clone(), orphan];
        let restored = KnowledgeIndex::restore(KnowledgeBaseSettings::default(), kbs, docs, vec![]);

        let kb = restored.get_knowledge_base(&kb_id).unwrap();
        assert_eq!(kb.document_ids.len(), 2);
        assert!(kb.document_ids.contains(&a.id) && kb.document_ids.contains(&b.id));
        assert!(restored.get_document("orphan").is_none());
        assert_eq!(restored.get_document(&a.id), Some(&a));
    }
}
