//! Knowledge 모듈 - 문서 인덱싱 및 검색 엔진
//!
//! - Chunker: 문단/문장 경계 기반 텍스트 분할 + 오버랩
//! - Scorer: TF 단어 벡터 + 코사인 유사도
//! - Index: 지식베이스/문서/청크 인메모리 저장소
//! - Retriever: 결정적 top-K 검색
//! - Context: 문자 수 제한 내 RAG 컨텍스트 조립
//! - Analytics: 지식베이스 통계 + 검색 기록
//! - Service: 비동기 공유 파사드
//! - Store: SQLite 스냅샷

mod analytics;
mod chunker;
mod context;
mod index;
mod model;
mod retriever;
mod scorer;
mod service;
mod store;

// Re-exports
pub use analytics::{
    AnalyticsReporter, ChunkStats, DocumentStats, KnowledgeBaseAnalytics, QueryCount, QueryLog,
    QueryRecord, QueryStats,
};
pub use chunker::{chunk_text, ChunkConfig, Chunker, SentenceChunker, DEFAULT_CHUNK_SIZE};
pub use context::{ContextBuilder, RagContext, DEFAULT_CONTEXT_CHARS};
pub use index::{KnowledgeIndex, PreparedContent};
pub use model::{
    content_hash, Document, DocumentChunk, DocumentOptions, DocumentType, DocumentUpdate,
    KnowledgeBase, KnowledgeBaseFilter, KnowledgeBaseSettings, KnowledgeBaseUpdate,
    SettingsUpdate, DEFAULT_TOP_K,
};
pub use retriever::{RetrievalResult, Retriever, SearchOptions};
pub use scorer::{similarity, tokenize, vectorize, TermVector};
pub use service::KnowledgeService;
pub use store::{SnapshotStore, StoreStats};
