//! agentforge-kb - 지식베이스 문서 인덱싱 및 검색 엔진
//!
//! 문서를 청크로 나누고 단어 빈도 벡터로 인덱싱한 뒤,
//! 코사인 유사도로 검색하고 RAG 컨텍스트/프롬프트를 조립합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use config::{get_data_dir, AppConfig};
pub use error::{KnowledgeError, KnowledgeResult};
pub use knowledge::{
    AnalyticsReporter, ChunkConfig, ContextBuilder, Document, DocumentChunk, DocumentType,
    KnowledgeBase, KnowledgeBaseAnalytics, KnowledgeBaseSettings, KnowledgeIndex,
    KnowledgeService, RagContext, RetrievalResult, Retriever, SearchOptions, SnapshotStore,
};
pub use scraper::{DocumentSource, ScrapedContent, WebScraper};
