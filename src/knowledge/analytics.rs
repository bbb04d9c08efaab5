//! 지식베이스 통계 및 검색 기록
//!
//! 인덱스 현재 상태와 추가 전용 검색 기록에서 파생되는 값만 다룹니다.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, KnowledgeResult};

use super::index::KnowledgeIndex;
use super::model::DocumentType;

/// 인기 검색어 개수
const TOP_QUERY_LIMIT: usize = 5;
/// 최근 검색 기록 개수
const RECENT_QUERY_LIMIT: usize = 10;

// ============================================================================
// Query Log
// ============================================================================

/// 검색 기록 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub knowledge_base_id: String,
    pub query: String,
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// 추가 전용 검색 기록
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    records: Vec<QueryRecord>,
}

impl QueryLog {
    pub fn record(&mut self, record: QueryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn for_knowledge_base<'a>(
        &'a self,
        kb_id: &'a str,
    ) -> impl Iterator<Item = &'a QueryRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.knowledge_base_id == kb_id)
    }

    /// 삭제된 지식베이스의 기록 제거
    pub fn remove_knowledge_base(&mut self, kb_id: &str) {
        self.records.retain(|r| r.knowledge_base_id != kb_id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Analytics Types
// ============================================================================

/// 지식베이스 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeBaseAnalytics {
    pub knowledge_base_id: String,
    pub document_stats: DocumentStats,
    pub chunk_stats: ChunkStats,
    pub total_size_bytes: usize,
    pub query_stats: QueryStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentStats {
    pub total: usize,
    pub by_type: BTreeMap<DocumentType, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    pub total: usize,
    pub avg_per_document: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryStats {
    pub total_queries: usize,
    pub average_result_count: f64,
    /// 결과가 0건이었던 검색 수
    pub zero_result_queries: usize,
    /// 일자별 검색 수 (UTC)
    pub daily_volume: BTreeMap<NaiveDate, usize>,
    pub top_queries: Vec<QueryCount>,
    /// 최신순
    pub recent_queries: Vec<QueryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCount {
    pub query: String,
    pub count: usize,
}

// ============================================================================
// AnalyticsReporter
// ============================================================================

/// 지식베이스 통계 집계기
pub struct AnalyticsReporter<'a> {
    index: &'a KnowledgeIndex,
}

impl<'a> AnalyticsReporter<'a> {
    pub fn new(index: &'a KnowledgeIndex) -> Self {
        Self { index }
    }

    /// 지식베이스 통계 계산
    pub fn knowledge_base_analytics(&self, kb_id: &str) -> KnowledgeResult<KnowledgeBaseAnalytics> {
        if self.index.get_knowledge_base(kb_id).is_none() {
            return Err(KnowledgeError::not_found(kb_id));
        }

        let documents = self.index.list_documents(kb_id);

        let mut document_stats = DocumentStats {
            total: documents.len(),
            ..Default::default()
        };
        let mut chunk_total = 0;
        let mut total_size_bytes = 0;

        for doc in &documents {
            *document_stats.by_type.entry(doc.doc_type).or_insert(0) += 1;
            chunk_total += doc.chunks.len();
            total_size_bytes += doc.size;
        }

        let avg_per_document = if documents.is_empty() {
            0.0
        } else {
            chunk_total as f64 / documents.len() as f64
        };

        Ok(KnowledgeBaseAnalytics {
            knowledge_base_id: kb_id.to_string(),
            document_stats,
            chunk_stats: ChunkStats {
                total: chunk_total,
                avg_per_document,
            },
            total_size_bytes,
            query_stats: self.query_stats(kb_id),
        })
    }

    /// 검색 기록 요약
    fn query_stats(&self, kb_id: &str) -> QueryStats {
        let records: Vec<&QueryRecord> = self.index.query_log().for_knowledge_base(kb_id).collect();
        if records.is_empty() {
            return QueryStats::default();
        }

        let mut daily_volume = BTreeMap::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut result_total = 0;
        let mut zero_result_queries = 0;

        for record in &records {
            *daily_volume.entry(record.timestamp.date_naive()).or_insert(0) += 1;
            *counts.entry(normalize_query(&record.query)).or_insert(0) += 1;
            result_total += record.result_count;
            if record.result_count == 0 {
                zero_result_queries += 1;
            }
        }

        let mut top_queries: Vec<QueryCount> = counts
            .into_iter()
            .filter(|(query, _)| !query.is_empty())
            .map(|(query, count)| QueryCount { query, count })
            .collect();
        top_queries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        top_queries.truncate(TOP_QUERY_LIMIT);

        // 같은 시각이면 나중에 기록된 것이 앞
        let mut recent: Vec<(usize, &QueryRecord)> = records.iter().copied().enumerate().collect();
        recent.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then_with(|| b.0.cmp(&a.0)));
        let recent_queries = recent
            .into_iter()
            .take(RECENT_QUERY_LIMIT)
            .map(|(_, r)| r.clone())
            .collect();

        QueryStats {
            total_queries: records.len(),
            average_result_count: result_total as f64 / records.len() as f64,
            zero_result_queries,
            daily_volume,
            top_queries,
            recent_queries,
        }
    }
}

/// 검색어 정규화 (소문자 + 공백 정리)
fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::model::{DocumentOptions, SettingsUpdate};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn create_test_index() -> (KnowledgeIndex, String) {
        let mut index = KnowledgeIndex::new();
        let kb = index
            .create_knowledge_base(
                "Analytics",
                "",
                "owner",
                Some(SettingsUpdate {
                    chunk_size: Some(100),
                    chunk_overlap: Some(10),
                    ..Default::default()
                }),
            )
            .unwrap();
        (index, kb.id)
    }

    #[test]
    fn test_analytics_document_and_chunk_counts() {
        let (mut index, kb_id) = create_test_index();
        let a = index
            .add_document(&kb_id, "A", "This is a sentence. ".repeat(50), DocumentType::Text, DocumentOptions::default())
            .unwrap();
        let b = index
            .add_document(&kb_id, "B", "# Title\n\nShort.", DocumentType::Markdown, DocumentOptions::default())
            .unwrap();
        let c = index
            .add_document(&kb_id, "C", "fn main() {}", DocumentType::Markdown, DocumentOptions::default())
            .unwrap();

        let analytics = AnalyticsReporter::new(&index).knowledge_base_analytics(&kb_id).unwrap();

        assert_eq!(analytics.document_stats.total, 3);
        assert_eq!(analytics.document_stats.by_type.get(&DocumentType::Text), Some(&1));
        assert_eq!(analytics.document_stats.by_type.get(&DocumentType::Markdown), Some(&2));
        assert_eq!(analytics.document_stats.by_type.get(&DocumentType::Pdf), None);

        let chunk_total = a.chunks.len() + b.chunks.len() + c.chunks.len();
        assert_eq!(analytics.chunk_stats.total, chunk_total);
        assert!((analytics.chunk_stats.avg_per_document - chunk_total as f64 / 3.0).abs() < 1e-9);
        assert_eq!(analytics.total_size_bytes, a.size + b.size + c.size);
    }

    #[test]
    fn test_analytics_tracks_live_index() {
        let (mut index, kb_id) = create_test_index();
        let doc = index
            .add_document(&kb_id, "A", "alpha beta", DocumentType::Text, DocumentOptions::default())
            .unwrap();
        index.delete_document(&doc.id);

        let analytics = AnalyticsReporter::new(&index).knowledge_base_analytics(&kb_id).unwrap();
        assert_eq!(analytics.document_stats.total, 0);
        assert_eq!(analytics.chunk_stats.total, 0);
        assert_eq!(analytics.chunk_stats.avg_per_document, 0.0);
        assert_eq!(analytics.total_size_bytes, 0);
    }

    #[test]
    fn test_query_stats() {
        let (mut index, kb_id) = create_test_index();
        index.track_query(&kb_id, "Rust traits", 3, at(1, 9)).unwrap();
        index.track_query(&kb_id, "rust  traits", 1, at(1, 10)).unwrap();
        index.track_query(&kb_id, "pasta", 0, at(2, 8)).unwrap();

        let stats = AnalyticsReporter::new(&index)
            .knowledge_base_analytics(&kb_id)
            .unwrap()
            .query_stats;

        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.zero_result_queries, 1);
        assert!((stats.average_result_count - 4.0 / 3.0).abs() < 1e-9);

        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(stats.daily_volume.get(&day1), Some(&2));
        assert_eq!(stats.daily_volume.get(&day2), Some(&1));

        assert_eq!(
            stats.top_queries[0],
            QueryCount { query: "rust traits".to_string(), count: 2 }
        );
        assert_eq!(stats.recent_queries[0].query, "pasta");
        assert_eq!(stats.recent_queries.len(), 3);
    }

    #[test]
    fn test_query_stats_isolated_per_knowledge_base() {
        let (mut index, kb_id) = create_test_index();
        let other = index.create_knowledge_base("Other", "", "owner", None).unwrap();
        index.track_query(&other.id, "elsewhere", 2, at(3, 0)).unwrap();

        let stats = AnalyticsReporter::new(&index)
            .knowledge_base_analytics(&kb_id)
            .unwrap()
            .query_stats;
        assert_eq!(stats, QueryStats::default());
    }

    #[test]
    fn test_analytics_missing_knowledge_base() {
        let index = KnowledgeIndex::new();
        let err = AnalyticsReporter::new(&index)
            .knowledge_base_analytics("missing")
            .unwrap_err();
        assert_eq!(err, KnowledgeError::not_found("missing"));
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Hello   World "), "hello world");
        assert_eq!(normalize_query(""), "");
    }
}
