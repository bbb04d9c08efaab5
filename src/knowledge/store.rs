//! Snapshot Store - rusqlite 기반 지식베이스 영속화
//!
//! 인메모리 `KnowledgeIndex` 전체를 SQLite에 저장하고 다시 복원합니다.
//! 저장 위치: <data_dir>/knowledge.db
//!
//! 저장은 하나의 트랜잭션에서 전체 교체로 이루어지고, 복원 시
//! 지식베이스 → 문서 → 청크 참조 관계를 다시 검증합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;

use crate::config::AppConfig;

use super::analytics::QueryRecord;
use super::index::KnowledgeIndex;
use super::model::{Document, DocumentChunk, DocumentType, KnowledgeBase, KnowledgeBaseSettings};

// ============================================================================
// Types
// ============================================================================

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub knowledge_base_count: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub query_count: usize,
    pub total_content_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// SnapshotStore
// ============================================================================

/// SQLite 스냅샷 저장소
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SnapshotStore {
    /// 저장소 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - DB 파일 경로 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 설정의 데이터 디렉토리에서 열기
    pub fn open_default(config: &AppConfig) -> Result<Self> {
        if !config.data_dir.exists() {
            std::fs::create_dir_all(&config.data_dir)
                .context("Failed to create data directory")?;
        }

        Self::open(&config.db_path())
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_bases (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                owner_id TEXT NOT NULL,
                settings TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                knowledge_base_id TEXT NOT NULL,
                name TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                size INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                knowledge_base_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                term_vector TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                knowledge_base_id TEXT NOT NULL,
                query TEXT NOT NULL,
                result_count INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_kb ON documents(knowledge_base_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
            CREATE INDEX IF NOT EXISTS idx_queries_kb ON queries(knowledge_base_id);
            "#,
        )
        .context("Failed to create snapshot tables")?;

        tracing::debug!("Snapshot store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 인덱스 전체 저장 (기존 내용 교체)
    pub fn save(&self, index: &KnowledgeIndex) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute_batch(
            "DELETE FROM chunks; DELETE FROM documents; DELETE FROM knowledge_bases; DELETE FROM queries;",
        )
        .context("Failed to clear snapshot tables")?;

        {
            let mut insert_kb = tx.prepare(
                "INSERT INTO knowledge_bases (id, name, description, owner_id, settings, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for kb in index.knowledge_bases() {
                let settings = serde_json::to_string(&kb.settings)
                    .context("Failed to serialize settings")?;
                insert_kb
                    .execute(params![
                        kb.id,
                        kb.name,
                        kb.description,
                        kb.owner_id,
                        settings,
                        kb.created_at.to_rfc3339(),
                        kb.updated_at.to_rfc3339(),
                    ])
                    .with_context(|| format!("Failed to insert knowledge base {}", kb.id))?;
            }

            let mut insert_doc = tx.prepare(
                "INSERT INTO documents (id, knowledge_base_id, name, doc_type, content, tags, size, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (id, document_id, knowledge_base_id, position, text, term_vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for doc in index.documents() {
                let tags = serde_json::to_string(&doc.tags).context("Failed to serialize tags")?;
                insert_doc
                    .execute(params![
                        doc.id,
                        doc.knowledge_base_id,
                        doc.name,
                        doc.doc_type.as_str(),
                        doc.content,
                        tags,
                        doc.size as i64,
                        doc.content_hash,
                        doc.created_at.to_rfc3339(),
                        doc.updated_at.to_rfc3339(),
                    ])
                    .with_context(|| format!("Failed to insert document {}", doc.id))?;

                for chunk in &doc.chunks {
                    let vector = serde_json::to_string(&chunk.term_vector)
                        .context("Failed to serialize term vector")?;
                    insert_chunk.execute(params![
                        chunk.id,
                        chunk.document_id,
                        chunk.knowledge_base_id,
                        chunk.position as i64,
                        chunk.text,
                        vector,
                    ])?;
                }
            }

            let mut insert_query = tx.prepare(
                "INSERT INTO queries (knowledge_base_id, query, result_count, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in index.query_log().records() {
                insert_query.execute(params![
                    record.knowledge_base_id,
                    record.query,
                    record.result_count as i64,
                    record.timestamp.to_rfc3339(),
                ])?;
            }
        }

        tx.commit().context("Failed to commit snapshot")?;

        tracing::debug!(
            "Saved snapshot: {} documents, {} chunks",
            index.document_count(),
            index.chunk_count()
        );
        Ok(())
    }

    /// 검색 기록 한 건 추가 (스냅샷 전체를 다시 쓰지 않음)
    ///
    /// 지식베이스가 스냅샷에 없으면 아무것도 쓰지 않고 `false`를 반환합니다.
    pub fn append_query(&self, record: &QueryRecord) -> Result<bool> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let inserted = conn
            .execute(
                "INSERT INTO queries (knowledge_base_id, query, result_count, timestamp)
                 SELECT ?1, ?2, ?3, ?4 WHERE EXISTS (SELECT 1 FROM knowledge_bases WHERE id = ?1)",
                params![
                    record.knowledge_base_id,
                    record.query,
                    record.result_count as i64,
                    record.timestamp.to_rfc3339(),
                ],
            )
            .context("Failed to append query record")?;

        if inserted == 0 {
            tracing::warn!(
                "Query record for unsaved knowledge base {} not appended",
                record.knowledge_base_id
            );
        }
        Ok(inserted > 0)
    }

    /// 저장된 스냅샷에서 인덱스 복원
    ///
    /// # Arguments
    /// * `default_settings` - 이후 새로 만드는 지식베이스에 적용할 기본 설정
    pub fn load(&self, default_settings: KnowledgeBaseSettings) -> Result<KnowledgeIndex> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let knowledge_bases = load_knowledge_bases(&conn)?;
        let mut documents = load_documents(&conn)?;
        let queries = load_queries(&conn)?;

        let mut chunks_by_doc: HashMap<String, Vec<DocumentChunk>> = HashMap::new();
        for chunk in load_chunks(&conn)? {
            chunks_by_doc
                .entry(chunk.document_id.clone())
                .or_default()
                .push(chunk);
        }
        for doc in &mut documents {
            doc.chunks = chunks_by_doc.remove(&doc.id).unwrap_or_default();
        }

        let orphaned: usize = chunks_by_doc.values().map(Vec::len).sum();
        if orphaned > 0 {
            tracing::warn!("Dropping {} orphaned chunks", orphaned);
        }

        let index = KnowledgeIndex::restore(default_settings, knowledge_bases, documents, queries);
        tracing::debug!(
            "Loaded snapshot from {:?}: {} documents, {} chunks",
            self.db_path,
            index.document_count(),
            index.chunk_count()
        );
        Ok(index)
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            knowledge_base_count: count("SELECT COUNT(*) FROM knowledge_bases")?,
            document_count: count("SELECT COUNT(*) FROM documents")?,
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            query_count: count("SELECT COUNT(*) FROM queries")?,
            total_content_bytes: count("SELECT COALESCE(SUM(size), 0) FROM documents")?,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Row Loaders
// ============================================================================

fn load_knowledge_bases(conn: &Connection) -> Result<Vec<KnowledgeBase>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, owner_id, settings, created_at, updated_at
         FROM knowledge_bases ORDER BY created_at, id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read knowledge bases")?;

    rows.into_iter()
        .map(|(id, name, description, owner_id, settings, created_at, updated_at)| -> Result<KnowledgeBase> {
            let settings = serde_json::from_str(&settings)
                .with_context(|| format!("Invalid settings for knowledge base {}", id))?;
            Ok(KnowledgeBase {
                id,
                name,
                description,
                owner_id,
                settings,
                document_ids: Vec::new(),
                created_at: parse_datetime(created_at),
                updated_at: parse_datetime(updated_at),
            })
        })
        .collect()
}

fn load_documents(conn: &Connection) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT id, knowledge_base_id, name, doc_type, content, tags, size, content_hash, created_at, updated_at
         FROM documents ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read documents")?;

    rows.into_iter()
        .map(
            |(id, knowledge_base_id, name, doc_type, content, tags, size, content_hash, created_at, updated_at)| -> Result<Document> {
                let doc_type = doc_type
                    .parse::<DocumentType>()
                    .map_err(|e: String| anyhow::anyhow!("Document {}: {}", id, e))?;
                let tags = serde_json::from_str(&tags)
                    .with_context(|| format!("Invalid tags for document {}", id))?;
                Ok(Document {
                    id,
                    knowledge_base_id,
                    name,
                    doc_type,
                    content,
                    tags,
                    chunks: Vec::new(),
                    size: size as usize,
                    content_hash,
                    created_at: parse_datetime(created_at),
                    updated_at: parse_datetime(updated_at),
                })
            },
        )
        .collect()
}

fn load_chunks(conn: &Connection) -> Result<Vec<DocumentChunk>> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, knowledge_base_id, position, text, term_vector
         FROM chunks ORDER BY document_id, position",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read chunks")?;

    rows.into_iter()
        .map(|(id, document_id, knowledge_base_id, position, text, term_vector)| -> Result<DocumentChunk> {
            let term_vector = serde_json::from_str(&term_vector)
                .with_context(|| format!("Invalid term vector for chunk {}", id))?;
            Ok(DocumentChunk {
                id,
                document_id,
                knowledge_base_id,
                text,
                position: position as usize,
                term_vector,
            })
        })
        .collect()
}

fn load_queries(conn: &Connection) -> Result<Vec<QueryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT knowledge_base_id, query, result_count, timestamp FROM queries ORDER BY id",
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(QueryRecord {
                knowledge_base_id: row.get(0)?,
                query: row.get(1)?,
                result_count: row.get::<_, i64>(2)? as usize,
                timestamp: parse_datetime(row.get::<_, String>(3)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read query log")?;

    Ok(records)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
