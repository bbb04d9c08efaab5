//! CLI 모듈
//!
//! agentforge-kb CLI 명령어 정의 및 구현
//!
//! 모든 명령은 스냅샷을 읽어 `KnowledgeService`로 실행하고,
//! 상태를 바꾼 경우에만 다시 저장합니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::AppConfig;
use crate::extractor::ContentExtractor;
use crate::knowledge::{
    content_hash, Document, DocumentOptions, DocumentType, DocumentUpdate, KnowledgeBase,
    KnowledgeBaseFilter, KnowledgeBaseUpdate, KnowledgeService, SearchOptions, SettingsUpdate,
    SnapshotStore,
};
use crate::scraper::{DocumentSource, WebScraper};

/// `prompt` 명령 기본 시스템 프롬프트
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the question using only the provided context and cite the sources you use.";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "agentforge-kb")]
#[command(version, about = "지식베이스 문서 인덱싱 및 검색 엔진", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 지식베이스 생성
    Create {
        /// 지식베이스 이름
        name: String,

        /// 설명
        #[arg(short, long, default_value = "")]
        description: String,

        /// 소유자 ID
        #[arg(long, default_value = "local")]
        owner: String,

        /// 청크 크기 (문자 수)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// 청크 오버랩 (문자 수, 미지정 시 chunk_size / 10)
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// 기본 검색 결과 개수
        #[arg(long)]
        top_k: Option<usize>,

        /// 최소 유사도 점수 (0.0 ~ 1.0)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// 지식베이스 목록
    Bases {
        /// 소유자 필터
        #[arg(long)]
        owner: Option<String>,

        /// 이름 포함 필터
        #[arg(long)]
        name: Option<String>,
    },

    /// 지식베이스 이름/설정 변경 (기존 청크는 reindex 전까지 유지)
    Configure {
        /// 지식베이스 ID 또는 이름
        kb: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        chunk_overlap: Option<usize>,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long, conflicts_with = "clear_threshold")]
        threshold: Option<f64>,

        /// 최소 점수 제거
        #[arg(long)]
        clear_threshold: bool,
    },

    /// 지식베이스 삭제 (문서/청크 포함)
    #[command(name = "drop")]
    DropBase {
        /// 지식베이스 ID 또는 이름
        kb: String,
    },

    /// 현재 설정으로 모든 문서 재청킹
    Reindex {
        /// 지식베이스 ID 또는 이름
        kb: String,
    },

    /// 텍스트, 파일, 폴더, 또는 URL을 지식베이스에 추가
    Ingest {
        /// 지식베이스 ID 또는 이름
        kb: String,

        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 수집할 URL
        #[arg(short, long)]
        url: Option<String>,

        /// 문서 이름 (텍스트/URL/단일 파일)
        #[arg(short, long)]
        name: Option<String>,

        /// 문서 타입 (text, markdown, url, code, csv, pdf)
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,

        /// 태그 (여러 번 지정 가능)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// PDF 파일 건너뛰기
        #[arg(long)]
        skip_pdfs: bool,

        /// 같은 내용의 문서가 있어도 추가
        #[arg(long)]
        force: bool,
    },

    /// 문서 목록
    Docs {
        /// 지식베이스 ID 또는 이름
        kb: String,

        /// 태그 필터
        #[arg(long)]
        tag: Option<String>,
    },

    /// 문서 상세
    Show {
        /// 문서 ID (앞부분만 입력 가능)
        id: String,

        /// 청크 내용 출력
        #[arg(long)]
        chunks: bool,
    },

    /// 문서 수정 (전체 재청킹)
    Update {
        /// 문서 ID (앞부분만 입력 가능)
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        /// 새 내용 (직접 입력)
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// 새 내용 (파일)
        #[arg(long)]
        file: Option<PathBuf>,

        /// 태그 교체 (여러 번 지정 가능)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// 태그 모두 제거
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },

    /// 문서 삭제
    Delete {
        /// 문서 ID (앞부분만 입력 가능)
        id: String,
    },

    /// 지식베이스 검색
    Query {
        /// 지식베이스 ID 또는 이름
        kb: String,

        /// 검색 쿼리
        query: String,

        /// 결과 개수 (기본: 지식베이스 설정)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 태그 필터 (하나라도 일치)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// 최소 점수
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// 검색 결과로 RAG 컨텍스트 조립
    Context {
        kb: String,
        query: String,

        /// 최대 문자 수 (기본: AGENTFORGE_KB_CONTEXT_CHARS)
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// 시스템 프롬프트 + 컨텍스트 + 질문 프롬프트 생성
    Prompt {
        kb: String,
        query: String,

        #[arg(short, long, default_value = DEFAULT_SYSTEM_PROMPT)]
        system: String,

        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// 지식베이스 통계
    Stats {
        /// 지식베이스 ID 또는 이름
        kb: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// Session
// ============================================================================

/// 설정 + 스냅샷 저장소 + 서비스
pub struct Session {
    config: AppConfig,
    store: SnapshotStore,
    service: KnowledgeService,
}

impl Session {
    /// 저장소를 열고 스냅샷 복원
    pub fn open(config: AppConfig) -> Result<Self> {
        let store = SnapshotStore::open_default(&config).context("지식베이스 저장소 열기 실패")?;
        let index = store
            .load(config.default_settings)
            .context("스냅샷 복원 실패")?;

        Ok(Self {
            config,
            store,
            service: KnowledgeService::new(index),
        })
    }

    pub fn service(&self) -> &KnowledgeService {
        &self.service
    }

    /// 현재 인덱스를 스냅샷으로 저장
    pub async fn save(&self) -> Result<()> {
        self.service
            .with_index(|index| self.store.save(index))
            .await
            .context("스냅샷 저장 실패")
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env().context("설정 읽기 실패")?;
    let session = Session::open(config)?;
    execute(&session, cli.command).await
}

/// 열린 세션에서 명령어 실행
pub async fn execute(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Create {
            name,
            description,
            owner,
            chunk_size,
            chunk_overlap,
            top_k,
            threshold,
        } => {
            let settings = SettingsUpdate {
                chunk_size,
                chunk_overlap,
                retrieval_top_k: top_k,
                score_threshold: threshold.map(Some),
            };
            cmd_create(session, &name, &description, &owner, settings).await
        }
        Commands::Bases { owner, name } => {
            let filter = KnowledgeBaseFilter {
                owner_id: owner,
                name_contains: name,
            };
            cmd_bases(session, &filter).await
        }
        Commands::Configure {
            kb,
            name,
            description,
            chunk_size,
            chunk_overlap,
            top_k,
            threshold,
            clear_threshold,
        } => {
            let settings = SettingsUpdate {
                chunk_size,
                chunk_overlap,
                retrieval_top_k: top_k,
                score_threshold: if clear_threshold {
                    Some(None)
                } else {
                    threshold.map(Some)
                },
            };
            let update = KnowledgeBaseUpdate {
                name,
                description,
                settings: (!settings.is_empty()).then_some(settings),
            };
            cmd_configure(session, &kb, update).await
        }
        Commands::DropBase { kb } => cmd_drop(session, &kb).await,
        Commands::Reindex { kb } => cmd_reindex(session, &kb).await,
        Commands::Ingest {
            kb,
            text,
            file,
            dir,
            url,
            name,
            doc_type,
            tags,
            skip_pdfs,
            force,
        } => {
            let source = match (text, file, dir, url) {
                (Some(text), None, None, None) => IngestSource::Text(text),
                (None, Some(file), None, None) => IngestSource::File(file),
                (None, None, Some(dir), None) => IngestSource::Dir(dir),
                (None, None, None, Some(url)) => IngestSource::Url(url),
                _ => bail!("--text, --file, --dir, --url 중 하나만 지정해야 합니다"),
            };
            let options = IngestOptions {
                name,
                doc_type,
                tags,
                skip_pdfs,
                force,
            };
            cmd_ingest(session, &kb, source, options).await
        }
        Commands::Docs { kb, tag } => cmd_docs(session, &kb, tag.as_deref()).await,
        Commands::Show { id, chunks } => cmd_show(session, &id, chunks).await,
        Commands::Update {
            id,
            name,
            text,
            file,
            tags,
            clear_tags,
        } => {
            let content = match (text, file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("파일 읽기 실패: {:?}", path))?,
                ),
                (None, None) => None,
            };
            let tags = if clear_tags {
                Some(vec![])
            } else if tags.is_empty() {
                None
            } else {
                Some(tags)
            };
            let update = DocumentUpdate {
                name,
                content,
                tags,
            };
            cmd_update(session, &id, update).await
        }
        Commands::Delete { id } => cmd_delete(session, &id).await,
        Commands::Query {
            kb,
            query,
            top_k,
            tags,
            min_score,
        } => {
            let options = SearchOptions {
                top_k,
                tags,
                min_score,
            };
            cmd_query(session, &kb, &query, &options).await
        }
        Commands::Context {
            kb,
            query,
            max_chars,
        } => cmd_context(session, &kb, &query, max_chars).await,
        Commands::Prompt {
            kb,
            query,
            system,
            max_chars,
        } => cmd_prompt(session, &kb, &query, &system, max_chars).await,
        Commands::Stats { kb } => cmd_stats(session, &kb).await,
        Commands::Status => cmd_status(session).await,
    }
}

// ============================================================================
// Knowledge Base Commands
// ============================================================================

/// 지식베이스 생성 명령어 (create)
async fn cmd_create(
    session: &Session,
    name: &str,
    description: &str,
    owner: &str,
    settings: SettingsUpdate,
) -> Result<()> {
    let overrides = (!settings.is_empty()).then_some(settings);
    let kb = session
        .service
        .create_knowledge_base(name, description, owner, overrides)
        .await
        .context("지식베이스 생성 실패")?;
    session.save().await?;

    println!("[OK] 지식베이스가 생성되었습니다 (ID: {})", kb.id);
    print_settings(&kb);
    Ok(())
}

/// 지식베이스 목록 명령어 (bases)
async fn cmd_bases(session: &Session, filter: &KnowledgeBaseFilter) -> Result<()> {
    let bases = session.service.list_knowledge_bases(filter).await;

    if bases.is_empty() {
        println!("[!] 지식베이스가 없습니다.");
        return Ok(());
    }

    println!("[OK] 지식베이스 ({} 개):\n", bases.len());
    for kb in bases {
        println!("  {} [{}]", kb.name, kb.owner_id);
        println!("        ID: {}", kb.id);
        if !kb.description.is_empty() {
            println!("        {}", truncate_text(&kb.description, 60));
        }
        println!(
            "        {} 문서 | {}",
            kb.document_ids.len(),
            kb.created_at.format("%Y-%m-%d %H:%M")
        );
        println!();
    }
    Ok(())
}

/// 지식베이스 설정 변경 명령어 (configure)
async fn cmd_configure(session: &Session, key: &str, update: KnowledgeBaseUpdate) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let chunking_changed = update
        .settings
        .as_ref()
        .map(|s| s.chunk_size.is_some() || s.chunk_overlap.is_some())
        .unwrap_or(false);

    let kb = session
        .service
        .update_knowledge_base(&kb.id, update)
        .await
        .context("지식베이스 수정 실패")?;
    session.save().await?;

    println!("[OK] 지식베이스가 수정되었습니다: {}", kb.name);
    print_settings(&kb);
    if chunking_changed && !kb.document_ids.is_empty() {
        println!("[!] 기존 문서에 새 청킹 설정을 적용하려면 reindex를 실행하세요.");
    }
    Ok(())
}

/// 지식베이스 삭제 명령어 (drop)
async fn cmd_drop(session: &Session, key: &str) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let removed = session
        .service
        .delete_knowledge_base(&kb.id)
        .await
        .context("지식베이스 삭제 실패")?;
    session.save().await?;

    println!(
        "[OK] 지식베이스 '{}' 삭제됨 (문서 {} 건)",
        removed.name,
        removed.document_ids.len()
    );
    Ok(())
}

/// 재청킹 명령어 (reindex)
async fn cmd_reindex(session: &Session, key: &str) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let chunks = session
        .service
        .reindex_knowledge_base(&kb.id)
        .await
        .context("재청킹 실패")?;
    session.save().await?;

    println!(
        "[OK] '{}' 재청킹 완료: 문서 {} 건, 청크 {} 개",
        kb.name,
        kb.document_ids.len(),
        chunks
    );
    Ok(())
}

// ============================================================================
// Ingest
// ============================================================================

/// 수집 입력
enum IngestSource {
    Text(String),
    File(PathBuf),
    Dir(PathBuf),
    Url(String),
}

struct IngestOptions {
    name: Option<String>,
    doc_type: Option<DocumentType>,
    tags: Vec<String>,
    skip_pdfs: bool,
    force: bool,
}

/// 문서 하나 추가 결과
enum IngestOutcome {
    Added(Document),
    /// 같은 내용의 기존 문서 이름
    Duplicate(String),
}

/// 문서 수집 명령어 (ingest)
///
/// 텍스트, 파일, 폴더, 또는 URL에서 콘텐츠를 가져와 지식베이스에 추가합니다.
async fn cmd_ingest(
    session: &Session,
    key: &str,
    source: IngestSource,
    options: IngestOptions,
) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;

    match source {
        IngestSource::Text(text) => {
            let name = options.name.clone().unwrap_or_else(|| "direct-input".to_string());
            let doc_type = options.doc_type.unwrap_or(DocumentType::Text);
            let outcome = ingest_one(session, &kb.id, &name, text, doc_type, &options).await?;
            report_outcome(&outcome);
        }
        IngestSource::Url(url) => {
            println!("[*] URL 스크래핑 중: {}", url);
            let scraper = WebScraper::new().context("WebScraper 생성 실패")?;
            let fetched = scraper.fetch(&url).await.context("URL 스크래핑 실패")?;

            let name = options.name.clone().unwrap_or(fetched.name);
            let doc_type = options.doc_type.unwrap_or(fetched.doc_type);
            let outcome =
                ingest_one(session, &kb.id, &name, fetched.content, doc_type, &options).await?;
            report_outcome(&outcome);
            println!("     URL: {}", fetched.location);
        }
        IngestSource::File(path) => {
            ingest_files(session, &kb, Some(path), None, &options).await?;
        }
        IngestSource::Dir(path) => {
            ingest_files(session, &kb, None, Some(path), &options).await?;
        }
    }

    session.save().await
}

/// 파일/폴더 수집
async fn ingest_files(
    session: &Session,
    kb: &KnowledgeBase,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    options: &IngestOptions,
) -> Result<()> {
    let collector = FileCollector::new(CollectorConfig {
        skip_pdfs: options.skip_pdfs,
        ..Default::default()
    });
    let extractor = ContentExtractor::new();

    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    let by_type: Vec<String> = stats
        .by_type
        .iter()
        .map(|(t, n)| format!("{}: {}", t, n))
        .collect();
    println!("    {}", by_type.join(", "));
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let single_file = files.len() == 1;
    let mut added = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for (i, collected) in files.iter().enumerate() {
        let file_name = collected.file_name();
        println!(
            "[{}/{}] [{}] {}",
            i + 1,
            files.len(),
            collected.doc_type,
            file_name
        );

        let contents = match extractor.extract(&collected.path, collected.doc_type).await {
            Ok(c) => c,
            Err(e) => {
                println!("      실패: {}", e);
                failed += 1;
                continue;
            }
        };

        // PDF는 페이지별 문서
        for content in contents {
            let base_name = match options.name {
                Some(ref name) if single_file => name.clone(),
                _ => file_name.clone(),
            };
            let name = content.document_name(&base_name);
            let doc_type = options.doc_type.unwrap_or(content.doc_type);

            match ingest_one(session, &kb.id, &name, content.text, doc_type, options).await {
                Ok(IngestOutcome::Added(doc)) => {
                    println!("      추가: {} ({} 청크)", doc.name, doc.chunks.len());
                    added += 1;
                }
                Ok(IngestOutcome::Duplicate(existing)) => {
                    println!("      건너뜀: '{}'와 같은 내용", existing);
                    skipped += 1;
                }
                Err(e) => {
                    println!("      저장 실패: {}", e);
                    failed += 1;
                }
            }
        }
    }

    println!();
    println!(
        "[OK] 완료: 추가 {}, 중복 건너뜀 {}, 실패 {}",
        added, skipped, failed
    );
    Ok(())
}

/// 문서 하나 추가 (force가 아니면 같은 내용은 건너뜀)
async fn ingest_one(
    session: &Session,
    kb_id: &str,
    name: &str,
    content: String,
    doc_type: DocumentType,
    options: &IngestOptions,
) -> Result<IngestOutcome> {
    if !options.force {
        let hash = content_hash(&content);
        let existing = session
            .service
            .with_index(|index| {
                index
                    .find_by_content_hash(kb_id, &hash)
                    .map(|doc| doc.name.clone())
            })
            .await;
        if let Some(existing) = existing {
            return Ok(IngestOutcome::Duplicate(existing));
        }
    }

    let doc = session
        .service
        .add_document(
            kb_id,
            name,
            content,
            doc_type,
            DocumentOptions::with_tags(options.tags.iter().cloned()),
        )
        .await
        .context("문서 추가 실패")?;
    Ok(IngestOutcome::Added(doc))
}

fn report_outcome(outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Added(doc) => {
            println!("[OK] 문서가 추가되었습니다 (ID: {})", doc.id);
            println!("     {} | {} 청크", doc.name, doc.chunks.len());
        }
        IngestOutcome::Duplicate(existing) => {
            println!(
                "[!] 같은 내용의 문서 '{}'가 이미 있습니다 (--force로 강제 추가)",
                existing
            );
        }
    }
}

// ============================================================================
// Document Commands
// ============================================================================

/// 문서 목록 명령어 (docs)
async fn cmd_docs(session: &Session, key: &str, tag: Option<&str>) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;

    let docs: Vec<Document> = match tag {
        Some(tag) => {
            session
                .service
                .with_index(|index| {
                    index
                        .documents_by_tag(&kb.id, tag)
                        .into_iter()
                        .cloned()
                        .collect()
                })
                .await
        }
        None => session.service.list_documents(&kb.id).await,
    };

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] '{}' 문서 ({} 건):\n", kb.name, docs.len());
    for doc in docs {
        println!("  [{}] {}", doc.doc_type, truncate_text(&doc.name, 50));
        println!("        ID: {}", doc.id);
        if !doc.tags.is_empty() {
            let tags: Vec<&str> = doc.tags.iter().map(String::as_str).collect();
            println!("        태그: {}", tags.join(", "));
        }
        println!(
            "        {} | {} | {} 청크",
            doc.updated_at.format("%Y-%m-%d %H:%M"),
            format_bytes(doc.size),
            doc.chunks.len()
        );
        println!();
    }
    Ok(())
}

/// 문서 상세 명령어 (show)
async fn cmd_show(session: &Session, key: &str, show_chunks: bool) -> Result<()> {
    let doc = resolve_document(&session.service, key).await?;

    println!("[OK] {}", doc.name);
    println!("     ID: {}", doc.id);
    println!("     지식베이스: {}", doc.knowledge_base_id);
    println!("     타입: {}", doc.doc_type);
    if !doc.tags.is_empty() {
        let tags: Vec<&str> = doc.tags.iter().map(String::as_str).collect();
        println!("     태그: {}", tags.join(", "));
    }
    println!("     크기: {}", format_bytes(doc.size));
    println!("     청크: {} 개", doc.chunks.len());
    println!(
        "     생성: {} | 수정: {}",
        doc.created_at.format("%Y-%m-%d %H:%M"),
        doc.updated_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    println!("{}", truncate_text(&doc.content, 300));

    if show_chunks {
        println!();
        for chunk in &doc.chunks {
            println!(
                "  #{} ({} chars, {} terms)",
                chunk.position,
                chunk.text.chars().count(),
                chunk.term_vector.len()
            );
            println!("     {}", truncate_text(&chunk.text, 200));
        }
    }
    Ok(())
}

/// 문서 수정 명령어 (update)
async fn cmd_update(session: &Session, key: &str, update: DocumentUpdate) -> Result<()> {
    let doc = resolve_document(&session.service, key).await?;

    let updated = session
        .service
        .update_document(&doc.id, update)
        .await
        .context("문서 수정 실패")?
        .ok_or_else(|| anyhow::anyhow!("ID {}인 문서를 찾을 수 없습니다", doc.id))?;
    session.save().await?;

    println!("[OK] 문서 수정됨: {} ({} 청크)", updated.name, updated.chunks.len());
    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(session: &Session, key: &str) -> Result<()> {
    let doc = resolve_document(&session.service, key).await?;

    match session.service.delete_document(&doc.id).await {
        Some(removed) => {
            session.save().await?;
            println!("[OK] 문서 삭제됨: {} ({})", removed.name, removed.id);
        }
        None => println!("[!] 삭제할 문서를 찾을 수 없습니다"),
    }
    Ok(())
}

// ============================================================================
// Retrieval Commands
// ============================================================================

/// 검색 명령어 (query)
///
/// 검색 후 검색 기록만 추가로 저장합니다.
async fn cmd_query(session: &Session, key: &str, query: &str, options: &SearchOptions) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    println!("[*] 검색 중: \"{}\"", query);

    let results = session
        .service
        .search_knowledge_base(&kb.id, query, options)
        .await
        .context("검색 실패")?;

    let record = session
        .service
        .track_query(&kb.id, query, results.len(), Utc::now())
        .await
        .context("검색 기록 실패")?;
    session
        .store
        .append_query(&record)
        .context("검색 기록 저장 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4}] {} #{}",
            i + 1,
            result.score,
            result.document_name,
            result.chunk.position
        );
        println!("   문서 ID: {}", result.chunk.document_id);
        println!("   내용: {}", truncate_text(&result.chunk.text, 200));
        println!();
    }
    Ok(())
}

/// 컨텍스트 명령어 (context)
async fn cmd_context(session: &Session, key: &str, query: &str, max_chars: Option<usize>) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let max_chars = max_chars.unwrap_or(session.config.context_chars);

    let context = session
        .service
        .build_rag_context(&kb.id, query, max_chars)
        .await
        .context("컨텍스트 생성 실패")?;

    if context.results.is_empty() {
        println!("[!] 컨텍스트에 포함할 청크가 없습니다.");
        return Ok(());
    }

    println!(
        "[OK] 청크 {} 개, {}/{} 문자\n",
        context.results.len(),
        context.formatted_context.chars().count(),
        max_chars
    );
    println!("{}", context.formatted_context);
    Ok(())
}

/// 프롬프트 명령어 (prompt)
async fn cmd_prompt(
    session: &Session,
    key: &str,
    query: &str,
    system: &str,
    max_chars: Option<usize>,
) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let max_chars = max_chars.unwrap_or(session.config.context_chars);

    let prompt = session
        .service
        .get_rag_prompt(&kb.id, query, system, Some(max_chars))
        .await
        .context("프롬프트 생성 실패")?;

    println!("{}", prompt);
    Ok(())
}

// ============================================================================
// Analytics / Status
// ============================================================================

/// 통계 명령어 (stats)
async fn cmd_stats(session: &Session, key: &str) -> Result<()> {
    let kb = resolve_kb(&session.service, key).await?;
    let analytics = session
        .service
        .get_knowledge_base_analytics(&kb.id)
        .await
        .context("통계 조회 실패")?;

    println!("[OK] '{}' 통계\n", kb.name);
    println!("  문서: {} 건", analytics.document_stats.total);
    for (doc_type, count) in &analytics.document_stats.by_type {
        println!("    {}: {}", doc_type, count);
    }
    println!(
        "  청크: {} 개 (문서당 평균 {:.1})",
        analytics.chunk_stats.total, analytics.chunk_stats.avg_per_document
    );
    println!("  총 크기: {}", format_bytes(analytics.total_size_bytes));

    let queries = &analytics.query_stats;
    println!();
    println!(
        "  검색: {} 회 (평균 결과 {:.1}, 결과 없음 {})",
        queries.total_queries, queries.average_result_count, queries.zero_result_queries
    );
    if !queries.daily_volume.is_empty() {
        println!("  일별 검색:");
        for (day, count) in &queries.daily_volume {
            println!("    {}: {}", day, count);
        }
    }
    if !queries.top_queries.is_empty() {
        println!("  인기 검색어:");
        for top in &queries.top_queries {
            println!("    {} ({})", truncate_text(&top.query, 40), top.count);
        }
    }
    if !queries.recent_queries.is_empty() {
        println!("  최근 검색:");
        for record in &queries.recent_queries {
            println!(
                "    {} \"{}\" → {} 건",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                truncate_text(&record.query, 40),
                record.result_count
            );
        }
    }
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(session: &Session) -> Result<()> {
    println!("agentforge-kb v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", session.config.data_dir.display());

    match session.store.stats() {
        Ok(stats) => {
            println!("[OK] DB: {}", stats.db_path.display());
            println!("     지식베이스: {} 개", stats.knowledge_base_count);
            println!(
                "     문서: {} 건 ({})",
                stats.document_count,
                format_bytes(stats.total_content_bytes)
            );
            println!("     청크: {} 개", stats.chunk_count);
            println!("     검색 기록: {} 건", stats.query_count);
        }
        Err(e) => {
            println!("[!] 통계 조회 실패: {}", e);
        }
    }

    let defaults = session.config.default_settings;
    println!(
        "[*] 기본 설정: chunk_size={}, overlap={}, top_k={}, context={} chars",
        defaults.chunk_size, defaults.chunk_overlap, defaults.retrieval_top_k, session.config.context_chars
    );
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// ID 또는 이름으로 지식베이스 찾기
async fn resolve_kb(service: &KnowledgeService, key: &str) -> Result<KnowledgeBase> {
    if let Some(kb) = service.get_knowledge_base(key).await {
        return Ok(kb);
    }

    let mut matches: Vec<KnowledgeBase> = service
        .list_knowledge_bases(&KnowledgeBaseFilter::default())
        .await
        .into_iter()
        .filter(|kb| kb.name == key)
        .collect();

    match matches.len() {
        0 => bail!("지식베이스 '{}'를 찾을 수 없습니다", key),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}' 이름의 지식베이스가 {} 개입니다. ID로 지정하세요", key, n),
    }
}

/// ID 또는 ID 앞부분으로 문서 찾기
async fn resolve_document(service: &KnowledgeService, key: &str) -> Result<Document> {
    if let Some(doc) = service.get_document(key).await {
        return Ok(doc);
    }

    let mut matches: Vec<Document> = service
        .with_index(|index| {
            index
                .documents()
                .into_iter()
                .filter(|doc| doc.id.starts_with(key))
                .cloned()
                .collect()
        })
        .await;

    match matches.len() {
        0 => bail!("ID {}인 문서를 찾을 수 없습니다", key),
        1 => Ok(matches.remove(0)),
        n => bail!("'{}'로 시작하는 문서가 {} 개입니다", key, n),
    }
}

fn print_settings(kb: &KnowledgeBase) {
    let s = &kb.settings;
    let threshold = s
        .score_threshold
        .map(|t| format!("{:.2}", t))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "     chunk_size={}, overlap={}, top_k={}, threshold={}",
        s.chunk_size, s.chunk_overlap, s.retrieval_top_k, threshold
    );
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
