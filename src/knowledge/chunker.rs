//! Text Chunking Module
//!
//! 문단 → 문장 → 강제 절단 순서로 경계를 찾아 텍스트를 청크로 나눕니다.
//! 모든 길이는 바이트가 아닌 문자(char) 수 기준입니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 기본 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 목표 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 다음 청크 앞에 붙일 이전 청크 꼬리 길이 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }

    /// 오버랩을 chunk_size / 10 으로 둔 설정
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self::new(chunk_size, chunk_size / 10)
    }

    /// 경계 탐색 허용 여유분 (chunk_size / 4)
    pub fn slack(&self) -> usize {
        self.chunk_size / 4
    }

    /// 오버랩 포함 청크 최대 길이 (1.25 × chunk_size)
    pub fn max_chunk_chars(&self) -> usize {
        self.chunk_size.max(1) + self.slack()
    }

    /// 실제 적용되는 오버랩 (항상 chunk_size 미만)
    fn effective_overlap(&self) -> usize {
        self.overlap.min(self.chunk_size.saturating_sub(1))
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할 (원문 순서 유지)
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문단/문장 경계 인식 청커
///
/// - 목표 길이 이하에서 가장 뒤쪽의 문단 경계, 없으면 문장 경계를 사용
/// - 목표 길이 안에 경계가 없으면 슬랙 구간(+25%)에서 가장 앞쪽 경계를 사용
/// - 그래도 없으면 목표 길이에서 강제 절단
/// - 첫 청크 이후에는 이전 세그먼트의 마지막 `overlap` 문자를 접두사로 붙임
///
/// 오버랩 접두사를 포함해도 청크는 `1.25 × chunk_size` 문자를 넘지 않습니다.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 오버랩 적용 전 원본 세그먼트
    ///
    /// 세그먼트를 이어 붙이면 원문과 같습니다 (공백뿐인 세그먼트는 제외).
    pub fn split_segments(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let chunk_size = self.config.chunk_size.max(1);
        let max_chars = self.config.max_chunk_chars();
        let overlap = self.config.effective_overlap();

        let mut segments: Vec<String> = Vec::new();
        let mut last_len = 0usize;
        let mut cursor = 0usize;

        while cursor < total {
            // 접두사로 붙을 길이만큼 이번 세그먼트 예산을 줄임
            let prefix = if segments.is_empty() { 0 } else { overlap.min(last_len) };
            let target = chunk_size - prefix;
            let limit = max_chars - prefix;
            let remaining = total - cursor;

            let end = if remaining <= target {
                total
            } else {
                match find_boundary(&chars, cursor, target, limit) {
                    Some(end) => end,
                    None if remaining <= limit => total,
                    None => cursor + target,
                }
            };

            let segment: String = chars[cursor..end].iter().collect();
            if !segment.trim().is_empty() {
                last_len = end - cursor;
                segments.push(segment);
            }
            cursor = end;
        }

        segments
    }

    /// 오버랩 적용
    fn apply_overlap(&self, segments: Vec<String>) -> Vec<String> {
        let overlap = self.config.effective_overlap();
        if overlap == 0 || segments.len() < 2 {
            return segments;
        }

        let mut chunks = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            if i == 0 {
                chunks.push(segment.clone());
            } else {
                let prefix = tail_chars(&segments[i - 1], overlap);
                chunks.push(format!("{}{}", prefix, segment));
            }
        }
        chunks
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let segments = self.split_segments(text);
        self.apply_overlap(segments)
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Boundary Detection
// ============================================================================

/// `end` 직전이 문단 경계(빈 줄)인지, 연속 줄바꿈의 끝인지 확인
fn is_paragraph_break(chars: &[char], end: usize) -> bool {
    if end < 2 || chars[end - 1] != '\n' || chars.get(end) == Some(&'\n') {
        return false;
    }
    chars[end - 2] == '\n' || (end >= 3 && chars[end - 2] == '\r' && chars[end - 3] == '\n')
}

/// `end` 직전이 문장 종결부호 + 공백인지 확인
fn is_sentence_end(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
}

/// `start`부터 시작하는 세그먼트의 끝 위치 탐색
///
/// 반환값은 절대 위치이며 항상 `start + limit` 이하입니다.
fn find_boundary(chars: &[char], start: usize, target: usize, limit: usize) -> Option<usize> {
    let total = chars.len();
    let target_end = (start + target).min(total);
    let limit_end = (start + limit).min(total);
    let min_end = start + (target / 2).max(1);

    let detectors: [fn(&[char], usize) -> bool; 2] = [is_paragraph_break, is_sentence_end];

    for is_boundary in detectors {
        if let Some(end) = (min_end..=target_end).rev().find(|&end| is_boundary(chars, end)) {
            return Some(end);
        }
        if let Some(end) = (target_end + 1..=limit_end).find(|&end| is_boundary(chars, end)) {
            return Some(end);
        }
    }

    None
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 마지막 `n` 문자 (UTF-8 안전)
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let start = s
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

/// 텍스트를 청크로 분할
///
/// # Arguments
/// * `text` - 분할할 텍스트
/// * `chunk_size` - 목표 청크 크기 (문자 수)
/// * `overlap` - 청크 간 중첩 문자 수
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    SentenceChunker::new(ChunkConfig::new(chunk_size, overlap)).chunk(text)
}

// ============================================================================
// Tests
// ============================================================================
