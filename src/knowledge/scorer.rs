//! Scorer - 희소 단어 가중치 벡터와 코사인 유사도
//!
//! 텍스트마다 독립적으로 계산되는 TF 벡터입니다 (IDF 없음).
//! 문서를 추가/삭제해도 다른 청크의 벡터를 다시 계산할 필요가 없습니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 최소 토큰 길이 (문자 수)
pub const MIN_TOKEN_CHARS: usize = 2;

/// 불용어 (관사, 접속사, 주요 전치사)
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", // articles
    "and", "or", "but", "nor", "so", "yet", // conjunctions
    "in", "on", "at", "to", "for", "of", "with", "by", "from", "as", "into", "about", "over",
    "under", "between", "through", "after", "before", "during", "without",
];

// ============================================================================
// TermVector
// ============================================================================

/// 희소 단어 가중치 벡터
///
/// 가장 많이 등장한 단어의 가중치가 1.0이 되도록 정규화되어 있습니다.
/// 노름 제곱은 생성 시 한 번만 계산합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    weights: BTreeMap<String, f64>,
    /// 가중치 제곱합 (자기 자신과의 내적과 같은 순서로 합산)
    norm_sq: f64,
}

impl TermVector {
    /// 가중치 맵으로 생성
    pub fn from_weights(weights: BTreeMap<String, f64>) -> Self {
        let norm_sq = weights.values().map(|w| w * w).sum::<f64>();
        Self { weights, norm_sq }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    pub fn norm(&self) -> f64 {
        self.norm_sq.sqrt()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }
}

// ============================================================================
// Vectorize / Similarity
// ============================================================================

/// 텍스트를 토큰으로 분리
///
/// 소문자화 → 구두점 제거 → 공백 분리 → 짧은 토큰/불용어 제거
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// 텍스트를 TF 벡터로 변환
///
/// 각 단어 빈도를 최대 빈도로 나눕니다. 유효한 단어가 없으면 빈 벡터입니다.
pub fn vectorize(text: &str) -> TermVector {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let max_count = counts.values().copied().max().unwrap_or(0);
    if max_count == 0 {
        return TermVector::default();
    }

    let weights = counts
        .into_iter()
        .map(|(term, count)| (term, count as f64 / max_count as f64))
        .collect();

    TermVector::from_weights(weights)
}

/// 코사인 유사도 (0.0 ~ 1.0)
///
/// 어느 한쪽이 빈 벡터이면 0.0을 반환합니다.
pub fn similarity(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() || a.norm_sq == 0.0 || b.norm_sq == 0.0 {
        return 0.0;
    }

    // 작은 쪽을 순회
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot_product: f64 = small
        .weights
        .iter()
        .filter_map(|(term, w)| large.weights.get(term).map(|v| w * v))
        .sum();

    // sqrt(s * s) == s 이므로 자기 자신과의 유사도는 정확히 1.0
    (dot_product / (a.norm_sq * b.norm_sq).sqrt()).clamp(0.0, 1.0)
}

// ============================================================================
// Tests
// ============================================================================
