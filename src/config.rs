//! 환경 변수 기반 설정
//!
//! - `AGENTFORGE_KB_HOME`: 데이터 디렉토리 (기본: 로컬 데이터 디렉토리/.agentforge-kb)
//! - `AGENTFORGE_KB_CHUNK_SIZE`, `AGENTFORGE_KB_CHUNK_OVERLAP`, `AGENTFORGE_KB_TOP_K`:
//!   새 지식베이스의 기본 설정
//! - `AGENTFORGE_KB_CONTEXT_CHARS`: 컨텍스트 기본 최대 문자 수

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::knowledge::{KnowledgeBaseSettings, SettingsUpdate, DEFAULT_CONTEXT_CHARS};

pub const ENV_HOME: &str = "AGENTFORGE_KB_HOME";
pub const ENV_CHUNK_SIZE: &str = "AGENTFORGE_KB_CHUNK_SIZE";
pub const ENV_CHUNK_OVERLAP: &str = "AGENTFORGE_KB_CHUNK_OVERLAP";
pub const ENV_TOP_K: &str = "AGENTFORGE_KB_TOP_K";
pub const ENV_CONTEXT_CHARS: &str = "AGENTFORGE_KB_CONTEXT_CHARS";

/// DB 파일 이름
const DB_FILE_NAME: &str = "knowledge.db";

/// 데이터 디렉토리 경로 (~/.agentforge-kb/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentforge-kb")
}

/// 애플리케이션 설정
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// 새 지식베이스에 적용되는 기본 설정
    pub default_settings: KnowledgeBaseSettings,
    /// 컨텍스트/프롬프트 기본 최대 문자 수
    pub context_chars: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            default_settings: KnowledgeBaseSettings::default(),
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정 읽기
    ///
    /// 잘못된 값은 보정하지 않고 에러를 반환합니다.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = read(ENV_HOME).map(PathBuf::from).unwrap_or_else(get_data_dir);

        let overrides = SettingsUpdate {
            chunk_size: parse_usize(ENV_CHUNK_SIZE, read(ENV_CHUNK_SIZE))?,
            chunk_overlap: parse_usize(ENV_CHUNK_OVERLAP, read(ENV_CHUNK_OVERLAP))?,
            retrieval_top_k: parse_usize(ENV_TOP_K, read(ENV_TOP_K))?,
            score_threshold: None,
        };
        let default_settings = KnowledgeBaseSettings::default().with_overrides(&overrides);
        default_settings
            .validate()
            .context("Invalid default knowledge base settings")?;

        let context_chars =
            parse_usize(ENV_CONTEXT_CHARS, read(ENV_CONTEXT_CHARS))?.unwrap_or(DEFAULT_CONTEXT_CHARS);

        Ok(Self {
            data_dir,
            default_settings,
            context_chars,
        })
    }

    /// DB 파일 경로 (<data_dir>/knowledge.db)
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

fn parse_usize(key: &str, value: Option<String>) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, v))
        })
        .transpose()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.default_settings, KnowledgeBaseSettings::default());
        assert_eq!(config.context_chars, DEFAULT_CONTEXT_CHARS);
        assert!(config.data_dir.ends_with(".agentforge-kb"));
        assert!(config.db_path().ends_with("knowledge.db"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_HOME, "/tmp/kb-home"),
            (ENV_CHUNK_SIZE, "200"),
            (ENV_TOP_K, "8"),
            (ENV_CONTEXT_CHARS, " 1500 "),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/kb-home"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/kb-home/knowledge.db"));
        assert_eq!(config.default_settings.chunk_size, 200);
        // 오버랩 미지정 시 chunk_size / 10
        assert_eq!(config.default_settings.chunk_overlap, 20);
        assert_eq!(config.default_settings.retrieval_top_k, 8);
        assert_eq!(config.context_chars, 1500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[(ENV_CHUNK_SIZE, "abc")]).is_err());
        assert!(config_from(&[(ENV_TOP_K, "-1")]).is_err());
        assert!(config_from(&[(ENV_CHUNK_SIZE, "0")]).is_err());
        assert!(config_from(&[(ENV_CHUNK_SIZE, "100"), (ENV_CHUNK_OVERLAP, "100")]).is_err());
    }

    #[test]
    fn test_empty_value_ignored() {
        let config = config_from(&[(ENV_CHUNK_SIZE, "  ")]).unwrap();
        assert_eq!(config.default_settings.chunk_size, 500);
    }
}
