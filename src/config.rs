//! Configuration
//!
//! `.env` 파일과 환경 변수에서 실행 설정을 읽습니다.
//! Vault 키 자체는 여기서 읽지 않고 `secrets::LazyVault`가 첫 사용 시 로드합니다.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::secrets::VAULT_KEY_ENV;

pub const DEFAULT_DATABASE_PATH: &str = "instance/app.db";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// SMTP 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_SERVER.to_string(),
            port: DEFAULT_SMTP_PORT,
        }
    }
}

/// AI provider 설정
///
/// `openai_api_key`/`google_api_key`는 운영자 키로, 사용자 키가 없을 때만 사용합니다.
#[derive(Clone, PartialEq, Eq)]
pub struct AiSettings {
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub google_api_key: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            google_api_key: None,
        }
    }
}

impl std::fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiSettings")
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_model", &self.gemini_model)
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// 전체 실행 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Vault 키를 담은 환경 변수 이름
    pub vault_key_env: String,
    pub smtp: SmtpSettings,
    pub ai: AiSettings,
}

impl AppConfig {
    /// 현재 프로세스 환경 변수에서 설정 생성
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수 기반 생성 (테스트에서 환경 변수 없이 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 비어 있는 값은 미설정으로 취급
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_path = get("DATABASE_URL")
            .map(|url| database_path_from_url(&url))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let smtp_port = match get("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("SMTP_PORT is not a valid port: {}", raw)))?,
            None => DEFAULT_SMTP_PORT,
        };

        let gemini_model = get("GEMINI_MODEL")
            .map(|m| m.trim_start_matches("models/").to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Ok(Self {
            database_path,
            vault_key_env: get("MAILWISE_VAULT_KEY_ENV").unwrap_or_else(|| VAULT_KEY_ENV.to_string()),
            smtp: SmtpSettings {
                host: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                port: smtp_port,
            },
            ai: AiSettings {
                openai_base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                openai_api_key: get("OPENAI_API_KEY"),
                gemini_base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                gemini_model,
                google_api_key: get("GOOGLE_API_KEY"),
            },
        })
    }
}

/// `sqlite:///instance/app.db` 형식도 허용
fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn find_upwards(start: &Path, filename: &str, max_hops: usize) -> Option<PathBuf> {
    let mut cur = start.to_path_buf();
    for _ in 0..=max_hops {
        let candidate = cur.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !cur.pop() {
            break;
        }
    }
    None
}

/// `.env.local` → `.env` 순서로 로드 (없어도 실패하지 않음)
///
/// 이미 설정된 환경 변수는 덮어쓰지 않습니다.
pub fn load_env_files() {
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };

    for filename in [".env.local", ".env"] {
        let Some(path) = find_upwards(&cwd, filename, 4) else {
            continue;
        };
        match dotenvy::from_path(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Loaded env file"),
            Err(e) => tracing::warn!(path = %path.display(), "Failed to parse env file: {}", e),
        }
    }
}
