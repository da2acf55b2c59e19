//! Mailwise Error Types
//!
//! 애플리케이션 전역 에러 타입 정의

use serde::Serialize;
use thiserror::Error;

use crate::models::SecretKind;
use crate::secrets::VaultError;

/// Mailwise 애플리케이션 에러
///
/// 어떤 variant의 메시지에도 평문 시크릿이나 키 material은 들어가지 않습니다.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not allowed to access secrets of another account")]
    Forbidden,

    #[error("No {0} stored for this account")]
    SecretMissing(SecretKind),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("AI provider error: {0}")]
    Ai(String),
}

/// 호출자 응답용 직렬화 가능한 에러
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Database(_) => "DB_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Vault(VaultError::Configuration(_)) => "VAULT_CONFIG_ERROR",
            AppError::Vault(VaultError::Encryption) => "ENCRYPTION_FAILED",
            AppError::Vault(VaultError::Decryption) => "CREDENTIAL_UNAVAILABLE",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            AppError::AccountExists(_) => "ACCOUNT_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Forbidden => "FORBIDDEN",
            AppError::SecretMissing(_) => "SECRET_MISSING",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Mail(_) => "MAIL_ERROR",
            AppError::Ai(_) => "AI_ERROR",
        };

        let details = match &error {
            AppError::Vault(VaultError::Decryption) => {
                Some("Re-enter the credential to store it again.".to_string())
            }
            AppError::SecretMissing(kind) => Some(format!("Set it with `set-secret --kind {}`.", kind)),
            _ => None,
        };

        CommandError {
            code: code.to_string(),
            message: error.to_string(),
            details,
        }
    }
}

/// 명령 결과 타입
pub type CommandResult<T> = Result<T, CommandError>;
