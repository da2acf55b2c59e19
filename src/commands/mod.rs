//! Commands Module
//!
//! CLI에서 호출하는 명령어 정의. 각 명령은 `AppContext`를 받아
//! 직렬화 가능한 결과 또는 `CommandError`를 반환합니다.

pub mod account;
pub mod assist;
pub mod mail;
pub mod secrets;

use std::fmt;

use serde::Deserialize;

use crate::accounts;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::AppError;
use crate::models::UserAccount;
use crate::secrets::{CredentialManager, LazyVault};

/// 로그인 정보 (호출자 식별)
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginArgs")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 명령 실행 컨텍스트
///
/// Vault는 필요한 명령에서 처음 접근할 때 로드됩니다.
pub struct AppContext {
    pub config: AppConfig,
    pub db: Database,
    pub vault: LazyVault,
}

impl AppContext {
    /// 설정된 경로의 DB를 열고 스키마 초기화
    pub fn open(config: AppConfig) -> Result<Self, AppError> {
        let db = Database::new(&config.database_path)?;
        Self::with_database(config, db)
    }

    pub fn with_database(config: AppConfig, db: Database) -> Result<Self, AppError> {
        db.initialize()?;
        let vault = LazyVault::new(config.vault_key_env.clone());
        Ok(Self { config, db, vault })
    }

    /// Vault 로드 후 Credential Manager 생성
    pub fn credentials(&self) -> Result<CredentialManager<'_>, AppError> {
        Ok(CredentialManager::new(&self.db, self.vault.get()?))
    }

    /// 호출자 인증
    pub fn login(&self, login: &LoginArgs) -> Result<UserAccount, AppError> {
        accounts::authenticate(&self.db, &login.email, &login.password)
    }
}
