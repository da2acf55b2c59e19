//! Secret Manager 모듈
//!
//! 사용자 시크릿을 프로세스 전역 대칭키(Vault Key)로 암호화하여 관리합니다.
//!
//! - Vault Key는 환경 변수(`MAILWISE_VAULT_KEY`)에서 1회 로드, 없으면 즉시 실패
//! - 암호화된 blob은 호출자(사용자 레코드)가 소유하고, vault는 스키마를 모름
//! - 복호화는 소유자 확인(`secret_for(account, caller)`)을 거친 뒤에만 수행

pub mod manager;
pub mod vault;

pub use manager::{rotate_vault_key, CredentialManager, RotationResult, SecretState, SecretStatus};
pub use vault::{EncryptedSecret, LazyVault, SecretVault, VaultError, VaultKey, VAULT_KEY_ENV};
