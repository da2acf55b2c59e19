//! Credential Manager - 소유자 확인 후 시크릿 저장/조회
//!
//! - 모든 조회는 `account_id == caller_id`를 먼저 확인
//! - 평문은 `Zeroizing<String>`으로만 반환되어 drop 시 지워짐
//! - 키 교체 시 전체 blob을 새 키로 재암호화

use serde::Serialize;
use zeroize::Zeroizing;

use crate::db::Database;
use crate::error::AppError;
use crate::models::SecretKind;
use crate::secrets::vault::{SecretVault, VaultError};

/// 시크릿 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretState {
    /// 저장된 값 없음
    Missing,
    /// 현재 키로 복호화 가능
    Ready,
    /// 복호화 불가 (키 교체/손상) - 사용자가 다시 입력해야 함
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretStatus {
    pub kind: SecretKind,
    pub state: SecretState,
}

/// Credential Manager
///
/// 호출자 소유의 DB와 Vault를 빌려서 동작합니다.
pub struct CredentialManager<'a> {
    db: &'a Database,
    vault: &'a SecretVault,
}

impl<'a> CredentialManager<'a> {
    pub fn new(db: &'a Database, vault: &'a SecretVault) -> Self {
        Self { db, vault }
    }

    /// 시크릿 암호화 후 저장
    pub fn store_secret(
        &self,
        account_id: &str,
        caller_id: &str,
        kind: SecretKind,
        plaintext: &str,
    ) -> Result<(), AppError> {
        ensure_owner(account_id, caller_id)?;
        if plaintext.trim().is_empty() {
            return Err(AppError::InvalidInput(format!("{} must not be empty", kind)));
        }

        let blob = self.vault.encrypt(plaintext)?;
        self.db.set_secret_blob(account_id, kind, Some(&blob))?;

        tracing::info!(account_id, kind = %kind, "Secret stored");
        Ok(())
    }

    /// 소유자 확인 후 시크릿 복호화
    pub fn secret_for(
        &self,
        account_id: &str,
        caller_id: &str,
        kind: SecretKind,
    ) -> Result<Zeroizing<String>, AppError> {
        ensure_owner(account_id, caller_id)?;

        let blob = self
            .db
            .get_secret_blob(account_id, kind)?
            .ok_or(AppError::SecretMissing(kind))?;

        self.vault.decrypt(&blob).map_err(|e| {
            tracing::warn!(account_id, kind = %kind, "Stored secret could not be decrypted");
            AppError::from(e)
        })
    }

    /// 시크릿 존재 여부 (복호화하지 않음)
    pub fn has_secret(
        &self,
        account_id: &str,
        caller_id: &str,
        kind: SecretKind,
    ) -> Result<bool, AppError> {
        ensure_owner(account_id, caller_id)?;
        Ok(self.db.get_secret_blob(account_id, kind)?.is_some())
    }

    /// 시크릿 삭제
    pub fn clear_secret(
        &self,
        account_id: &str,
        caller_id: &str,
        kind: SecretKind,
    ) -> Result<(), AppError> {
        ensure_owner(account_id, caller_id)?;
        self.db.set_secret_blob(account_id, kind, None)?;
        tracing::info!(account_id, kind = %kind, "Secret cleared");
        Ok(())
    }

    /// 종류별 시크릿 상태 (Unavailable = 다시 입력 필요)
    pub fn secret_status(
        &self,
        account_id: &str,
        caller_id: &str,
    ) -> Result<Vec<SecretStatus>, AppError> {
        ensure_owner(account_id, caller_id)?;

        let mut statuses = Vec::with_capacity(SecretKind::ALL.len());
        for kind in SecretKind::ALL {
            let state = match self.db.get_secret_blob(account_id, kind)? {
                None => SecretState::Missing,
                Some(blob) => match self.vault.decrypt(&blob) {
                    Ok(_) => SecretState::Ready,
                    Err(_) => SecretState::Unavailable,
                },
            };
            statuses.push(SecretStatus { kind, state });
        }
        Ok(statuses)
    }
}

/// 다른 계정의 시크릿 접근 차단
fn ensure_owner(account_id: &str, caller_id: &str) -> Result<(), AppError> {
    if account_id != caller_id {
        tracing::warn!(account_id, caller_id, "Rejected cross-account secret access");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// 키 교체 결과
#[derive(Debug, Clone, Serialize)]
pub struct RotationResult {
    pub rotated: usize,
    pub failed: usize,
    pub details: Vec<String>,
}

/// 저장된 모든 blob을 새 키로 재암호화 (운영자 전용)
///
/// 기존 키로 복호화되지 않는 blob은 그대로 두고 실패로 보고합니다.
pub fn rotate_vault_key(
    db: &Database,
    old_vault: &SecretVault,
    new_vault: &SecretVault,
) -> Result<RotationResult, AppError> {
    // 중간에 쓰기가 실패하면 전체 롤백 (모든 blob이 이전 키에 남음)
    let (rotated, failed, details) = db.with_transaction(|db| {
        let mut rotated: usize = 0;
        let mut failed: usize = 0;
        let mut details = Vec::new();

        for account_id in db.list_user_ids()? {
            for kind in SecretKind::ALL {
                let Some(blob) = db.get_secret_blob(&account_id, kind)? else {
                    continue;
                };

                let reencrypted = old_vault
                    .decrypt(&blob)
                    .and_then(|plaintext| new_vault.encrypt(&plaintext));

                match reencrypted {
                    Ok(new_blob) => {
                        db.set_secret_blob(&account_id, kind, Some(&new_blob))?;
                        details.push(format!("✓ {}/{}", account_id, kind));
                        rotated += 1;
                    }
                    Err(VaultError::Decryption) => {
                        details.push(format!(
                            "✗ {}/{}: undecryptable, must be re-entered",
                            account_id, kind
                        ));
                        failed += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok((rotated, failed, details))
    })?;

    tracing::info!(
        rotated,
        failed,
        old_fingerprint = %old_vault.fingerprint(),
        new_fingerprint = %new_vault.fingerprint(),
        "Vault key rotation finished"
    );

    Ok(RotationResult {
        rotated,
        failed,
        details,
    })
}
