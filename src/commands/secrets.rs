//! Secret Commands
//!
//! 사용자 시크릿 저장/삭제/상태 확인 및 Vault 키 관리.
//! - 평문 시크릿은 결과에 포함하지 않음
//! - 다른 계정 대상 요청은 `FORBIDDEN`

use serde::Serialize;

use crate::commands::{AppContext, LoginArgs};
use crate::error::{AppError, CommandResult};
use crate::models::SecretKind;
use crate::secrets::{rotate_vault_key, RotationResult, SecretStatus, SecretVault, VaultKey};

/// 새 Vault 키 생성 결과
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyGenResult {
    pub env_var: String,
    pub key: String,
    pub fingerprint: String,
}

/// 운영자용 새 키 생성
pub fn generate_vault_key(env_var: &str) -> CommandResult<KeyGenResult> {
    let key = VaultKey::generate();
    Ok(KeyGenResult {
        env_var: env_var.to_string(),
        key: key.to_base64().to_string(),
        fingerprint: key.fingerprint(),
    })
}

/// 시크릿 저장 (`account_id` 미지정 시 호출자 본인)
pub fn set_secret(
    ctx: &AppContext,
    login: &LoginArgs,
    account_id: Option<&str>,
    kind: SecretKind,
    value: &str,
) -> CommandResult<()> {
    let caller = ctx.login(login)?;
    let account_id = account_id.unwrap_or(&caller.id);
    ctx.credentials()?
        .store_secret(account_id, &caller.id, kind, value)?;
    Ok(())
}

/// 시크릿 삭제
pub fn clear_secret(
    ctx: &AppContext,
    login: &LoginArgs,
    account_id: Option<&str>,
    kind: SecretKind,
) -> CommandResult<()> {
    let caller = ctx.login(login)?;
    let account_id = account_id.unwrap_or(&caller.id);
    ctx.credentials()?.clear_secret(account_id, &caller.id, kind)?;
    Ok(())
}

/// 종류별 시크릿 상태
pub fn check_secrets(
    ctx: &AppContext,
    login: &LoginArgs,
    account_id: Option<&str>,
) -> CommandResult<Vec<SecretStatus>> {
    let caller = ctx.login(login)?;
    let account_id = account_id.unwrap_or(&caller.id);
    Ok(ctx.credentials()?.secret_status(account_id, &caller.id)?)
}

/// 현재 키에서 `new_key_env`의 키로 전체 blob 재암호화
pub fn rotate_key(ctx: &AppContext, new_key_env: &str) -> CommandResult<RotationResult> {
    let old_vault = ctx.vault.get().map_err(AppError::from)?;
    let new_vault = SecretVault::from_env_var(new_key_env).map_err(AppError::from)?;

    if old_vault.fingerprint() == new_vault.fingerprint() {
        return Err(AppError::InvalidInput(
            "New vault key is identical to the current key".to_string(),
        )
        .into());
    }

    Ok(rotate_vault_key(&ctx.db, old_vault, &new_vault)?)
}
