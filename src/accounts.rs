//! Account Module
//!
//! 사용자 등록 및 비밀번호 검증 (Argon2id PHC 해시)

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::db::Database;
use crate::error::AppError;
use crate::models::UserAccount;

/// 최소한의 이메일 형식 검증 (local@domain.tld)
fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AppError::InvalidInput(format!("Invalid email address: {}", email)));
    }
    Ok(())
}

/// 사용자 등록
pub fn register(db: &Database, email: &str, password: &str) -> Result<UserAccount, AppError> {
    let email = email.trim().to_lowercase();
    validate_email(&email)?;
    if password.is_empty() {
        return Err(AppError::InvalidInput("Password must not be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InvalidInput(format!("Failed to hash password: {}", e)))?
        .to_string();

    let account = db.create_user(&email, &password_hash)?;
    tracing::info!(account_id = %account.id, "Account registered");
    Ok(account)
}

/// 이메일/비밀번호 검증
///
/// 존재하지 않는 계정과 틀린 비밀번호는 같은 에러로 보고합니다.
pub fn authenticate(db: &Database, email: &str, password: &str) -> Result<UserAccount, AppError> {
    let email = email.trim().to_lowercase();
    let Some((account, stored_hash)) = db.find_login(&email)? else {
        return Err(AppError::InvalidCredentials);
    };

    let parsed = PasswordHash::new(&stored_hash).map_err(|_| AppError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::InvalidCredentials)?;

    Ok(account)
}
