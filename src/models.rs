//! Mailwise Data Models
//!
//! 사용자 계정과 시크릿 종류 정의

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 사용자 계정 (비밀번호 해시와 암호화된 시크릿은 포함하지 않음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub created_at: i64,
}

/// 사용자 레코드에 저장되는 시크릿 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    /// AI provider API 키
    #[serde(rename = "openai_key")]
    AiProviderKey,
    /// SMTP 로그인 비밀번호
    EmailPassword,
}

impl SecretKind {
    pub const ALL: [SecretKind; 2] = [SecretKind::AiProviderKey, SecretKind::EmailPassword];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKind::AiProviderKey => "openai_key",
            SecretKind::EmailPassword => "email_password",
        }
    }

    /// users 테이블 컬럼명
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SecretKind::AiProviderKey => "openai_enc_key",
            SecretKind::EmailPassword => "email_enc_password",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openai_key" | "openai" | "ai_key" => Ok(SecretKind::AiProviderKey),
            "email_password" | "smtp_password" => Ok(SecretKind::EmailPassword),
            other => Err(format!("unknown secret kind: {}", other)),
        }
    }
}
