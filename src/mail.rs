//! Mail Module
//!
//! SMTP 발송. 계정의 메일 비밀번호는 발송 직전에만 복호화하고,
//! 인증된 transport를 만든 뒤 바로 버립니다.

use std::time::Duration;

use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::Deserialize;

use crate::config::SmtpSettings;
use crate::error::AppError;
use crate::models::{SecretKind, UserAccount};
use crate::secrets::CredentialManager;

/// 암묵적 TLS 포트 (그 외 포트는 STARTTLS)
const IMPLICIT_TLS_PORT: u16 = 465;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// 발송할 메일
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl OutgoingEmail {
    /// 발신자 주소로 메시지 생성 (수신자 누락/형식 오류 검증)
    pub fn to_message(&self, sender: &str) -> Result<Message, AppError> {
        let to = self.to.trim();
        if to.is_empty() {
            return Err(AppError::InvalidInput("Missing recipient".to_string()));
        }

        let from: Mailbox = sender
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))
    }
}

/// SMTP 발송기
pub struct MailSender {
    settings: SmtpSettings,
}

impl MailSender {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// 인증 정보가 포함된 transport 생성 (연결은 발송 시점에 수행)
    fn transport(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, AppError> {
        let builder = if self.settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
        }
        .map_err(|e| AppError::Mail(format!("Invalid SMTP relay {}: {}", self.settings.host, e)))?;

        Ok(builder
            .port(self.settings.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }

    /// 계정 이메일을 발신자로, 저장된 메일 비밀번호로 인증하여 발송
    pub async fn send_as(
        &self,
        creds: &CredentialManager<'_>,
        account: &UserAccount,
        caller_id: &str,
        email: &OutgoingEmail,
    ) -> Result<(), AppError> {
        let message = email.to_message(&account.email)?;

        let transport = {
            let password = creds.secret_for(&account.id, caller_id, SecretKind::EmailPassword)?;
            self.transport(&account.email, &password)?
        };

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("SMTP send failed: {}", e)))?;

        tracing::info!(
            account_id = %account.id,
            host = %self.settings.host,
            "Email sent to {}",
            email.to.trim()
        );
        Ok(())
    }
}
