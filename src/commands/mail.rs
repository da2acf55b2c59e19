//! Mail Commands
//!
//! 로그인한 계정의 주소와 저장된 메일 비밀번호로 메일을 발송합니다.

use serde::Serialize;

use crate::commands::{AppContext, LoginArgs};
use crate::error::CommandResult;
use crate::mail::{MailSender, OutgoingEmail};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub sent: bool,
    pub from: String,
    pub to: String,
}

/// 메일 발송
pub async fn send_email(
    ctx: &AppContext,
    login: &LoginArgs,
    email: &OutgoingEmail,
) -> CommandResult<SendResult> {
    let caller = ctx.login(login)?;
    let creds = ctx.credentials()?;

    MailSender::new(ctx.config.smtp.clone())
        .send_as(&creds, &caller, &caller.id, email)
        .await?;

    Ok(SendResult {
        sent: true,
        from: caller.email,
        to: email.to.trim().to_string(),
    })
}
