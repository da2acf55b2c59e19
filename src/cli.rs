//! Command Line Interface
//!
//! 각 서브커맨드는 JSON 결과를 stdout으로 출력합니다.
//! 시크릿/메일 본문/보조 입력 텍스트는 인자가 아닌 stdin으로 받습니다.

use std::io::Read;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::ai::{AiProvider, AssistTask};
use crate::commands::assist::{run_assist, AssistArgs};
use crate::commands::{account, mail, secrets, AppContext, LoginArgs};
use crate::config::AppConfig;
use crate::error::{AppError, CommandError};
use crate::mail::OutgoingEmail;
use crate::models::SecretKind;

#[derive(Parser)]
#[command(name = "mailwise", version, about = "Mail assistant with per-account encrypted credentials")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct LoginOpts {
    #[arg(long, env = "MAILWISE_EMAIL")]
    email: String,
    #[arg(long, env = "MAILWISE_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginOpts {
    fn to_login(&self) -> LoginArgs {
        LoginArgs {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AssistMode {
    Autocomplete,
    Autoreply,
    Rewrite,
    Grammar,
}

#[derive(Subcommand)]
pub enum Command {
    /// 새 Vault 키 생성 (운영자용)
    Keygen,
    #[command(flatten)]
    Store(StoreCommand),
}

/// 사용자 DB가 필요한 명령
#[derive(Subcommand)]
pub enum StoreCommand {
    /// 계정 등록
    Register {
        #[command(flatten)]
        login: LoginOpts,
    },
    /// 계정 및 저장된 시크릿 삭제
    DeleteAccount {
        #[command(flatten)]
        login: LoginOpts,
    },
    /// stdin으로 받은 시크릿을 암호화해서 저장
    SetSecret {
        #[command(flatten)]
        login: LoginOpts,
        #[arg(long)]
        kind: SecretKind,
        #[arg(long)]
        account: Option<String>,
    },
    /// 저장된 시크릿 삭제
    ClearSecret {
        #[command(flatten)]
        login: LoginOpts,
        #[arg(long)]
        kind: SecretKind,
        #[arg(long)]
        account: Option<String>,
    },
    /// 시크릿 상태 확인
    CheckSecrets {
        #[command(flatten)]
        login: LoginOpts,
        #[arg(long)]
        account: Option<String>,
    },
    /// 메일 발송 (본문은 stdin)
    Send {
        #[command(flatten)]
        login: LoginOpts,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "")]
        subject: String,
    },
    /// AI 작성 보조 (입력 텍스트는 stdin)
    Assist {
        #[command(flatten)]
        login: LoginOpts,
        #[arg(long, value_enum, default_value = "autocomplete")]
        mode: AssistMode,
        #[arg(long, default_value = "professional")]
        style: String,
        #[arg(long, default_value = "openai")]
        provider: AiProvider,
    },
    /// 저장된 모든 시크릿을 새 키로 재암호화 (운영자용)
    RotateKey {
        #[arg(long)]
        new_key_env: String,
    },
}

fn read_stdin() -> Result<Zeroizing<String>, AppError> {
    let mut buf = Zeroizing::new(String::new());
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::from(e).into())
}

/// 서브커맨드 실행 후 JSON 문자열 반환
pub async fn execute(cli: Cli) -> Result<String, CommandError> {
    let config = AppConfig::from_env()?;

    match cli.command {
        // 키 생성은 DB 없이 동작
        Command::Keygen => to_json(&secrets::generate_vault_key(&config.vault_key_env)?),
        Command::Store(command) => {
            let ctx = AppContext::open(config)?;
            execute_store(&ctx, command).await
        }
    }
}

async fn execute_store(ctx: &AppContext, command: StoreCommand) -> Result<String, CommandError> {
    match command {
        StoreCommand::Register { login } => to_json(&account::register_account(ctx, &login.to_login())?),
        StoreCommand::DeleteAccount { login } => {
            account::delete_account(ctx, &login.to_login())?;
            to_json(&serde_json::json!({ "deleted": true }))
        }
        StoreCommand::SetSecret { login, kind, account } => {
            let value = read_stdin()?;
            let value = value.trim_end_matches(['\r', '\n']);
            secrets::set_secret(ctx, &login.to_login(), account.as_deref(), kind, value)?;
            to_json(&serde_json::json!({ "stored": kind }))
        }
        StoreCommand::ClearSecret { login, kind, account } => {
            secrets::clear_secret(ctx, &login.to_login(), account.as_deref(), kind)?;
            to_json(&serde_json::json!({ "cleared": kind }))
        }
        StoreCommand::CheckSecrets { login, account } => {
            to_json(&secrets::check_secrets(ctx, &login.to_login(), account.as_deref())?)
        }
        StoreCommand::Send { login, to, subject } => {
            let body = read_stdin()?;
            let email = OutgoingEmail {
                to,
                subject,
                body: body.to_string(),
            };
            to_json(&mail::send_email(ctx, &login.to_login(), &email).await?)
        }
        StoreCommand::Assist {
            login,
            mode,
            style,
            provider,
        } => {
            let task = match mode {
                AssistMode::Autocomplete => AssistTask::Autocomplete,
                AssistMode::Autoreply => AssistTask::Autoreply,
                AssistMode::Rewrite => AssistTask::Rewrite { style },
                AssistMode::Grammar => AssistTask::FixGrammar,
            };
            let args = AssistArgs {
                provider,
                task: Some(task),
                text: read_stdin()?.to_string(),
            };
            to_json(&run_assist(ctx, &login.to_login(), &args).await?)
        }
        StoreCommand::RotateKey { new_key_env } => to_json(&secrets::rotate_key(ctx, &new_key_env)?),
    }
}
