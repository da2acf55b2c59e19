//! Mailwise - 이메일 작성 도우미 라이브러리
//!
//! 계정별 자격 증명(OpenAI API 키, SMTP 비밀번호)을 Secret Vault로 암호화해 SQLite에 보관하고,
//! 이를 이용해 메일 발송과 AI 작성 보조를 수행합니다.

pub mod accounts;
pub mod ai;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod secrets;

use std::process::ExitCode;

use clap::Parser;

/// 로그 초기화 (`RUST_LOG` 미설정 시 info, stdout은 JSON 결과 전용이므로 stderr로 출력)
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI 실행
pub async fn run() -> ExitCode {
    init_tracing();
    // `--email`/`--password`의 env 기본값이 .env 파일 값도 보도록 파싱 전에 로드
    config::load_env_files();
    let cli = cli::Cli::parse();

    match cli::execute(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            match serde_json::to_string_pretty(&err) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}: {}", err.code, err.message),
            }
            ExitCode::FAILURE
        }
    }
}
