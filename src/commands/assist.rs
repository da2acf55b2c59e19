//! AI Assist Commands
//!
//! 자동 완성 / 자동 답장 / 문체 변경 / 문법 교정

use serde::{Deserialize, Serialize};

use crate::ai::{AiClientFactory, AiProvider, AssistTask};
use crate::commands::{AppContext, LoginArgs};
use crate::error::CommandResult;
use crate::models::SecretKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistArgs {
    #[serde(default)]
    pub provider: AiProvider,
    #[serde(skip)]
    pub task: Option<AssistTask>,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistResult {
    pub provider: AiProvider,
    pub text: String,
}

/// 작성 보조 실행
pub async fn run_assist(
    ctx: &AppContext,
    login: &LoginArgs,
    args: &AssistArgs,
) -> CommandResult<AssistResult> {
    let caller = ctx.login(login)?;
    let factory = AiClientFactory::new(&ctx.config.ai);

    // 저장된 OpenAI 키가 있을 때만 Vault 로드
    let uses_stored_key = args.provider == AiProvider::OpenAi
        && ctx
            .db
            .get_secret_blob(&caller.id, SecretKind::AiProviderKey)?
            .is_some();
    let client = if uses_stored_key {
        factory.client_for(&ctx.credentials()?, &caller.id, &caller.id, args.provider)?
    } else {
        factory.operator_client(args.provider)?
    };

    let task = args.task.clone().unwrap_or(AssistTask::Autocomplete);
    let text = client.assist(&task, &args.text).await?;

    Ok(AssistResult {
        provider: client.provider(),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::account::register_account;
    use crate::commands::secrets::set_secret;
    use crate::commands::test_support::{context, login};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_rewrite_with_stored_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Could we reschedule?" } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut ctx = context("MAILWISE_TEST_KEY_ASSIST_CMD");
        ctx.config.ai.openai_base_url = mock_server.uri();
        let ana = login("ana@example.com");
        register_account(&ctx, &ana).unwrap();
        set_secret(&ctx, &ana, None, SecretKind::AiProviderKey, "sk-test-123").unwrap();

        let args = AssistArgs {
            provider: AiProvider::OpenAi,
            task: Some(AssistTask::Rewrite {
                style: "polite".to_string(),
            }),
            text: "move the meeting".to_string(),
        };
        let result = run_assist(&ctx, &ana, &args).await.unwrap();
        assert_eq!(result.provider, AiProvider::OpenAi);
        assert_eq!(result.text, "Could we reschedule?");
    }

    #[tokio::test]
    async fn test_operator_keys_work_without_vault_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-operator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "Sounds good." }] } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-operator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Kind regards" } }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut ctx = context("MAILWISE_TEST_KEY_ASSIST_CMD_OPERATOR");
        ctx.config.ai.gemini_base_url = mock_server.uri();
        ctx.config.ai.google_api_key = Some("g-operator".to_string());
        ctx.config.ai.openai_base_url = mock_server.uri();
        ctx.config.ai.openai_api_key = Some("sk-operator".to_string());
        let ana = login("ana@example.com");
        register_account(&ctx, &ana).unwrap();
        std::env::remove_var("MAILWISE_TEST_KEY_ASSIST_CMD_OPERATOR");

        let gemini = AssistArgs {
            provider: AiProvider::Gemini,
            task: Some(AssistTask::Autoreply),
            text: "Lunch on Friday?".to_string(),
        };
        let result = run_assist(&ctx, &ana, &gemini).await.unwrap();
        assert_eq!(result.provider, AiProvider::Gemini);
        assert_eq!(result.text, "Sounds good.");

        let openai = AssistArgs {
            provider: AiProvider::OpenAi,
            task: None,
            text: "Thanks for your help,".to_string(),
        };
        let result = run_assist(&ctx, &ana, &openai).await.unwrap();
        assert_eq!(result.text, "Kind regards");
        assert!(!ctx.vault.is_loaded());
    }

    #[tokio::test]
    async fn test_no_key_anywhere() {
        let ctx = context("MAILWISE_TEST_KEY_ASSIST_CMD_NOKEY");
        let ana = login("ana@example.com");
        register_account(&ctx, &ana).unwrap();

        let args = AssistArgs {
            provider: AiProvider::OpenAi,
            task: None,
            text: "Dear team".to_string(),
        };
        let err = run_assist(&ctx, &ana, &args).await.unwrap_err();
        assert_eq!(err.code, "SECRET_MISSING");
    }
}
