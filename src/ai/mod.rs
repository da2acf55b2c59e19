//! AI Assist Module
//!
//! 메일 작성 보조(자동 완성, 자동 답장, 문체 변경, 문법 교정)를 위한 provider 클라이언트.
//! API 키는 클라이언트 생성 시 민감 헤더로만 들어가고 평문은 즉시 버립니다.

pub mod gemini;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::AiSettings;
use crate::error::AppError;
use crate::models::SecretKind;
use crate::secrets::CredentialManager;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// AI provider 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAi,
    Gemini,
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAi),
            "gemini" | "google" => Ok(AiProvider::Gemini),
            other => Err(format!("unknown AI provider: {}", other)),
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProvider::OpenAi => f.write_str("openai"),
            AiProvider::Gemini => f.write_str("gemini"),
        }
    }
}

/// 작성 보조 작업
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistTask {
    Autocomplete,
    Autoreply,
    Rewrite { style: String },
    FixGrammar,
}

impl AssistTask {
    pub fn system_prompt(&self) -> String {
        match self {
            AssistTask::Autocomplete => "You complete emails professionally.".to_string(),
            AssistTask::Autoreply => "You write helpful email replies.".to_string(),
            AssistTask::Rewrite { style } => format!("Rewrite text in a {} tone.", style),
            AssistTask::FixGrammar => "Fix grammar but keep meaning the same.".to_string(),
        }
    }

    pub fn user_prompt(&self, text: &str) -> String {
        match self {
            AssistTask::Autoreply => format!("Reply to this message:\n{}", text),
            _ => text.to_string(),
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            AssistTask::Autocomplete => 120,
            _ => 150,
        }
    }
}

/// provider별 클라이언트
pub enum AiClient {
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
}

impl AiClient {
    pub fn provider(&self) -> AiProvider {
        match self {
            AiClient::OpenAi(_) => AiProvider::OpenAi,
            AiClient::Gemini(_) => AiProvider::Gemini,
        }
    }

    /// 작성 보조 실행 (빈 입력은 요청 전에 거부)
    pub async fn assist(&self, task: &AssistTask, text: &str) -> Result<String, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("Empty text".to_string()));
        }

        let system = task.system_prompt();
        let user = task.user_prompt(text);
        match self {
            AiClient::OpenAi(client) => client.complete(&system, &user, task.max_tokens()).await,
            AiClient::Gemini(client) => client.complete(&system, &user, task.max_tokens()).await,
        }
    }
}

/// 계정별 AI 클라이언트 생성
pub struct AiClientFactory<'a> {
    settings: &'a AiSettings,
}

impl<'a> AiClientFactory<'a> {
    pub fn new(settings: &'a AiSettings) -> Self {
        Self { settings }
    }

    /// 소유자 확인 후 클라이언트 생성
    ///
    /// OpenAI: 계정에 저장된 키 → 운영자 `OPENAI_API_KEY` 순서로 사용.
    /// Gemini: 운영자 `GOOGLE_API_KEY`만 사용.
    pub fn client_for(
        &self,
        creds: &CredentialManager<'_>,
        account_id: &str,
        caller_id: &str,
        provider: AiProvider,
    ) -> Result<AiClient, AppError> {
        let has_own_key = creds.has_secret(account_id, caller_id, SecretKind::AiProviderKey)?;

        if provider == AiProvider::OpenAi && has_own_key {
            let api_key = creds.secret_for(account_id, caller_id, SecretKind::AiProviderKey)?;
            let client = OpenAiClient::new(
                &api_key,
                &self.settings.openai_base_url,
                &self.settings.openai_model,
            )?;
            return Ok(AiClient::OpenAi(client));
        }

        tracing::debug!(account_id, %provider, "No stored AI key in use, using operator key");
        self.operator_client(provider)
    }

    /// 운영자 키만으로 클라이언트 생성 (Vault 불필요)
    pub fn operator_client(&self, provider: AiProvider) -> Result<AiClient, AppError> {
        match provider {
            AiProvider::OpenAi => {
                let api_key = self
                    .settings
                    .openai_api_key
                    .clone()
                    .map(Zeroizing::new)
                    .ok_or(AppError::SecretMissing(SecretKind::AiProviderKey))?;
                let client = OpenAiClient::new(
                    &api_key,
                    &self.settings.openai_base_url,
                    &self.settings.openai_model,
                )?;
                Ok(AiClient::OpenAi(client))
            }
            AiProvider::Gemini => {
                let api_key = self
                    .settings
                    .google_api_key
                    .clone()
                    .map(Zeroizing::new)
                    .ok_or_else(|| AppError::Config("GOOGLE_API_KEY is not set".to_string()))?;
                let client = GeminiClient::new(
                    &api_key,
                    &self.settings.gemini_base_url,
                    &self.settings.gemini_model,
                )?;
                Ok(AiClient::Gemini(client))
            }
        }
    }
}

/// 인증 헤더를 민감 값으로 등록한 HTTP 클라이언트
pub(crate) fn authorized_http_client(
    header: HeaderName,
    value: &str,
) -> Result<reqwest::Client, AppError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| AppError::InvalidInput("API key contains invalid characters".to_string()))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header, value);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Ai(format!("Failed to create client: {}", e)))
}

/// 비정상 응답을 에러로 변환
pub(crate) async fn error_for_status(
    provider: AiProvider,
    resp: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(%provider, status = status.as_u16(), "AI provider returned an error");
    Err(AppError::Ai(format!(
        "{} API error: {} {}",
        provider,
        status.as_u16(),
        body.chars().take(300).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::secrets::{SecretVault, VaultKey};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    fn settings(base_url: &str, operator_key: Option<&str>) -> AiSettings {
        AiSettings {
            openai_base_url: base_url.to_string(),
            openai_api_key: operator_key.map(str::to_string),
            gemini_base_url: base_url.to_string(),
            ..AiSettings::default()
        }
    }

    #[test]
    fn test_task_prompts() {
        let rewrite = AssistTask::Rewrite {
            style: "friendly".to_string(),
        };
        assert_eq!(rewrite.system_prompt(), "Rewrite text in a friendly tone.");
        assert_eq!(
            AssistTask::Autoreply.user_prompt("Can we meet?"),
            "Reply to this message:\nCan we meet?"
        );
        assert_eq!(AssistTask::Autocomplete.max_tokens(), 120);
        assert_eq!(AssistTask::FixGrammar.max_tokens(), 150);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<AiProvider>(), Ok(AiProvider::OpenAi));
        assert_eq!("gemini".parse::<AiProvider>(), Ok(AiProvider::Gemini));
        assert!("claude-ish".parse::<AiProvider>().is_err());
    }

    #[tokio::test]
    async fn test_factory_uses_stored_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Best regards")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let ana = db.create_user("ana@example.com", "hash").unwrap();
        let vault = SecretVault::new(VaultKey::generate());
        let creds = CredentialManager::new(&db, &vault);
        creds
            .store_secret(&ana.id, &ana.id, SecretKind::AiProviderKey, "sk-test-123")
            .unwrap();

        let settings = settings(&mock_server.uri(), Some("sk-operator"));
        let client = AiClientFactory::new(&settings)
            .client_for(&creds, &ana.id, &ana.id, AiProvider::OpenAi)
            .unwrap();
        assert_eq!(client.provider(), AiProvider::OpenAi);

        let text = client
            .assist(&AssistTask::Autocomplete, "Thanks for the update,")
            .await
            .unwrap();
        assert_eq!(text, "Best regards");
    }

    #[tokio::test]
    async fn test_factory_falls_back_to_operator_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-operator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Fixed.")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let ana = db.create_user("ana@example.com", "hash").unwrap();
        let vault = SecretVault::new(VaultKey::generate());
        let creds = CredentialManager::new(&db, &vault);

        let settings = settings(&mock_server.uri(), Some("sk-operator"));
        let client = AiClientFactory::new(&settings)
            .client_for(&creds, &ana.id, &ana.id, AiProvider::OpenAi)
            .unwrap();
        let text = client.assist(&AssistTask::FixGrammar, "it dont work").await.unwrap();
        assert_eq!(text, "Fixed.");
    }

    #[test]
    fn test_factory_errors() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let ana = db.create_user("ana@example.com", "hash").unwrap();
        let bo = db.create_user("bo@example.com", "hash").unwrap();
        let vault = SecretVault::new(VaultKey::generate());
        let creds = CredentialManager::new(&db, &vault);
        let settings = settings("http://127.0.0.1:1", None);
        let factory = AiClientFactory::new(&settings);

        assert!(matches!(
            factory.client_for(&creds, &ana.id, &ana.id, AiProvider::OpenAi),
            Err(AppError::SecretMissing(SecretKind::AiProviderKey))
        ));
        assert!(matches!(
            factory.client_for(&creds, &ana.id, &bo.id, AiProvider::OpenAi),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            factory.client_for(&creds, &ana.id, &ana.id, AiProvider::Gemini),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_operator_client() {
        let full = AiSettings {
            google_api_key: Some("g-operator".to_string()),
            ..settings("http://127.0.0.1:1", Some("sk-operator"))
        };
        let factory = AiClientFactory::new(&full);
        assert_eq!(
            factory.operator_client(AiProvider::Gemini).unwrap().provider(),
            AiProvider::Gemini
        );
        assert_eq!(
            factory.operator_client(AiProvider::OpenAi).unwrap().provider(),
            AiProvider::OpenAi
        );

        let empty = settings("http://127.0.0.1:1", None);
        assert!(matches!(
            AiClientFactory::new(&empty).operator_client(AiProvider::OpenAi),
            Err(AppError::SecretMissing(SecretKind::AiProviderKey))
        ));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        let client = AiClient::OpenAi(
            OpenAiClient::new("sk-test-123", "http://127.0.0.1:1", "gpt-4o-mini").unwrap(),
        );
        let err = client.assist(&AssistTask::Autoreply, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
