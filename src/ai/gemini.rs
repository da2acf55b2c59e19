//! Google Gemini generateContent 클라이언트

use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};

use super::{authorized_http_client, error_for_status, AiProvider};
use crate::error::AppError;

const API_KEY_HEADER: &str = "x-goog-api-key";
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, AppError> {
        Ok(Self {
            http: authorized_http_client(HeaderName::from_static(API_KEY_HEADER), api_key.trim())?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, AppError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: [Part { text: system }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: user }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
                temperature: TEMPERATURE,
            },
        };

        let resp = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Ai(format!("Gemini request failed: {}", e)))?;

        let resp = error_for_status(AiProvider::Gemini, resp).await?;

        let data: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Ai(format!("Failed to parse Gemini response: {}", e)))?;

        // 첫 후보의 텍스트 part를 이어 붙임
        let text: String = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Ai("Gemini response contained no text".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_joins_parts() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "You write helpful email replies." }] },
                "contents": [{ "role": "user", "parts": [{ "text": "Reply to this message:\nLunch?" }] }],
                "generationConfig": { "maxOutputTokens": 150 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Sure, " }, { "text": "noon works." }] }
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client =
            GeminiClient::new("g-test-key", &mock_server.uri(), "models/gemini-1.5-flash").unwrap();
        let text = client
            .complete("You write helpful email replies.", "Reply to this message:\nLunch?", 150)
            .await
            .unwrap();
        assert_eq!(text, "Sure, noon works.");
    }

    #[tokio::test]
    async fn test_no_candidates_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new("g-test-key", &mock_server.uri(), "gemini-1.5-flash").unwrap();
        assert!(matches!(client.complete("s", "u", 10).await, Err(AppError::Ai(_))));
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new("g-test-key", &mock_server.uri(), "gemini-1.5-flash").unwrap();
        let err = client.complete("s", "u", 10).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
