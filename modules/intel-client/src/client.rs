use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::types::*;
use crate::{ClassifyApi, EmbedApi};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const CLASSIFY_PROMPT: &str = "You label news articles. Respond with a JSON object \
{\"category\": one of [domestic, world, business, sports, culture, tech, other], \
\"importance\": a number from 0 to 1}. Answer with JSON only.";

/// OpenAI-compatible API client. Works against any endpoint exposing the
/// `/embeddings` and `/chat/completions` shapes via `with_base_url`.
pub struct IntelClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    embedding_model: String,
    chat_model: String,
}

impl IntelClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_chat_model(mut self, model: &str) -> Self {
        self.chat_model = model.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn embeddings(&self, input: serde_json::Value) -> Result<EmbeddingResponse> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input,
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("embedding API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl EmbedApi for IntelClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.embedding_model, "embedding request");
        let response = self
            .embeddings(serde_json::Value::String(text.to_string()))
            .await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("no embedding in response"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        debug!(model = %self.embedding_model, count = texts.len(), "batch embedding request");
        let input = serde_json::Value::Array(
            texts.into_iter().map(serde_json::Value::String).collect(),
        );
        let response = self.embeddings(input).await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl ClassifyApi for IntelClient {
    async fn classify(&self, title: &str, text: &str) -> Result<Classification> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: CLASSIFY_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("{title}\n\n{text}"),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        debug!(model = %self.chat_model, "classification request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!(
                "classification API error ({}): {}",
                status,
                error_text
            ));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("no classification in response"))?;

        Ok(serde_json::from_str(&content)?)
    }
}
