use crate::image::data_url;
use crate::prompt::{instruction_for, load_system_prompt, DEFAULT_PROMPT_FILE};
use async_trait::async_trait;
use recall_index::{Describer, Embedder, UpstreamError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DESCRIPTION_MAX_TOKENS: u32 = 500;

const ERROR_BODY_LIMIT: usize = 512;

/// Output widths of the embedding models we know about.
const KNOWN_EMBEDDING_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

#[must_use]
pub fn known_embedding_dimension(model: &str) -> Option<usize> {
    KNOWN_EMBEDDING_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dim)| *dim)
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub vision_model: String,
    pub embedding_model: String,
    /// Overrides the known width of `embedding_model`.
    pub embedding_dimension: Option<usize>,
    pub prompt_file: PathBuf,
}

impl OpenAiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: None,
            prompt_file: PathBuf::from(DEFAULT_PROMPT_FILE),
        }
    }

    pub fn from_env() -> Result<Self, UpstreamError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                UpstreamError::Config(
                    "OPENAI_API_KEY is not set (use RECALL_UPSTREAM=stub to run offline)"
                        .to_string(),
                )
            })?;

        let mut config = Self::new(api_key.trim());
        if let Some(url) = non_empty_env("RECALL_OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = non_empty_env("RECALL_VISION_MODEL") {
            config.vision_model = model;
        }
        config.embedding_model = configured_embedding_model();
        if let Some(path) = non_empty_env("RECALL_PROMPT_FILE") {
            config.prompt_file = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn resolve_embedding_dimension(&self) -> Result<usize, UpstreamError> {
        self.embedding_dimension
            .or_else(|| known_embedding_dimension(&self.embedding_model))
            .ok_or_else(|| {
                UpstreamError::Config(format!(
                    "Unknown output dimension for embedding model '{}'; pass --embedding-dim",
                    self.embedding_model
                ))
            })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// `RECALL_EMBEDDING_MODEL`, or the default model.
pub(crate) fn configured_embedding_model() -> String {
    non_empty_env("RECALL_EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn build_http_client() -> Result<Client, UpstreamError> {
    Client::builder()
        .build()
        .map_err(|err| UpstreamError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Vision describer over `POST {base_url}/chat/completions`.
pub struct OpenAiDescriber {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl OpenAiDescriber {
    #[must_use]
    pub fn new(client: Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            url: config.endpoint("chat/completions"),
            api_key: config.api_key.clone(),
            model: config.vision_model.clone(),
            system_prompt: load_system_prompt(&config.prompt_file),
        }
    }

    fn request_body(&self, image: &[u8], variation: u8) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": instruction_for(variation) },
                        { "type": "image_url", "image_url": { "url": data_url(image) } }
                    ]
                }
            ],
            "max_tokens": DESCRIPTION_MAX_TOKENS
        })
    }
}

#[async_trait]
impl Describer for OpenAiDescriber {
    async fn describe(&self, image: &[u8], variation: u8) -> Result<String, UpstreamError> {
        let body = self.request_body(image, variation);
        let response: ChatCompletionResponse =
            post_json(&self.client, &self.url, &self.api_key, &body).await?;
        response.into_text()
    }
}

/// Text embedder over `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, config: &OpenAiConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            client,
            url: config.endpoint("embeddings"),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimension: config.resolve_embedding_dimension()?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let body = json!({ "model": self.model, "input": text });
        let response: EmbeddingResponse =
            post_json(&self.client, &self.url, &self.api_key, &body).await?;
        response.into_first()
    }
}

async fn post_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> Result<T, UpstreamError> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| UpstreamError::Http(format!("POST {url}: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        truncate_utf8(&mut body, ERROR_BODY_LIMIT);
        log::debug!("POST {url} returned {status}: {body}");
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|err| UpstreamError::InvalidResponse(format!("POST {url}: {err}")))
}

fn truncate_utf8(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_text(self) -> Result<String, UpstreamError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                UpstreamError::InvalidResponse("chat completion has no text content".to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingResponse {
    fn into_first(self) -> Result<Vec<f32>, UpstreamError> {
        self.data
            .into_iter()
            .min_by_key(|datum| datum.index)
            .map(|datum| datum.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                UpstreamError::InvalidResponse("embedding response has no vectors".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_models_resolve_dimension() {
        let mut config = OpenAiConfig::new("sk-test");
        assert_eq!(config.resolve_embedding_dimension().unwrap(), 1536);

        config.embedding_model = "text-embedding-3-large".to_string();
        assert_eq!(config.resolve_embedding_dimension().unwrap(), 3072);

        config.embedding_model = "local-e5".to_string();
        assert!(matches!(
            config.resolve_embedding_dimension(),
            Err(UpstreamError::Config(_))
        ));

        config.embedding_dimension = Some(768);
        assert_eq!(config.resolve_embedding_dimension().unwrap(), 768);
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let mut config = OpenAiConfig::new("sk-test");
        config.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(
            config.endpoint("embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn describer_request_carries_prompt_and_image() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = OpenAiConfig::new("sk-test");
        config.prompt_file = tmp.path().join("missing.txt");
        let describer = OpenAiDescriber::new(Client::new(), &config);

        let body = describer.request_body(&[0xFF, 0xD8, 0xFF], 2);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(
            body["messages"][0]["content"],
            crate::prompt::DEFAULT_SYSTEM_PROMPT
        );
        assert_eq!(
            body["messages"][1]["content"][0]["text"],
            instruction_for(2).as_str()
        );
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,/9j/"
        );
    }

    #[test]
    fn parses_chat_completion_text() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  Ramen with egg. "}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "Ramen with egg.");

        let empty: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(
            empty.into_text(),
            Err(UpstreamError::InvalidResponse(_))
        ));
    }

    #[test]
    fn parses_embedding_in_index_order() {
        let raw = r#"{"object":"list","data":[
            {"object":"embedding","index":1,"embedding":[9.0]},
            {"object":"embedding","index":0,"embedding":[0.5,0.25]}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_first().unwrap(), vec![0.5, 0.25]);

        let none: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(none.into_first().is_err());
    }

    #[test]
    fn truncates_on_char_boundary() {
        let mut text = "héllo".to_string();
        truncate_utf8(&mut text, 2);
        assert_eq!(text, "h");
    }
}
