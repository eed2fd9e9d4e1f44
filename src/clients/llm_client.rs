//! LLM 后端客户端 - 基础设施层
//!
//! 持有 HTTP 客户端，只暴露"发一次聊天请求，拿回文本"的能力。
//! 重试由上层的 `ModelGateway` 负责。
//!
//! ## 支持的后端
//! - `ollama`: 原生 `/api/chat` 接口（`reqwest`）
//! - `openai`: 任意 OpenAI 兼容服务（`async-openai`）

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ConfigError, LlmError};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单轮消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 聊天请求
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// 最后一条用户消息（测试替身按内容路由时使用）
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// 模型后端
///
/// 一次调用对应一次网络往返，不做重试。
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 模型名称（用于日志与报告）
    fn model(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// 后端标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            other => Err(ConfigError::UnsupportedProvider {
                provider: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => write!(f, "ollama"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

/// 根据配置构建后端
///
/// 不支持的后端标识直接返回配置错误，不发起任何请求。
pub fn build_backend(config: &LlmConfig) -> Result<Box<dyn ChatBackend>, ConfigError> {
    let provider: Provider = config.provider.parse()?;
    debug!("构建 LLM 后端: {} @ {}", provider, config.endpoint);

    match provider {
        Provider::Ollama => Ok(Box::new(OllamaBackend::new(
            &config.endpoint,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )?)),
        Provider::OpenAi => Ok(Box::new(OpenAiBackend::new(
            &config.endpoint,
            &config.model,
            config.api_key.as_deref().unwrap_or_default(),
        ))),
    }
}

// ========== Ollama ==========

/// Ollama 原生接口
pub struct OllamaBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "llm.endpoint".to_string(),
                reason: format!("无法创建 HTTP 客户端: {}", e),
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn build_payload(&self, request: &ChatRequest) -> JsonValue {
        json!({
            "model": self.model,
            "messages": request.messages,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
            "stream": false,
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);
        debug!("调用 Ollama: {}，模型: {}", url, self.model);

        let response = self
            .http
            .post(&url)
            .json(&self.build_payload(request))
            .send()
            .await
            .map_err(|e| LlmError::Transport {
                model: self.model.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                model: self.model.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: JsonValue = response.json().await.map_err(|e| LlmError::Decode {
            model: self.model.clone(),
            message: e.to_string(),
        })?;

        Ok(normalize_envelope(&envelope))
    }
}

/// 从响应信封中提取助手消息
///
/// 依次尝试 Ollama 的 `message.content` 与 OpenAI 风格的
/// `choices[0].message.content`；都不匹配时返回整个信封的 JSON 文本。
pub fn normalize_envelope(envelope: &JsonValue) -> String {
    if let Some(content) = envelope
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        return content.to_string();
    }

    if let Some(content) = envelope
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        return content.to_string();
    }

    envelope.to_string()
}

// ========== OpenAI 兼容 ==========

/// OpenAI 兼容服务（如 Azure, vLLM, DeepSeek 等）
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_base: &str, model: &str, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(openai_config),
            model: model.to_string(),
        }
    }

    fn build_messages(
        &self,
        request: &ChatRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let invalid = |e: async_openai::error::OpenAIError| LlmError::InvalidRequest(e.to_string());

        request
            .messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::System)
                    .map_err(invalid),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::User)
                    .map_err(invalid),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::Assistant)
                    .map_err(invalid),
            })
            .collect()
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        debug!("调用 OpenAI 兼容接口，模型: {}", self.model);

        let messages = self.build_messages(request)?;
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| LlmError::Transport {
                model: self.model.clone(),
                message: e.to_string(),
            })?;

        match response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
        {
            Some(content) => Ok(content),
            None => serde_json::to_string(&response).map_err(|e| LlmError::Decode {
                model: self.model.clone(),
                message: e.to_string(),
            }),
        }
    }
}
