//! 模型网关 - 业务能力层
//!
//! 只负责"把一组消息发给模型并拿回文本"，不关心流程。
//!
//! ## 职责
//! - 持有后端（`ChatBackend`）与重试策略
//! - 瞬时错误按指数退避重试，配置错误立即返回
//! - 各阶段通过 `ask` 以固定采样参数发送单轮用户消息

use std::sync::Arc;

use tracing::debug;

use crate::clients::llm_client::{build_backend, ChatBackend, ChatMessage, ChatRequest};
use crate::config::Config;
use crate::error::{ConfigError, LlmError};
use crate::services::prompts::StagePrompt;
use crate::utils::retry::RetryPolicy;

/// 模型网关
///
/// 克隆代价很低（内部为 `Arc`），各服务各自持有一份。
#[derive(Clone)]
pub struct ModelGateway {
    backend: Arc<dyn ChatBackend>,
    retry: RetryPolicy,
}

impl ModelGateway {
    /// 根据配置创建网关
    ///
    /// 不支持的后端标识在这里直接失败，不会进入重试。
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let backend = build_backend(&config.llm)?;
        Ok(Self {
            backend: Arc::from(backend),
            retry: config.retry.policy(),
        })
    }

    /// 使用指定后端创建网关
    pub fn with_backend(backend: Arc<dyn ChatBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// 通用的聊天调用
    ///
    /// # 参数
    /// - `messages`: 有序消息列表
    /// - `temperature`: 采样温度
    /// - `max_tokens`: 最大输出 token 数
    ///
    /// # 返回
    /// 模型原始文本。重试耗尽后返回最后一次的错误。
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages,
            temperature,
            max_tokens,
        };
        debug!(
            "调用 LLM，模型: {}，消息长度: {} 字符，temperature: {}",
            self.backend.model(),
            request.last_user_content().chars().count(),
            temperature
        );

        let response = self
            .retry
            .run(
                "LLM 调用",
                || self.backend.complete(&request),
                LlmError::is_retryable,
            )
            .await?;

        debug!("LLM 返回 {} 字符", response.chars().count());
        Ok(response)
    }

    /// 以阶段固定的采样参数发送单轮用户消息
    pub async fn ask<P: StagePrompt>(&self, prompt: &P) -> Result<String, LlmError> {
        self.chat(
            vec![ChatMessage::user(prompt.render())],
            P::TEMPERATURE,
            P::MAX_TOKENS,
        )
        .await
    }
}

/// 测试用的脚本化后端
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// 按用户消息内容匹配返回预设文本，并记录每次请求
    pub struct ScriptedBackend {
        rules: Vec<(String, String)>,
        fallback: String,
        failures_left: AtomicU32,
        failure_status: Option<u16>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(fallback: impl Into<String>) -> Self {
            Self {
                rules: Vec::new(),
                fallback: fallback.into(),
                failures_left: AtomicU32::new(0),
                failure_status: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// 用户消息包含 `needle` 时返回 `response`（按添加顺序匹配）
        pub fn on(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
            self.rules.push((needle.into(), response.into()));
            self
        }

        /// 前 `n` 次调用返回瞬时错误
        pub fn failing_first(self, n: u32) -> Self {
            self.failures_left.store(n, Ordering::SeqCst);
            self
        }

        /// 失败时返回 HTTP 状态错误而不是网络错误
        pub fn with_status(mut self, status: u16) -> Self {
            self.failure_status = Some(status);
            self
        }

        pub fn calls(&self) -> Vec<ChatRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(request.clone());

            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(match self.failure_status {
                    Some(status) => LlmError::Status {
                        model: "scripted".into(),
                        status,
                        body: String::new(),
                    },
                    None => LlmError::Transport {
                        model: "scripted".into(),
                        message: "connection reset".into(),
                    },
                });
            }

            let content = request.last_user_content();
            let response = self
                .rules
                .iter()
                .find(|(needle, _)| content.contains(needle.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| self.fallback.clone());
            Ok(response)
        }
    }

    /// 创建不等待重试的网关
    pub fn gateway(backend: Arc<ScriptedBackend>) -> ModelGateway {
        ModelGateway::with_backend(backend, RetryPolicy::immediate(3))
    }
}
