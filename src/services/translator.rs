//! 双语翻译
//!
//! 对已组装好的英文片段做整体翻译，代码、链接与 `[p.X]` 引用保持不变。

use crate::error::LlmError;
use crate::services::llm_service::ModelGateway;
use crate::services::prompts::TranslatePrompt;

/// 语言代码对应的提示词用名称，未知代码原样使用
pub fn language_name(code: &str) -> &str {
    match code.trim().to_lowercase().as_str() {
        "en" => "English",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        _ => code.trim(),
    }
}

/// 报告中译文小节使用的语言标注
pub fn language_label(code: &str) -> &str {
    match code.trim().to_lowercase().as_str() {
        "zh" => "中文",
        "en" => "English",
        "ja" => "日本語",
        "ko" => "한국어",
        "de" => "Deutsch",
        "fr" => "Français",
        "es" => "Español",
        _ => code.trim(),
    }
}

/// 翻译服务
pub struct Translator {
    gateway: ModelGateway,
}

impl Translator {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    /// 翻译 Markdown
    ///
    /// `source_language` / `target_language` 为语言代码（如 `en`、`zh`）。
    pub async fn translate(
        &self,
        markdown: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, LlmError> {
        let response = self
            .gateway
            .ask(&TranslatePrompt {
                markdown,
                source_language: language_name(source_language),
                target_language: language_name(target_language),
            })
            .await?;
        Ok(response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::llm_service::testing::{gateway, ScriptedBackend};

    #[test]
    fn test_language_names() {
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("ZH"), "Chinese");
        assert_eq!(language_name("pt"), "pt");
        assert_eq!(language_label("zh"), "中文");
        assert_eq!(language_label("pt"), "pt");
    }

    #[tokio::test]
    async fn test_translate_prompt_and_sampling() {
        let backend = Arc::new(ScriptedBackend::new("**TL;DR:** 规划网络 [p.1]\n"));
        let translator = Translator::new(gateway(backend.clone()));

        let translated = translator
            .translate("**TL;DR:** PlanNet [p.1]", "en", "zh")
            .await
            .unwrap();

        assert_eq!(translated, "**TL;DR:** 规划网络 [p.1]");
        let calls = backend.calls();
        assert!(calls[0]
            .last_user_content()
            .starts_with("Translate the following Markdown from English to Chinese."));
        assert!(calls[0].last_user_content().ends_with("**TL;DR:** PlanNet [p.1]"));
        assert_eq!(calls[0].temperature, 0.0);
        assert_eq!(calls[0].max_tokens, 1400);
    }
}
