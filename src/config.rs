use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::utils::retry::RetryPolicy;
use crate::workflow::{AnalysisOptions, BilingualOptions};

/// 默认标签体系
pub const DEFAULT_LABELS: [&str; 5] = ["Agent", "LLM", "Memory", "RAG", "Spatial Learning"];

/// 程序配置文件
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub classification: ClassificationConfig,
    pub summarization: SummarizationConfig,
    pub bilingual: BilingualConfig,
    pub email: EmailConfig,
}

/// 运行参数
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 查询最近多少天的提交
    pub recency_days: i64,
    /// 最多拉取的论文数量
    pub max_papers: usize,
    /// arXiv 分类
    pub categories: Vec<String>,
    /// PDF 下载目录
    pub output_dir: String,
    pub output_markdown: String,
    pub output_html: String,
    pub output_docx: String,
    /// 进度文件（每个阶段覆盖写入）
    pub progress_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            recency_days: 6,
            max_papers: 600,
            categories: vec!["cs.AI".into(), "cs.LG".into(), "cs.CL".into()],
            output_dir: "papers".to_string(),
            output_markdown: "report.md".to_string(),
            output_html: "report.html".to_string(),
            output_docx: "report.docx".to_string(),
            progress_file: "run_status.json".to_string(),
        }
    }
}

/// LLM 配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// 后端标识：ollama / openai
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    /// 仅 openai 兼容后端需要
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder:14b".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

/// 重试策略（模型调用与下载共用）
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub min_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub multiplier_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_backoff_secs: 2,
            max_backoff_secs: 10,
            multiplier_secs: 1,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts,
            min_backoff: Duration::from_secs(self.min_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            multiplier: Duration::from_secs(self.multiplier_secs),
        }
    }
}

/// 分类配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub labels: Vec<String>,
    pub top_k_per_label: usize,
    /// 分类时是否附带 PDF 正文摘录
    pub use_full_text: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            top_k_per_label: 10,
            use_full_text: false,
        }
    }
}

/// 摘要配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub max_pages: usize,
    pub generate_sota: bool,
    pub generate_repro: bool,
    /// 逐页摘要的并发宽度，1 表示严格顺序执行
    pub page_concurrency: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            max_pages: 12,
            generate_sota: true,
            generate_repro: true,
            page_concurrency: 1,
        }
    }
}

/// 双语输出配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BilingualConfig {
    pub enabled: bool,
    pub primary: String,
    pub secondary: String,
}

impl Default for BilingualConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            primary: "en".to_string(),
            secondary: "zh".to_string(),
        }
    }
}

/// 邮件配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_addr: String,
    pub to_addrs: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: String::new(),
            smtp_port: 465,
            username: String::new(),
            password: String::new(),
            from_addr: String::new(),
            to_addrs: Vec::new(),
        }
    }
}

impl Config {
    /// 从 TOML 文件加载配置，并应用环境变量覆盖
    ///
    /// 文件不存在时使用默认配置。
    pub fn load(path: &Path) -> AppResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| FileError::ReadFailed {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_toml_str(&content, &path.display().to_string())?
        } else {
            warn!("配置文件不存在: {}，使用默认配置", path.display());
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|source| {
            AppError::Config(ConfigError::ParseFailed {
                path: origin.to_string(),
                source,
            })
        })
    }

    /// 环境变量覆盖
    pub fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SMTP_USERNAME") {
            self.email.username = v;
        }
        if let Ok(v) = std::env::var("SMTP_PASSWORD") {
            self.email.password = v;
        }
        if let Ok(v) = std::env::var("TOP_K_PER_LABEL") {
            self.classification.top_k_per_label =
                v.parse().map_err(|_| ConfigError::EnvVarParseFailed {
                    var_name: "TOP_K_PER_LABEL".to_string(),
                    value: v.clone(),
                    expected_type: "usize".to_string(),
                })?;
        }
        Ok(())
    }

    /// 校验配置，任何错误都直接终止运行
    pub fn validate(&self) -> AppResult<()> {
        let labels = &self.classification.labels;
        if labels.is_empty() {
            return Err(AppError::invalid_config("classification.labels", "标签列表不能为空"));
        }
        let mut seen = HashSet::new();
        for label in labels {
            if label.trim().is_empty() {
                return Err(AppError::invalid_config("classification.labels", "标签不能为空字符串"));
            }
            if !seen.insert(label.as_str()) {
                return Err(AppError::invalid_config(
                    "classification.labels",
                    format!("重复的标签: {}", label),
                ));
            }
        }
        if self.classification.top_k_per_label == 0 {
            return Err(AppError::invalid_config("classification.top_k_per_label", "必须大于 0"));
        }
        if self.summarization.max_pages == 0 {
            return Err(AppError::invalid_config("summarization.max_pages", "必须大于 0"));
        }
        if self.summarization.page_concurrency == 0 {
            return Err(AppError::invalid_config("summarization.page_concurrency", "必须大于 0"));
        }
        if self.retry.attempts == 0 {
            return Err(AppError::invalid_config("retry.attempts", "必须大于 0"));
        }
        if self.run.categories.is_empty() {
            return Err(AppError::invalid_config("run.categories", "分类列表不能为空"));
        }
        self.llm.provider.parse::<crate::clients::Provider>()?;

        if self.email.enabled {
            if self.email.smtp_server.is_empty() {
                return Err(AppError::invalid_config("email.smtp_server", "启用邮件时必须设置"));
            }
            if self.email.from_addr.is_empty() {
                return Err(AppError::invalid_config("email.from_addr", "启用邮件时必须设置"));
            }
            if self.email.to_addrs.is_empty() {
                return Err(AppError::invalid_config("email.to_addrs", "启用邮件时至少需要一个收件人"));
            }
        }
        Ok(())
    }

    /// 单篇论文分析选项，只在编排层构建一次
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            generate_sota: self.summarization.generate_sota,
            generate_repro: self.summarization.generate_repro,
            bilingual: BilingualOptions {
                enabled: self.bilingual.enabled,
                primary_language: self.bilingual.primary.clone(),
                secondary_language: self.bilingual.secondary.clone(),
            },
        }
    }
}
