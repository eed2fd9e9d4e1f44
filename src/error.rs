use thiserror::Error;

/// 应用程序错误类型
///
/// 只有配置错误和重试耗尽的 I/O 错误会一路传播到 `main`，
/// 单篇论文或可选功能的失败在各自边界内降级处理。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（不可重试）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 模型调用错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 论文源错误（arXiv 查询、PDF 下载与解析）
    #[error("论文源错误: {0}")]
    Source(#[from] SourceError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 邮件投递错误
    #[error("投递错误: {0}")]
    Delivery(#[from] DeliveryError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 不支持的模型后端
    #[error("不支持的 LLM 后端: {provider}")]
    UnsupportedProvider { provider: String },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

/// LLM 调用错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 网络请求失败
    #[error("LLM 请求失败 (模型: {model}): {message}")]
    Transport { model: String, message: String },
    /// 后端返回非成功状态码
    #[error("LLM 返回错误状态 (模型: {model}): HTTP {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },
    /// 响应体无法解码
    #[error("LLM 响应解析失败 (模型: {model}): {message}")]
    Decode { model: String, message: String },
    /// 请求构建失败（参数不合法）
    #[error("LLM 请求构建失败: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// 是否属于可重试的瞬时错误
    ///
    /// 状态码只有 408、429 和 5xx 会重试，其余（如 401、404）多为配置问题。
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport { .. } | LlmError::Decode { .. } => true,
            LlmError::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            LlmError::InvalidRequest(_) => false,
        }
    }
}

/// 论文源错误
#[derive(Debug, Error)]
pub enum SourceError {
    /// 网络请求失败
    #[error("请求失败 ({url}): {message}")]
    Request { url: String, message: String },
    /// Atom 响应解析失败
    #[error("arXiv 响应解析失败: {0}")]
    Feed(String),
    /// 论文没有 PDF 链接
    #[error("论文 {paper_id} 没有 PDF 链接")]
    MissingPdf { paper_id: String },
    /// PDF 文本提取失败
    #[error("PDF 文本提取失败 ({path}): {message}")]
    Extract { path: String, message: String },
    /// 写入下载文件失败
    #[error("保存文件失败 ({path}): {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Request { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 文档导出失败
    #[error("导出文档失败 ({path}): {message}")]
    ExportFailed { path: String, message: String },
}

/// 邮件投递错误
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 地址解析失败
    #[error("邮件地址不合法: {0}")]
    Address(String),
    /// 邮件构建失败
    #[error("邮件构建失败: {0}")]
    Build(String),
    /// SMTP 发送失败
    #[error("SMTP 发送失败: {0}")]
    Smtp(String),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建配置值不合法错误
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
