use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 论文元数据
///
/// 拉取后不再修改，由一次运行持有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// 短 ID（如 `2501.01234v1`）
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub published: DateTime<Utc>,
    pub primary_category: String,
    /// 论文主页链接
    pub entry_link: String,
    /// PDF 链接（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_link: Option<String>,
}

impl Paper {
    /// 用于报告表格的日期
    pub fn published_date(&self) -> String {
        self.published.date_naive().to_string()
    }
}

/// 单页提取文本（页码从 1 开始）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// 单页要点（页码, 要点文本），由逐页摘要生成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFact {
    pub page: u32,
    pub bullets: String,
}

impl PageFact {
    /// 该页的引用标记，如 `[p.3]`
    pub fn citation(&self) -> String {
        citation_marker(self.page)
    }
}

/// 引用标记格式
pub fn citation_marker(page: u32) -> String {
    format!("[p.{}]", page)
}
