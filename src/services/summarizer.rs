//! Map-Reduce 摘要
//!
//! - `PageSummarizer`: 逐页提取带页码引用的要点（map）
//! - `DigestReducer`: TL;DR 与基于全部要点的方法卡片（reduce）

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::LlmError;
use crate::models::{citation_marker, PageFact, PageText};
use crate::services::llm_service::ModelGateway;
use crate::services::prompts::{BulletContext, PagePrompt, ReducePrompt, TldrPrompt};

/// 逐页要点提取
///
/// 页与页之间没有信息流动。`concurrency` 为 1 时严格按页顺序调用；
/// 更大时并发调用，但输出顺序始终与输入页序一致。
pub struct PageSummarizer {
    gateway: ModelGateway,
    concurrency: usize,
}

impl PageSummarizer {
    pub fn new(gateway: ModelGateway, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// N 页输入得到 N 个要点块，每块都带有对应页的引用标记
    pub async fn summarize_pages(&self, pages: &[PageText]) -> Result<Vec<PageFact>, LlmError> {
        stream::iter(pages.iter().map(|page| self.summarize_page(page)))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn summarize_page(&self, page: &PageText) -> Result<PageFact, LlmError> {
        let response = self
            .gateway
            .ask(&PagePrompt {
                page: page.page,
                text: &page.text,
            })
            .await?;
        debug!("第 {} 页要点: {} 字符", page.page, response.chars().count());

        Ok(PageFact {
            page: page.page,
            bullets: ensure_citation(response.trim(), page.page),
        })
    }
}

/// 保证要点块含有本页引用标记
///
/// 没有标记的要点行补上标记；模型什么也没返回时写入占位要点。
pub fn ensure_citation(bullets: &str, page: u32) -> String {
    let marker = citation_marker(page);
    if bullets.is_empty() {
        return format!("- (no extractable facts) {}", marker);
    }
    if bullets.contains(&marker) {
        return bullets.to_string();
    }

    let mut tagged: Vec<String> = bullets
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let is_bullet = trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with('•');
            if is_bullet && !line.contains("[p.") {
                format!("{} {}", line.trim_end(), marker)
            } else {
                line.to_string()
            }
        })
        .collect();

    if !tagged.iter().any(|line| line.contains(&marker)) {
        if let Some(last) = tagged.iter_mut().rev().find(|line| !line.trim().is_empty()) {
            last.push(' ');
            last.push_str(&marker);
        }
    }
    tagged.join("\n")
}

/// 拼接全部要点块，每块前注明来源页
pub fn join_bullets(facts: &[PageFact]) -> String {
    facts
        .iter()
        .map(|fact| format!("- From page {}:\n{}", fact.page, fact.bullets))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// TL;DR 与 reduce 步骤
pub struct DigestReducer {
    gateway: ModelGateway,
}

impl DigestReducer {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    /// 两句话的 TL;DR（纯文本）
    pub async fn tldr(&self, title: &str, abstract_text: &str) -> Result<String, LlmError> {
        let response = self
            .gateway
            .ask(&TldrPrompt {
                title,
                abstract_text,
            })
            .await?;
        Ok(response.trim().to_string())
    }

    /// 基于全部要点生成方法卡片、摘要段落与讨论问题
    pub async fn reduce(
        &self,
        title: &str,
        abstract_text: &str,
        bullets: &str,
    ) -> Result<String, LlmError> {
        let response = self
            .gateway
            .ask(&ReducePrompt(BulletContext {
                title,
                abstract_text,
                bullets,
            }))
            .await?;
        Ok(response.trim().to_string())
    }
}
