//! 单篇论文分析流程 - 流程层
//!
//! 核心职责：定义"一篇论文"的完整分析流程
//!
//! 流程顺序：
//! 1. TL;DR
//! 2. 逐页要点（map）→ 方法卡片（reduce）
//! 3. 可复现性清单 / SOTA 表格（可选）
//! 4. 组装英文片段 → 翻译（可选）
//!
//! 第 1、2 步失败会向上返回；第 3、4 步失败只降级，不影响其他论文。

use tracing::{info, warn};

use crate::error::LlmError;
use crate::models::{AnalysisResult, PageText, Paper, ReproChecklist};
use crate::services::prompts::BulletContext;
use crate::services::report::{clean_markdown, english_fragment};
use crate::services::summarizer::join_bullets;
use crate::services::{DigestReducer, ModelGateway, PageSummarizer, ResultsExtractor, Translator};
use crate::workflow::paper_ctx::PaperCtx;

/// 双语输出选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilingualOptions {
    pub enabled: bool,
    /// 原文语言代码
    pub primary_language: String,
    /// 译文语言代码
    pub secondary_language: String,
}

impl Default for BilingualOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            primary_language: "en".to_string(),
            secondary_language: "zh".to_string(),
        }
    }
}

/// 单篇论文分析选项（运行开始时构建一次）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub generate_sota: bool,
    pub generate_repro: bool,
    pub bilingual: BilingualOptions,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            generate_sota: true,
            generate_repro: true,
            bilingual: BilingualOptions::default(),
        }
    }
}

/// 单篇论文分析流程
///
/// - 编排 map → reduce → 抽取 → 翻译
/// - 不关心论文从哪来、结果写到哪
/// - 只依赖业务能力（services）
pub struct AnalysisFlow {
    summarizer: PageSummarizer,
    reducer: DigestReducer,
    extractor: ResultsExtractor,
    translator: Translator,
    options: AnalysisOptions,
}

impl AnalysisFlow {
    /// 创建新的分析流程
    pub fn new(gateway: ModelGateway, options: AnalysisOptions, page_concurrency: usize) -> Self {
        Self {
            summarizer: PageSummarizer::new(gateway.clone(), page_concurrency),
            reducer: DigestReducer::new(gateway.clone()),
            extractor: ResultsExtractor::new(gateway.clone()),
            translator: Translator::new(gateway),
            options,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// 分析一篇论文
    ///
    /// `pages` 为空时只基于摘要分析。
    pub async fn run(
        &self,
        paper: &Paper,
        pages: &[PageText],
        ctx: &PaperCtx,
    ) -> Result<AnalysisResult, LlmError> {
        let title = paper.title.trim();
        let abstract_text = paper.abstract_text.trim();
        let mut degraded_steps = 0;

        // ========== 1. TL;DR ==========
        let tldr = self.reducer.tldr(title, abstract_text).await?;

        // ========== 2. Map → Reduce ==========
        info!("{} 📄 逐页提取要点（{} 页）", ctx, pages.len());
        let facts = self.summarizer.summarize_pages(pages).await?;
        let bullets = join_bullets(&facts);

        info!("{} 🧩 生成方法卡片", ctx);
        let digest_md = self.reducer.reduce(title, abstract_text, &bullets).await?;

        let bullet_ctx = BulletContext {
            title,
            abstract_text,
            bullets: &bullets,
        };

        // ========== 3. 可选抽取 ==========
        let repro = if self.options.generate_repro {
            match self.extractor.repro(bullet_ctx).await {
                Ok(checklist) => checklist,
                Err(e) => {
                    warn!("{} ⚠️ 可复现性抽取失败，记为未知: {}", ctx, e);
                    degraded_steps += 1;
                    ReproChecklist::unknown()
                }
            }
        } else {
            ReproChecklist::unknown()
        };

        let sota = if self.options.generate_sota {
            match self.extractor.sota(bullet_ctx).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("{} ⚠️ SOTA 抽取失败，记为空: {}", ctx, e);
                    degraded_steps += 1;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let english_md = english_fragment(&tldr, &digest_md, &sota, &repro);

        // ========== 4. 翻译 ==========
        let bilingual = &self.options.bilingual;
        let bilingual_md = if bilingual.enabled {
            info!("{} 🌐 翻译为 {}", ctx, bilingual.secondary_language);
            match self
                .translator
                .translate(
                    &english_md,
                    &bilingual.primary_language,
                    &bilingual.secondary_language,
                )
                .await
            {
                Ok(translated) => Some(clean_markdown(&translated)),
                Err(e) => {
                    warn!("{} ⚠️ 翻译失败，仅保留英文: {}", ctx, e);
                    degraded_steps += 1;
                    None
                }
            }
        } else {
            None
        };

        Ok(AnalysisResult {
            tldr,
            digest_md,
            repro,
            sota,
            english_md,
            bilingual_md,
            degraded_steps,
        })
    }
}
