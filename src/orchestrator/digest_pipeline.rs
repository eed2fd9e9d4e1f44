//! 日报流水线 - 编排层
//!
//! ## 职责
//!
//! 处理 `Vec<Paper>`：拉取 → 分类 → 分桶排序 → 逐篇分析 → 组装报告。
//! 每一步都严格顺序执行，每个阶段切换和每篇论文完成后上报进度。
//!
//! ## 失败边界
//!
//! - 拉取失败、分类或核心摘要步骤重试耗尽：终止本次运行
//! - 单篇论文 PDF 下载/提取失败：退化为仅摘要分析
//! - 可选增强步骤失败：由 `AnalysisFlow` 降级处理
//!
//! 同一篇论文的分页正文在一次运行内只下载一次（分类摘录与多个标签下的分析共用）。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::clients::{PaperSource, SearchQuery, SubmissionWindow};
use crate::config::Config;
use crate::error::{AppResult, SourceError};
use crate::models::{ClassifiedPaper, PageText, Paper};
use crate::services::progress::{ProgressSink, ProgressStage, ProgressUpdate};
use crate::services::ranking::{self, Bucket};
use crate::services::translator::language_label;
use crate::services::{Classifier, ModelGateway, ReportBuilder, ReportHeader};
use crate::utils::logging::{log_stage, truncate_text};
use crate::workflow::{AnalysisFlow, PaperCtx};

/// 一次运行的产出
#[derive(Debug, Clone)]
pub struct DigestReport {
    /// 报告日期（YYYY-MM-DD）
    pub date: String,
    pub markdown: String,
    /// 拉取到的论文数
    pub fetched: usize,
    /// 完成分析的条目数（同一篇论文在多个标签下分别计数）
    pub analyzed: usize,
    /// 降级的可选步骤总数
    pub degraded: usize,
}

/// 本次运行内按论文 id 缓存的分页正文（只缓存成功的结果）
type PageCache = HashMap<String, Vec<PageText>>;

/// 日报流水线
pub struct DigestPipeline {
    source: Arc<dyn PaperSource>,
    classifier: Classifier,
    flow: AnalysisFlow,
    progress: Arc<dyn ProgressSink>,
    model: String,
    categories: Vec<String>,
    recency_days: i64,
    max_papers: usize,
    top_k: usize,
    max_pages: usize,
    use_full_text: bool,
    translation_label: String,
}

impl DigestPipeline {
    /// 创建流水线
    ///
    /// 分析选项在这里从配置构建一次，之后不再变化。
    pub fn new(
        config: &Config,
        gateway: ModelGateway,
        source: Arc<dyn PaperSource>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            source,
            classifier: Classifier::new(gateway.clone(), config.classification.labels.clone()),
            model: gateway.model().to_string(),
            flow: AnalysisFlow::new(
                gateway,
                config.analysis_options(),
                config.summarization.page_concurrency,
            ),
            progress,
            categories: config.run.categories.clone(),
            recency_days: config.run.recency_days,
            max_papers: config.run.max_papers,
            top_k: config.classification.top_k_per_label,
            max_pages: config.summarization.max_pages,
            use_full_text: config.classification.use_full_text,
            translation_label: language_label(&config.bilingual.secondary).to_string(),
        }
    }

    /// 执行一次完整运行
    pub async fn run(&self) -> AppResult<DigestReport> {
        let window = SubmissionWindow::ending_now(self.recency_days);

        // ========== 1. 拉取 ==========
        let papers = self.fetch(&window).await?;
        let fetched = papers.len();

        // ========== 2. 分类 ==========
        let mut page_cache = PageCache::new();
        let classified = self.classify_all(papers, &mut page_cache).await?;

        // ========== 3. 分桶排序 ==========
        let buckets = ranking::select(&classified, self.classifier.labels(), self.top_k);
        let total = ranking::total_selected(&buckets);
        for bucket in &buckets {
            info!("🏷️ {}: 选中 {} 篇", bucket.label, bucket.len());
        }

        // ========== 4. 逐篇分析并组装 ==========
        let date = Local::now().format("%Y-%m-%d").to_string();
        let header = ReportHeader {
            date: date.clone(),
            window_start: window.start_minute(),
            window_end: window.end_minute(),
            categories: self.categories.clone(),
            model: self.model.clone(),
        };
        let (markdown, analyzed, degraded) = self
            .analyze_all(&buckets, &header, total, &mut page_cache)
            .await?;

        Ok(DigestReport {
            date,
            markdown,
            fetched,
            analyzed,
            degraded,
        })
    }

    async fn fetch(&self, window: &SubmissionWindow) -> AppResult<Vec<Paper>> {
        let query = SearchQuery {
            categories: self.categories.clone(),
            window: *window,
            max_results: self.max_papers,
        };
        log_stage("拉取", &query.to_query_string());
        self.report(ProgressUpdate::counted(ProgressStage::Fetching, 0, 0, "querying arXiv"));

        let papers = self.source.fetch_recent(&query).await?;

        info!("✓ 拉取到 {} 篇论文", papers.len());
        self.report(ProgressUpdate::counted(
            ProgressStage::Fetched,
            papers.len(),
            papers.len(),
            "papers fetched",
        ));
        Ok(papers)
    }

    async fn classify_all(
        &self,
        papers: Vec<Paper>,
        cache: &mut PageCache,
    ) -> AppResult<Vec<ClassifiedPaper>> {
        log_stage("分类", &format!("{} 篇论文", papers.len()));
        let total = papers.len();
        let mut classified = Vec::with_capacity(total);

        for (idx, paper) in papers.into_iter().enumerate() {
            self.report(ProgressUpdate::counted(
                ProgressStage::Classifying,
                idx + 1,
                total,
                paper.id.clone(),
            ));

            let excerpt = if self.use_full_text {
                self.excerpt_for(&paper, cache).await
            } else {
                String::new()
            };

            let scores = self
                .classifier
                .classify(&paper.title, &paper.abstract_text, &excerpt)
                .await?;
            info!(
                "[{}/{}] {} → {} ({:.2})",
                idx + 1,
                total,
                truncate_text(paper.title.trim(), 60),
                scores.primary(),
                scores.get(scores.primary())
            );

            classified.push(ClassifiedPaper { paper, scores });
        }
        Ok(classified)
    }

    /// 分类用的正文摘录，失败时为空
    async fn excerpt_for(&self, paper: &Paper, cache: &mut PageCache) -> String {
        match self.load_pages(paper, cache).await {
            Ok(pages) => pages
                .iter()
                .map(|p| p.text.trim())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                warn!("论文 {} 正文摘录获取失败，仅用摘要分类: {}", paper.id, e);
                String::new()
            }
        }
    }

    async fn analyze_all(
        &self,
        buckets: &[Bucket],
        header: &ReportHeader,
        total: usize,
        cache: &mut PageCache,
    ) -> AppResult<(String, usize, usize)> {
        log_stage("摘要", &format!("{} 个条目", total));
        self.report(ProgressUpdate::counted(
            ProgressStage::Summarizing,
            0,
            total,
            "starting summaries",
        ));

        let mut builder = ReportBuilder::new(header, self.top_k, self.translation_label.as_str());
        let mut done = 0;
        let mut degraded = 0;

        for bucket in buckets {
            builder.begin_label(bucket);

            for (idx, entry) in bucket.entries.iter().enumerate() {
                let rank = idx + 1;
                let ctx = PaperCtx::new(
                    entry.paper.id.clone(),
                    bucket.label.clone(),
                    rank,
                    done + 1,
                    total,
                );
                info!("{} 🔍 {}", ctx, truncate_text(entry.paper.title.trim(), 60));

                let pages = self.pages_for(&entry.paper, &ctx, cache).await;
                let analysis = self.flow.run(&entry.paper, &pages, &ctx).await?;

                builder.push_paper(&bucket.label, rank, entry, &analysis);
                done += 1;
                degraded += analysis.degraded_steps;
                self.report(ProgressUpdate::counted(
                    ProgressStage::Summarizing,
                    done,
                    total,
                    entry.paper.id.clone(),
                ));
            }

            builder.end_label();
        }

        Ok((builder.finish(), done, degraded))
    }

    /// 分析用的分页正文，失败时为空（仅用摘要）
    async fn pages_for(
        &self,
        paper: &Paper,
        ctx: &PaperCtx,
        cache: &mut PageCache,
    ) -> Vec<PageText> {
        match self.load_pages(paper, cache).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("{} ⚠️ 正文获取失败，仅基于摘要分析: {}", ctx, e);
                Vec::new()
            }
        }
    }

    async fn load_pages(
        &self,
        paper: &Paper,
        cache: &mut PageCache,
    ) -> Result<Vec<PageText>, SourceError> {
        if let Some(pages) = cache.get(&paper.id) {
            debug!("论文 {} 使用已下载的正文", paper.id);
            return Ok(pages.clone());
        }
        let pages = self.source.load_pages(paper, self.max_pages).await?;
        cache.insert(paper.id.clone(), pages.clone());
        Ok(pages)
    }

    fn report(&self, update: ProgressUpdate) {
        self.progress.report(&update);
    }
}
