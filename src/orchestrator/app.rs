//! 应用外壳 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：构建模型网关、论文源、进度文件
//! 2. **运行流水线**：委托 `DigestPipeline` 生成报告
//! 3. **输出**：`report.md`（失败即终止）、`report.html` 与 `report.docx`（尽力而为）
//! 4. **投递**：按配置发送邮件（失败只记录）
//! 5. **全局统计**：运行结束时输出

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::{ArxivSource, Envelope, PaperSource, SmtpMailer};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::orchestrator::digest_pipeline::{DigestPipeline, DigestReport};
use crate::services::progress::{JsonFileProgress, ProgressSink, ProgressStage, ProgressUpdate};
use crate::services::docx_export::write_docx;
use crate::services::report::render_html;
use crate::services::ModelGateway;
use crate::utils::logging::{log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: DigestPipeline,
    progress: Arc<dyn ProgressSink>,
}

impl App {
    /// 初始化应用
    ///
    /// 不支持的模型后端在这里直接失败。
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let gateway = ModelGateway::from_config(&config)?;
        log_startup(
            gateway.model(),
            &config.classification.labels,
            config.classification.top_k_per_label,
        );

        let output_dir = PathBuf::from(&config.run.output_dir);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(output_dir.display().to_string(), e))?;

        let source = ArxivSource::new(output_dir, config.retry.policy())?;
        let progress = JsonFileProgress::new(&config.run.progress_file);

        Ok(Self::with_parts(config, gateway, Arc::new(source), Arc::new(progress)))
    }

    /// 使用指定组件创建应用
    pub fn with_parts(
        config: Config,
        gateway: ModelGateway,
        source: Arc<dyn PaperSource>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let pipeline = DigestPipeline::new(&config, gateway, source, progress.clone());
        Self {
            config,
            pipeline,
            progress,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<DigestReport> {
        let report = self.pipeline.run().await?;

        let md_path = PathBuf::from(&self.config.run.output_markdown);
        tokio::fs::write(&md_path, &report.markdown)
            .await
            .map_err(|e| AppError::file_write_failed(md_path.display().to_string(), e))?;
        info!("📝 报告已写入 {}", md_path.display());

        let html = render_html(&report.markdown, &format!("Daily arXiv Digest ({})", report.date));
        let html_path = PathBuf::from(&self.config.run.output_html);
        let html_written = match tokio::fs::write(&html_path, &html).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ HTML 导出失败 {}: {}", html_path.display(), e);
                false
            }
        };

        let docx_path = PathBuf::from(&self.config.run.output_docx);
        let docx_written = match write_docx(&report.markdown, &docx_path) {
            Ok(()) => {
                info!("📄 DOCX 已写入 {}", docx_path.display());
                true
            }
            Err(e) => {
                warn!("⚠️ DOCX 导出失败: {}", e);
                false
            }
        };

        if self.config.email.enabled {
            let mut attachments = vec![md_path.clone()];
            if docx_written {
                attachments.push(docx_path);
            }
            if html_written {
                attachments.push(html_path);
            }
            self.send_email(&report, html, attachments).await;
        }

        self.progress.report(&ProgressUpdate::new(
            ProgressStage::Done,
            None,
            None,
            "completed",
        ));
        print_final_stats(
            report.fetched,
            report.analyzed,
            report.degraded,
            &md_path.display().to_string(),
        );

        Ok(report)
    }

    /// 发送邮件（失败只记录）
    async fn send_email(&self, report: &DigestReport, html_body: String, attachments: Vec<PathBuf>) {
        self.progress.report(&ProgressUpdate::counted(
            ProgressStage::Email,
            0,
            1,
            "sending email",
        ));

        let envelope = Envelope {
            subject: format!("Daily arXiv Digest ({})", report.date),
            html_body,
            attachments,
        };
        let mailer = SmtpMailer::new(self.config.email.clone());

        match mailer.send(&envelope).await {
            Ok(()) => self.progress.report(&ProgressUpdate::counted(
                ProgressStage::Email,
                1,
                1,
                "email sent",
            )),
            Err(e) => warn!("⚠️ 邮件发送失败: {}", e),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
