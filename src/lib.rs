//! # Paper Digest
//!
//! 每日 arXiv 论文摘要流水线：拉取近期论文，用大模型分类和摘要，
//! 按标签排序选出前 K 篇，生成 Markdown / HTML 报告并可选发送邮件。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有稀缺资源（HTTP 客户端、SMTP），只暴露能力
//! - `ChatBackend` - Ollama / OpenAI 兼容后端
//! - `ArxivSource` - arXiv 查询、PDF 下载与分页提取
//! - `SmtpMailer` - 邮件发送
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单篇论文
//! - `ModelGateway` - 带重试的模型调用
//! - `Classifier` - 标签打分
//! - `PageSummarizer` / `DigestReducer` - map-reduce 摘要
//! - `ResultsExtractor` - 可复现性清单与 SOTA 表格
//! - `Translator` - 双语翻译
//! - `ranking` / `report` / `docx_export` / `progress` - 排序、报告组装、DOCX 导出、进度上报
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一篇论文"的完整分析流程
//! - `PaperCtx` - 上下文封装（paper_id + label + rank）
//! - `AnalysisFlow` - 流程编排（TL;DR → map → reduce → 抽取 → 翻译）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/digest_pipeline` - 拉取、分类、排序、逐篇分析
//! - `orchestrator/app` - 文件输出、邮件、统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AnalysisResult, LabelScore, Paper};
pub use orchestrator::{App, DigestPipeline, DigestReport};
pub use workflow::{AnalysisFlow, AnalysisOptions, BilingualOptions, PaperCtx};
