//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整次运行的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用外壳
//! - 管理应用生命周期（初始化、运行）
//! - 持有模型网关、论文源、进度文件
//! - 写出报告文件，发送邮件
//! - 输出全局统计信息
//!
//! ### `digest_pipeline` - 日报流水线
//! - 拉取论文（Vec<Paper>）并逐篇分类
//! - 分桶排序，选出每个标签的前 K 篇
//! - 对每个选中条目调用 AnalysisFlow
//! - 组装报告，上报进度
//!
//! ## 层次关系
//!
//! ```text
//! app (文件输出 / 邮件 / 统计)
//!     ↓
//! digest_pipeline (处理 Vec<Paper>)
//!     ↓
//! workflow::AnalysisFlow (处理单篇 Paper)
//!     ↓
//! services (能力层：gateway / classifier / summarizer / extractors / translator)
//!     ↓
//! clients (基础设施：LLM 后端 / arXiv / SMTP)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管输出，digest_pipeline 管调度
//! 2. **资源隔离**：只有编排层持有客户端
//! 3. **向下依赖**：编排层 → workflow → services → clients
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod app;
pub mod digest_pipeline;

// 重新导出主要类型
pub use app::App;
pub use digest_pipeline::{DigestPipeline, DigestReport};
