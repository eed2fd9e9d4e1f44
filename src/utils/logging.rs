/// 日志工具模块
///
/// 提供日志初始化和输出格式化的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 默认级别为 info，可通过 `RUST_LOG` 覆盖。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `model`: 模型名称
/// - `labels`: 标签列表
/// - `top_k`: 每个标签保留的论文数
pub fn log_startup(model: &str, labels: &[String], top_k: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 每日论文摘要");
    info!("🤖 模型: {}", model);
    info!("🏷️ 标签: {} (每个标签 Top {})", labels.join(", "), top_k);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始
pub fn log_stage(stage: &str, detail: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 阶段: {} - {}", stage, detail);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `fetched`: 拉取的论文数
/// - `analyzed`: 完成分析的条目数
/// - `degraded`: 可选增强步骤降级的次数
/// - `report_path`: 报告路径
pub fn print_final_stats(fetched: usize, analyzed: usize, degraded: usize, report_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📄 拉取论文: {}", fetched);
    info!("✅ 完成分析: {}", analyzed);
    info!("⚠️ 降级步骤: {}", degraded);
    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("多智能体规划框架", 4), "多智能体...");
    }
}
