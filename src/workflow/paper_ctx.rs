//! 论文处理上下文
//!
//! 封装"我正在处理哪个标签下的第几篇论文"这一信息

use std::fmt::Display;

/// 论文处理上下文
#[derive(Debug, Clone)]
pub struct PaperCtx {
    /// arXiv 短 ID
    pub paper_id: String,

    /// 所在标签
    pub label: String,

    /// 在标签内的排名（从1开始）
    pub rank: usize,

    /// 已处理数（从1开始，仅用于日志显示）
    pub position: usize,

    /// 待处理总数
    pub total: usize,
}

impl PaperCtx {
    /// 创建新的论文上下文
    pub fn new(paper_id: String, label: String, rank: usize, position: usize, total: usize) -> Self {
        Self {
            paper_id,
            label,
            rank,
            position,
            total,
        }
    }
}

impl Display for PaperCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{} 论文#{} 标签#{} 排名#{}]",
            self.position, self.total, self.paper_id, self.label, self.rank
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = PaperCtx::new("2501.01234v1".into(), "RAG".into(), 2, 7, 50);
        assert_eq!(ctx.to_string(), "[7/50 论文#2501.01234v1 标签#RAG 排名#2]");
    }
}
