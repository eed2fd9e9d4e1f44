//! 报告组装与格式整理
//!
//! - `clean_markdown`: 整理模型输出的 Markdown（标题空格、项目符号、引用标记、表格分隔行）
//! - `english_fragment`: 单篇论文的英文片段
//! - `ReportBuilder`: 整份日报
//! - `render_html`: Markdown 转 HTML（邮件正文与 `report.html`）

use std::sync::LazyLock;

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

use crate::models::{AnalysisResult, ReproChecklist, SotaItem};
use crate::services::extractors::{format_repro_checklist, format_sota_table};
use crate::services::ranking::{Bucket, BucketEntry};

/// 转义表格单元格中的竖线
pub fn md_escape(text: &str) -> String {
    text.replace('|', "\\|")
}

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));
// "## - Title" / "##* Title"
static HEADING_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})[ \t]*[-*]+[ \t]+").expect("valid heading bullet regex")
});
// "##Title"
static HEADING_NO_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})([^\s#])").expect("valid heading spacing regex"));
static BULLET_GLYPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[•·‣◦][ \t]*").expect("valid bullet glyph regex"));
static PLACEHOLDER_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[p\.\s*(?:X|x|N/?A|NA)\]").expect("valid placeholder citation regex")
});
static SPACED_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[p\.\s*(\d+)\]").expect("valid citation regex"));
static HEADING_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n])\n(#{1,6}\s)").expect("valid heading gap regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("valid trailing space regex"));

fn replace_all(re: &Regex, text: &str, replacement: &str) -> String {
    re.replace_all(text, replacement).into_owned()
}

/// 整理模型生成的 Markdown
pub fn clean_markdown(markdown: &str) -> String {
    let mut s = markdown.replace("\r\n", "\n").replace('\r', "\n");
    s = replace_all(&BLANK_RUNS, &s, "\n\n");
    s = replace_all(&HEADING_BULLET, &s, "$1 ");
    s = replace_all(&HEADING_NO_SPACE, &s, "$1 $2");
    s = replace_all(&BULLET_GLYPH, &s, "- ");
    // 占位引用
    s = replace_all(&PLACEHOLDER_CITATION, &s, "");
    s = replace_all(&SPACED_CITATION, &s, "[p.$1]");

    s = fix_tables(&s);

    s = replace_all(&HEADING_GAP, &s, "$1\n\n$2");
    s = replace_all(&TRAILING_SPACE, &s, "");
    s
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

pub(crate) fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains("---") && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// 表头后缺少分隔行时补上，并保证表格前后各有一个空行
fn fix_tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !is_table_row(line) || is_separator_row(line) {
            out.push(line.to_string());
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < lines.len() && is_table_row(lines[j]) {
            j += 1;
        }
        let mut block: Vec<String> = lines[i..j].iter().map(|l| l.to_string()).collect();

        if block.len() == 1 || !is_separator_row(&block[1]) {
            let columns = line.split('|').filter(|c| !c.trim().is_empty()).count().max(1);
            block.insert(1, format!("|{}|", vec!["---"; columns].join("|")));
        }

        if out.last().is_some_and(|prev| !prev.trim().is_empty()) {
            out.push(String::new());
        }
        out.extend(block);
        if j < lines.len() && !lines[j].trim().is_empty() {
            out.push(String::new());
        }
        i = j;
    }
    out.join("\n")
}

/// 单篇论文的英文片段
///
/// TL;DR、方法卡片、SOTA 表格、可复现性清单依次排列。
pub fn english_fragment(
    tldr: &str,
    digest_md: &str,
    sota: &[SotaItem],
    repro: &ReproChecklist,
) -> String {
    let parts = [
        format!("**TL;DR:** {}", tldr),
        "## Method Card".to_string(),
        digest_md.to_string(),
        "## SOTA Table".to_string(),
        format_sota_table(sota),
        "## Reproducibility Checklist".to_string(),
        format_repro_checklist(repro),
    ];
    clean_markdown(&parts.join("\n\n"))
}

/// 日报头部信息
#[derive(Debug, Clone)]
pub struct ReportHeader {
    /// 报告日期（YYYY-MM-DD）
    pub date: String,
    pub window_start: String,
    pub window_end: String,
    pub categories: Vec<String>,
    pub model: String,
}

/// 日报组装
///
/// 结构：标题、运行信息，然后每个标签一张排名表，表后是各篇论文的分析小节。
pub struct ReportBuilder {
    lines: Vec<String>,
    top_k: usize,
    translation_label: String,
}

impl ReportBuilder {
    /// `translation_label` 为译文小节标题中的语言标注（如 `中文`）
    pub fn new(header: &ReportHeader, top_k: usize, translation_label: impl Into<String>) -> Self {
        let lines = vec![
            format!("# Daily arXiv Digest ({})\n", header.date),
            format!(
                "**Window (UTC):** {} → {} | **Categories:** {} | **Model:** {}\n",
                header.window_start,
                header.window_end,
                header.categories.join(", "),
                header.model
            ),
        ];
        Self {
            lines,
            top_k,
            translation_label: translation_label.into(),
        }
    }

    /// 标签标题与排名表
    pub fn begin_label(&mut self, bucket: &Bucket) {
        self.lines
            .push(format!("## {} — Top {}\n", bucket.label, self.top_k));

        let mut table = vec![
            "|#|Title|arXiv|Date|PrimaryCat|Score|".to_string(),
            "|---|---|---|---|---|---|".to_string(),
        ];
        for (idx, entry) in bucket.entries.iter().enumerate() {
            let paper = &entry.paper;
            table.push(format!(
                "|{}|{}|[{}]({})|{}|{}|{:.2}|",
                idx + 1,
                md_escape(paper.title.trim()),
                paper.id,
                paper.entry_link,
                paper.published_date(),
                paper.primary_category,
                entry.score
            ));
        }
        self.lines.push(format!("{}\n", table.join("\n")));
    }

    /// 单篇论文的分析小节
    pub fn push_paper(&mut self, label: &str, rank: usize, entry: &BucketEntry, analysis: &AnalysisResult) {
        let paper = &entry.paper;
        self.lines.push(format!(
            "### {} · {}. {}\n",
            label,
            rank,
            md_escape(paper.title.trim())
        ));
        self.lines.push(format!(
            "**arXiv**: [{}]({}) | **PDF**: {} | **Score**: {:.2}\n",
            paper.id,
            paper.entry_link,
            paper.pdf_link.as_deref().unwrap_or("n/a"),
            entry.score
        ));
        self.lines.push(format!("{}\n", analysis.english_md));

        if let Some(bilingual) = &analysis.bilingual_md {
            self.lines.push(format!(
                "## （{}）Bilingual Translation\n",
                self.translation_label
            ));
            self.lines.push(format!("{}\n", bilingual));
        }
    }

    pub fn end_label(&mut self) {
        self.lines.push("\n---\n".to_string());
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }
}

/// Markdown 转完整 HTML 文档
pub fn render_html(markdown: &str, title: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        title.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;"),
        body
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{LabelScore, Paper};

    #[test]
    fn test_clean_markdown_headings_and_bullets() {
        let raw = "Intro\r\n##Method\n## - Results\n• first\n  · second\n\n\n\nEnd   ";
        assert_eq!(
            clean_markdown(raw),
            "Intro\n\n## Method\n\n## Results\n- first\n- second\n\nEnd"
        );
    }

    #[test]
    fn test_clean_markdown_bold_heading_untouched() {
        assert_eq!(clean_markdown("## **Method Card**"), "## **Method Card**");
    }

    #[test]
    fn test_clean_markdown_is_stable_when_reapplied() {
        let raw = "##Intro\r\n•  point [p. 2]\n|A|B|\n|1|2|\n\n\n\ntail  ";
        let once = clean_markdown(raw);
        assert_eq!(once, "## Intro\n- point [p.2]\n\n|A|B|\n|---|---|\n|1|2|\n\ntail");
        assert_eq!(clean_markdown(&once), once);
    }

    #[test]
    fn test_clean_markdown_citations() {
        assert_eq!(
            clean_markdown("acc 91% [p. 6], source [p.X] and [p.N/A]."),
            "acc 91% [p.6], source  and ."
        );
    }

    #[test]
    fn test_clean_markdown_inserts_table_separator() {
        let raw = "Results:\n|Metric|Value|\n|Acc|91|\nDone";
        assert_eq!(
            clean_markdown(raw),
            "Results:\n\n|Metric|Value|\n|---|---|\n|Acc|91|\n\nDone"
        );
    }

    #[test]
    fn test_clean_markdown_keeps_existing_separator() {
        let raw = "|a|b|\n|---|---|\n|1|2|";
        assert_eq!(clean_markdown(raw), raw);
    }

    #[test]
    fn test_clean_markdown_leaves_inline_pipes() {
        let raw = "**arXiv**: x | **PDF**: y";
        assert_eq!(clean_markdown(raw), raw);
    }

    #[test]
    fn test_english_fragment_layout() {
        let fragment = english_fragment(
            "PlanNet plans.",
            "- Task: planning [p.1]",
            &[],
            &ReproChecklist::unknown(),
        );
        assert_eq!(
            fragment,
            "**TL;DR:** PlanNet plans.\n\n## Method Card\n\n- Task: planning [p.1]\n\n\
             ## SOTA Table\n\n_No explicit SOTA-style numbers extracted._\n\n\
             ## Reproducibility Checklist\n\n_Reproducibility signals: unknown._"
        );
    }

    #[test]
    fn test_english_fragment_with_table() {
        let sota = vec![SotaItem {
            metric: "SR".into(),
            dataset: "ALFWorld".into(),
            value: 91.5,
            baseline: None,
            delta: None,
            page: Some(6),
        }];
        let fragment = english_fragment(
            "t",
            "d",
            &sota,
            &ReproChecklist::unknown(),
        );
        assert!(fragment.contains("## SOTA Table\n\n|Metric|Dataset|Value|Baseline|Delta|Page|\n|---|---|---|---|---|---|\n|SR|ALFWorld|91.5|||6|\n\n## Reproducibility"));
    }

    fn entry(title: &str, score: f64) -> BucketEntry {
        BucketEntry {
            score,
            paper: Paper {
                id: "2501.01234v1".into(),
                title: title.into(),
                abstract_text: "abs".into(),
                published: Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap(),
                primary_category: "cs.AI".into(),
                entry_link: "http://arxiv.org/abs/2501.01234v1".into(),
                pdf_link: Some("http://arxiv.org/pdf/2501.01234v1".into()),
            },
            scores: LabelScore::new(vec![("Agent".into(), score)], "Agent".into()),
        }
    }

    fn header() -> ReportHeader {
        ReportHeader {
            date: "2025-01-07".into(),
            window_start: "202501010000".into(),
            window_end: "202501070000".into(),
            categories: vec!["cs.AI".into(), "cs.CL".into()],
            model: "qwen2.5-coder:14b".into(),
        }
    }

    #[test]
    fn test_report_structure() {
        let bucket = Bucket {
            label: "Agent".into(),
            entries: vec![entry("Agents | Planning", 0.9)],
        };
        let analysis = AnalysisResult {
            tldr: "t".into(),
            digest_md: "d".into(),
            repro: ReproChecklist::unknown(),
            sota: vec![],
            english_md: "ENGLISH".into(),
            bilingual_md: Some("中文内容".into()),
            degraded_steps: 0,
        };

        let mut builder = ReportBuilder::new(&header(), 10, "中文");
        builder.begin_label(&bucket);
        builder.push_paper("Agent", 1, &bucket.entries[0], &analysis);
        builder.end_label();
        let report = builder.finish();

        assert!(report.starts_with("# Daily arXiv Digest (2025-01-07)\n"));
        assert!(report.contains(
            "**Window (UTC):** 202501010000 → 202501070000 | **Categories:** cs.AI, cs.CL | **Model:** qwen2.5-coder:14b"
        ));
        assert!(report.contains("## Agent — Top 10\n"));
        assert!(report.contains("|#|Title|arXiv|Date|PrimaryCat|Score|\n|---|---|---|---|---|---|\n"));
        assert!(report.contains(
            "|1|Agents \\| Planning|[2501.01234v1](http://arxiv.org/abs/2501.01234v1)|2025-01-06|cs.AI|0.90|"
        ));
        assert!(report.contains("### Agent · 1. Agents \\| Planning\n"));
        assert!(report.contains("**PDF**: http://arxiv.org/pdf/2501.01234v1 | **Score**: 0.90"));
        assert!(report.contains("ENGLISH\n"));
        assert!(report.contains("## （中文）Bilingual Translation\n"));
        assert!(report.trim_end().ends_with("---"));
    }

    #[test]
    fn test_empty_bucket_still_has_table_header() {
        let bucket = Bucket {
            label: "RAG".into(),
            entries: vec![],
        };
        let mut builder = ReportBuilder::new(&header(), 5, "中文");
        builder.begin_label(&bucket);
        builder.end_label();
        let report = builder.finish();
        assert!(report.contains("## RAG — Top 5\n"));
        assert!(report.contains("|#|Title|arXiv|Date|PrimaryCat|Score|"));
    }

    #[test]
    fn test_render_html_tables() {
        let html = render_html("# Title\n\n|a|b|\n|---|---|\n|1|2|\n", "Daily <Digest>");
        assert!(html.contains("<title>Daily &lt;Digest&gt;</title>"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }
}
