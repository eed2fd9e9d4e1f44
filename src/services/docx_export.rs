//! DOCX 导出
//!
//! 把日报 Markdown 转成 Word 文档（`report.docx`），作为邮件附件之一。
//! 只覆盖报告中会出现的写法：
//!
//! - `#` .. `######` 标题（`#` 为文档标题，`#####` 与 `######` 同级）
//! - `-` 项目列表、`1.` 编号列表
//! - `**粗体**`、`*斜体*`、`` `代码` ``
//! - 竖线表格（首行加粗，分隔行跳过）
//! - 围栏代码块、`---` 分隔线
//!
//! 解析与排版分两步：`parse_blocks` 得到块序列，`build_docx` 生成文档。

use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

use docx_rs::{
    AbstractNumbering, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat,
    Numbering, NumberingId, Paragraph, Run, RunFonts, Start, Style, StyleType, Table, TableCell,
    TableRow,
};
use regex::Regex;

use crate::error::FileError;
use crate::services::report::is_separator_row;

const BULLET_LIST: usize = 1;
const NUMBERED_LIST: usize = 2;
const CODE_FONT: &str = "Consolas";
/// 半磅，即 10pt
const CODE_SIZE: usize = 20;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(\w+)?\s*$").expect("valid code fence regex"));
static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+").expect("valid bullet item regex"));
static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+").expect("valid numbered item regex"));
static INLINE_MARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\*\*.+?\*\*|\*.+?\*|`.+?`)").expect("valid inline markup regex")
});
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));

/// 行内文本片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Plain(String),
    Bold(String),
    Italic(String),
    Code(String),
}

/// 文档块
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `level` 为 0 表示文档标题
    Heading { level: usize, text: String },
    Bullet(Vec<Inline>),
    Numbered(Vec<Inline>),
    /// 第一行为表头
    Table(Vec<Vec<String>>),
    Code(String),
    Rule,
    Blank,
    Paragraph(Vec<Inline>),
}

/// 把 Markdown 写成 DOCX 文件
pub fn write_docx(markdown: &str, path: &Path) -> Result<(), FileError> {
    let file = File::create(path).map_err(|source| FileError::WriteFailed {
        path: path.display().to_string(),
        source,
    })?;
    build_docx(&parse_blocks(markdown))
        .build()
        .pack(file)
        .map_err(|e| FileError::ExportFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// 逐行解析为文档块
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut code: Option<Vec<&str>> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if FENCE.is_match(line) {
            match code.take() {
                Some(buf) => blocks.push(Block::Code(buf.join("\n"))),
                None => code = Some(Vec::new()),
            }
            i += 1;
            continue;
        }
        if let Some(buf) = code.as_mut() {
            buf.push(line);
            i += 1;
            continue;
        }

        if line.trim_start().starts_with('|') {
            let mut j = i;
            let mut rows = Vec::new();
            while j < lines.len() && lines[j].contains('|') {
                if !is_separator_row(lines[j]) {
                    rows.push(split_row(lines[j]));
                }
                j += 1;
            }
            if !rows.is_empty() {
                blocks.push(Block::Table(rows));
            }
            i = j;
            continue;
        }

        if let Some(block) = heading(line) {
            blocks.push(block);
        } else if BULLET_ITEM.is_match(line) {
            blocks.push(Block::Bullet(inline_runs(&BULLET_ITEM.replace(line, ""))));
        } else if NUMBERED_ITEM.is_match(line) {
            blocks.push(Block::Numbered(inline_runs(&NUMBERED_ITEM.replace(line, ""))));
        } else if line.trim() == "---" {
            blocks.push(Block::Rule);
        } else if line.trim().is_empty() {
            blocks.push(Block::Blank);
        } else {
            let text = LINK.replace_all(line, "$1 ($2)");
            blocks.push(Block::Paragraph(inline_runs(&text)));
        }
        i += 1;
    }

    // 未闭合的代码块照样输出
    if let Some(buf) = code {
        if !buf.is_empty() {
            blocks.push(Block::Code(buf.join("\n")));
        }
    }
    blocks
}

fn heading(line: &str) -> Option<Block> {
    const LEVELS: [(&str, usize); 6] = [
        ("###### ", 4),
        ("##### ", 4),
        ("#### ", 3),
        ("### ", 2),
        ("## ", 1),
        ("# ", 0),
    ];
    LEVELS.iter().find_map(|(prefix, level)| {
        line.strip_prefix(prefix).map(|text| Block::Heading {
            level: *level,
            text: text.trim().to_string(),
        })
    })
}

/// 拆分表格行，`\|` 视为单元格内的竖线
fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').filter(|s| !s.ends_with('\\')).unwrap_or(inner);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

/// 拆分行内格式
pub fn inline_runs(text: &str) -> Vec<Inline> {
    let mut runs = Vec::new();
    let mut pos = 0;
    for m in INLINE_MARK.find_iter(text) {
        if m.start() > pos {
            runs.push(Inline::Plain(text[pos..m.start()].to_string()));
        }
        let token = m.as_str();
        let bold = token.strip_prefix("**").and_then(|t| t.strip_suffix("**"));
        let run = if let Some(inner) = bold {
            Inline::Bold(inner.to_string())
        } else if let Some(inner) = token.strip_prefix('`').and_then(|t| t.strip_suffix('`')) {
            Inline::Code(inner.to_string())
        } else {
            Inline::Italic(token[1..token.len() - 1].to_string())
        };
        runs.push(run);
        pos = m.end();
    }
    if pos < text.len() {
        runs.push(Inline::Plain(text[pos..].to_string()));
    }
    runs
}

/// 生成文档
pub fn build_docx(blocks: &[Block]) -> Docx {
    let mut docx = Docx::new()
        .add_style(heading_style(0, 36))
        .add_style(heading_style(1, 32))
        .add_style(heading_style(2, 28))
        .add_style(heading_style(3, 26))
        .add_style(heading_style(4, 24))
        .add_abstract_numbering(list_numbering(BULLET_LIST, "bullet", "•"))
        .add_numbering(Numbering::new(BULLET_LIST, BULLET_LIST))
        .add_abstract_numbering(list_numbering(NUMBERED_LIST, "decimal", "%1."))
        .add_numbering(Numbering::new(NUMBERED_LIST, NUMBERED_LIST));

    for block in blocks {
        docx = match block {
            Block::Heading { level, text } => docx.add_paragraph(
                Paragraph::new()
                    .style(&heading_style_id(*level))
                    .add_run(Run::new().add_text(text)),
            ),
            Block::Bullet(runs) => docx.add_paragraph(
                inline_paragraph(runs)
                    .numbering(NumberingId::new(BULLET_LIST), IndentLevel::new(0)),
            ),
            Block::Numbered(runs) => docx.add_paragraph(
                inline_paragraph(runs)
                    .numbering(NumberingId::new(NUMBERED_LIST), IndentLevel::new(0)),
            ),
            Block::Table(rows) => docx.add_table(table(rows)),
            Block::Code(code) => docx.add_paragraph(code_paragraph(code)),
            Block::Rule => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text("-".repeat(20))))
            }
            Block::Blank => docx.add_paragraph(Paragraph::new()),
            Block::Paragraph(runs) => docx.add_paragraph(inline_paragraph(runs)),
        };
    }
    docx
}

fn heading_style_id(level: usize) -> String {
    if level == 0 {
        "Title".to_string()
    } else {
        format!("Heading{}", level)
    }
}

fn heading_style(level: usize, size: usize) -> Style {
    let name = if level == 0 {
        "Title".to_string()
    } else {
        format!("heading {}", level)
    };
    Style::new(&heading_style_id(level), StyleType::Paragraph)
        .name(&name)
        .bold()
        .size(size)
}

fn list_numbering(id: usize, format: &str, text: &str) -> AbstractNumbering {
    AbstractNumbering::new(id).add_level(Level::new(
        0,
        Start::new(1),
        NumberFormat::new(format),
        LevelText::new(text),
        LevelJc::new("left"),
    ))
}

fn code_run(text: &str) -> Run {
    Run::new()
        .add_text(text)
        .fonts(RunFonts::new().ascii(CODE_FONT).hi_ansi(CODE_FONT).east_asia("等线"))
        .size(CODE_SIZE)
}

fn inline_paragraph(runs: &[Inline]) -> Paragraph {
    runs.iter().fold(Paragraph::new(), |p, inline| {
        let run = match inline {
            Inline::Plain(text) => Run::new().add_text(text),
            Inline::Bold(text) => Run::new().add_text(text).bold(),
            Inline::Italic(text) => Run::new().add_text(text).italic(),
            Inline::Code(text) => code_run(text),
        };
        p.add_run(run)
    })
}

/// 代码块保持为一个段落，行间用换行符分隔
fn code_paragraph(code: &str) -> Paragraph {
    let lines: Vec<&str> = code.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .fold(Paragraph::new(), |p, (idx, line)| {
            let run = code_run(line);
            let run = if idx < last {
                run.add_break(BreakType::TextWrapping)
            } else {
                run
            };
            p.add_run(run)
        })
}

fn table(rows: &[Vec<String>]) -> Table {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows = rows
        .iter()
        .enumerate()
        .map(|(r, values)| {
            let cells = (0..columns)
                .map(|c| {
                    let text = values.get(c).map(String::as_str).unwrap_or("");
                    let run = Run::new().add_text(text);
                    let run = if r == 0 { run.bold() } else { run };
                    TableCell::new().add_paragraph(Paragraph::new().add_run(run))
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();
    Table::new(rows)
}
