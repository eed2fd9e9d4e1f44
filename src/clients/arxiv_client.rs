//! arXiv 客户端 - 基础设施层
//!
//! 负责查询近期提交（Atom API）、下载 PDF 并按页提取文本。
//! 流程层只通过 `PaperSource` trait 使用这些能力。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::models::{PageText, Paper};
use crate::utils::retry::RetryPolicy;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// 提交时间窗口（UTC）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SubmissionWindow {
    /// 以当前时刻为终点，向前 `days` 天
    pub fn ending_now(days: i64) -> Self {
        let end = Local::now().with_timezone(&Utc);
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }

    /// 精确到分钟的 UTC 时间串（如 `202501070930`）
    pub fn start_minute(&self) -> String {
        self.start.format("%Y%m%d%H%M").to_string()
    }

    pub fn end_minute(&self) -> String {
        self.end.format("%Y%m%d%H%M").to_string()
    }
}

/// 论文查询条件
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub categories: Vec<String>,
    pub window: SubmissionWindow,
    pub max_results: usize,
}

impl SearchQuery {
    /// 构建 arXiv 查询语句
    ///
    /// 形如 `(cat:cs.AI OR cat:cs.LG) AND submittedDate:[202501010000 TO 202501070000]`
    pub fn to_query_string(&self) -> String {
        let cats = self
            .categories
            .iter()
            .map(|c| format!("cat:{}", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "({}) AND submittedDate:[{} TO {}]",
            cats,
            self.window.start_minute(),
            self.window.end_minute()
        )
    }
}

/// 论文源
///
/// 提供论文元数据以及按需下载的分页正文。
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn fetch_recent(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError>;

    /// 下载并提取正文，最多 `max_pages` 页，页码从 1 开始
    async fn load_pages(&self, paper: &Paper, max_pages: usize)
        -> Result<Vec<PageText>, SourceError>;
}

/// arXiv 论文源
pub struct ArxivSource {
    http: reqwest::Client,
    api_url: String,
    output_dir: PathBuf,
    retry: RetryPolicy,
    page_size: usize,
    page_delay: Duration,
}

impl ArxivSource {
    /// 创建新的 arXiv 论文源
    ///
    /// # 参数
    /// - `output_dir`: PDF 下载目录（同名文件会被覆盖）
    /// - `retry`: 查询与下载共用的重试策略
    pub fn new(output_dir: impl Into<PathBuf>, retry: RetryPolicy) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SourceError::Request {
                url: ARXIV_API_URL.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_url: ARXIV_API_URL.to_string(),
            output_dir: output_dir.into(),
            retry,
            page_size: 100,
            page_delay: Duration::from_secs(3),
        })
    }

    async fn fetch_page(&self, query: &str, start: usize, count: usize) -> Result<String, SourceError> {
        let start_param = start.to_string();
        let count_param = count.to_string();
        let params = [
            ("search_query", query),
            ("start", start_param.as_str()),
            ("max_results", count_param.as_str()),
            ("sortBy", "submittedDate"),
            ("sortOrder", "descending"),
        ];

        let response = self
            .http
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: self.api_url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Request {
                url: self.api_url.clone(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| SourceError::Request {
            url: self.api_url.clone(),
            message: e.to_string(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Request {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SourceError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    async fn fetch_recent(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        let query_string = query.to_query_string();
        info!("🔍 arXiv 查询: {}", query_string);

        let mut papers = Vec::new();
        let mut start = 0;
        while papers.len() < query.max_results {
            if start > 0 {
                sleep(self.page_delay).await;
            }

            let count = self.page_size.min(query.max_results - papers.len());
            let xml = self
                .retry
                .run(
                    "arXiv 查询",
                    || self.fetch_page(&query_string, start, count),
                    SourceError::is_retryable,
                )
                .await?;

            let batch = parse_atom_feed(&xml)?;
            debug!("arXiv 第 {} 条起返回 {} 篇", start, batch.len());
            let received = batch.len();
            papers.extend(batch);

            if received < count {
                break;
            }
            start += received;
        }

        papers.truncate(query.max_results);
        Ok(papers)
    }

    async fn load_pages(
        &self,
        paper: &Paper,
        max_pages: usize,
    ) -> Result<Vec<PageText>, SourceError> {
        let pdf_url = paper
            .pdf_link
            .as_deref()
            .ok_or_else(|| SourceError::MissingPdf {
                paper_id: paper.id.clone(),
            })?;

        let bytes = self
            .retry
            .run(
                "PDF 下载",
                || self.download(pdf_url),
                SourceError::is_retryable,
            )
            .await?;

        let pdf_path = self.output_dir.join(format!("{}.pdf", paper.id));
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SourceError::Save {
                path: self.output_dir.display().to_string(),
                source,
            })?;
        tokio::fs::write(&pdf_path, &bytes)
            .await
            .map_err(|source| SourceError::Save {
                path: pdf_path.display().to_string(),
                source,
            })?;
        debug!("PDF 已保存: {}", pdf_path.display());

        let path_label = pdf_path.display().to_string();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| SourceError::Extract {
            path: path_label.clone(),
            message: e.to_string(),
        })?
        .map_err(|e| SourceError::Extract {
            path: path_label.clone(),
            message: e.to_string(),
        })?;

        if pages.is_empty() {
            warn!("PDF 未提取到任何页面: {}", path_label);
        }

        Ok(number_pages(pages, max_pages))
    }
}

/// 截取前 `max_pages` 页并从 1 开始编号
pub fn number_pages(pages: Vec<String>, max_pages: usize) -> Vec<PageText> {
    pages
        .into_iter()
        .take(max_pages)
        .enumerate()
        .map(|(i, text)| PageText::new(i as u32 + 1, text))
        .collect()
}

// ========== Atom 解析 ==========

#[derive(Default)]
struct EntryAccum {
    id: String,
    title: String,
    summary: String,
    published: String,
    primary_category: String,
    entry_link: Option<String>,
    pdf_link: Option<String>,
}

impl EntryAccum {
    fn push_text(&mut self, tag: &str, text: &str) {
        match tag {
            "id" => self.id.push_str(text),
            "title" => self.title.push_str(text),
            "summary" => self.summary.push_str(text),
            "published" => self.published.push_str(text),
            _ => {}
        }
    }

    fn apply_attributes(&mut self, e: &BytesStart<'_>) {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut href = None;
        let mut title = None;
        let mut rel = None;
        let mut term = None;

        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.as_ref() {
                b"href" => href = Some(value),
                b"title" => title = Some(value),
                b"rel" => rel = Some(value),
                b"term" => term = Some(value),
                _ => {}
            }
        }

        match tag.as_str() {
            "link" => {
                if title.as_deref() == Some("pdf") {
                    self.pdf_link = href;
                } else if rel.as_deref() == Some("alternate") {
                    self.entry_link = href;
                }
            }
            "arxiv:primary_category" => {
                if let Some(term) = term {
                    self.primary_category = term;
                }
            }
            _ => {}
        }
    }

    fn into_paper(self) -> Option<Paper> {
        let id_url = self.id.trim();
        if id_url.is_empty() {
            return None;
        }
        let short_id = short_id(id_url);
        let published = DateTime::parse_from_rfc3339(self.published.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()?;

        Some(Paper {
            entry_link: self.entry_link.unwrap_or_else(|| id_url.to_string()),
            pdf_link: self.pdf_link,
            id: short_id,
            title: normalize_whitespace(&self.title),
            abstract_text: normalize_whitespace(&self.summary),
            published,
            primary_category: self.primary_category,
        })
    }
}

/// 解析 arXiv Atom 响应
pub fn parse_atom_feed(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();
    let mut accum: Option<EntryAccum> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    accum = Some(EntryAccum::default());
                } else if let Some(entry) = accum.as_mut() {
                    entry.apply_attributes(&e);
                    current_tag = tag;
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = accum.as_mut() {
                    entry.apply_attributes(&e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(entry) = accum.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| SourceError::Feed(err.to_string()))?;
                    entry.push_text(&current_tag, &text);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"entry" {
                    if let Some(paper) = accum.take().and_then(EntryAccum::into_paper) {
                        papers.push(paper);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Feed(e.to_string())),
            _ => {}
        }
    }

    Ok(papers)
}

/// 从 `http://arxiv.org/abs/2501.01234v1` 中提取 `2501.01234v1`
fn short_id(id_url: &str) -> String {
    match id_url.find("/abs/") {
        Some(idx) => id_url[idx + 5..].to_string(),
        None => id_url.rsplit('/').next().unwrap_or(id_url).to_string(),
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2501.01234v1</id>
    <published>2025-01-06T18:00:01Z</published>
    <title>Agents that Plan:
      A Multi-Agent Framework</title>
    <summary>  We propose a multi-agent planning framework &amp; evaluate it.
    </summary>
    <author><name>Ada Lovelace</name></author>
    <link href="http://arxiv.org/abs/2501.01234v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2501.01234v1" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2501.05678v2</id>
    <published>2025-01-05T09:30:00Z</published>
    <title>Retrieval at Scale</title>
    <summary>RAG study.</summary>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let papers = parse_atom_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.id, "2501.01234v1");
        assert_eq!(first.title, "Agents that Plan: A Multi-Agent Framework");
        assert_eq!(
            first.abstract_text,
            "We propose a multi-agent planning framework & evaluate it."
        );
        assert_eq!(first.primary_category, "cs.AI");
        assert_eq!(first.entry_link, "http://arxiv.org/abs/2501.01234v1");
        assert_eq!(
            first.pdf_link.as_deref(),
            Some("http://arxiv.org/pdf/2501.01234v1")
        );
        assert_eq!(first.published_date(), "2025-01-06");

        let second = &papers[1];
        assert_eq!(second.id, "2501.05678v2");
        assert_eq!(second.pdf_link, None);
        assert_eq!(second.entry_link, "http://arxiv.org/abs/2501.05678v2");
    }

    #[test]
    fn test_query_string() {
        let window = SubmissionWindow {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 8, 5, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 1, 7, 8, 5, 0).unwrap(),
        };
        let query = SearchQuery {
            categories: vec!["cs.AI".into(), "cs.LG".into()],
            window,
            max_results: 10,
        };
        assert_eq!(
            query.to_query_string(),
            "(cat:cs.AI OR cat:cs.LG) AND submittedDate:[202501010805 TO 202501070805]"
        );
    }

    #[test]
    fn test_number_pages_is_one_based_and_bounded() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let numbered = number_pages(pages, 2);
        assert_eq!(numbered, vec![PageText::new(1, "a"), PageText::new(2, "b")]);
    }

    #[test]
    fn test_window_spans_recency_days() {
        let window = SubmissionWindow::ending_now(6);
        assert_eq!((window.end - window.start).num_days(), 6);
    }

    /// 需要访问 arXiv
    #[tokio::test]
    #[ignore]
    async fn test_fetch_recent_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let dir = tempfile::tempdir().unwrap();
        let source = ArxivSource::new(dir.path(), RetryPolicy::default()).unwrap();
        let query = SearchQuery {
            categories: vec!["cs.AI".into()],
            window: SubmissionWindow::ending_now(3),
            max_results: 5,
        };
        let papers = source.fetch_recent(&query).await.unwrap();
        println!("找到 {} 篇论文", papers.len());
        assert!(papers.len() <= 5);
    }
}
