//! 排序与选择
//!
//! 每个标签独立排序取前 K，不做跨标签归一化：
//! 同一篇论文可以出现在多个标签的列表里，也可以一个都不出现。

use crate::models::{ClassifiedPaper, LabelScore, Paper};

/// 桶中的一条记录
#[derive(Debug, Clone)]
pub struct BucketEntry {
    pub score: f64,
    pub paper: Paper,
    pub scores: LabelScore,
}

/// 单个标签的候选列表（降序，最多 K 条）
#[derive(Debug, Clone)]
pub struct Bucket {
    pub label: String,
    pub entries: Vec<BucketEntry>,
}

impl Bucket {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 按标签分桶并选出前 `top_k`
///
/// 稳定排序：得分相同的论文保持分类时的先后顺序。
pub fn select(papers: &[ClassifiedPaper], labels: &[String], top_k: usize) -> Vec<Bucket> {
    labels
        .iter()
        .map(|label| {
            let mut entries: Vec<BucketEntry> = papers
                .iter()
                .map(|classified| BucketEntry {
                    score: classified.scores.get(label),
                    paper: classified.paper.clone(),
                    scores: classified.scores.clone(),
                })
                .collect();
            entries.sort_by(|a, b| b.score.total_cmp(&a.score));
            entries.truncate(top_k);

            Bucket {
                label: label.clone(),
                entries,
            }
        })
        .collect()
}

/// 所有桶中选中的论文总数（同一篇论文在多个桶中分别计数）
pub fn total_selected(buckets: &[Bucket]) -> usize {
    buckets.iter().map(Bucket::len).sum()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn labels() -> Vec<String> {
        vec!["Agent".into(), "RAG".into()]
    }

    fn classified(id: &str, agent: f64, rag: f64) -> ClassifiedPaper {
        let primary = if rag > agent { "RAG" } else { "Agent" };
        ClassifiedPaper {
            paper: Paper {
                id: id.into(),
                title: format!("Paper {}", id),
                abstract_text: String::new(),
                published: Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap(),
                primary_category: "cs.AI".into(),
                entry_link: format!("http://arxiv.org/abs/{}", id),
                pdf_link: None,
            },
            scores: LabelScore::new(
                vec![("Agent".into(), agent), ("RAG".into(), rag)],
                primary.into(),
            ),
        }
    }

    fn ids(bucket: &Bucket) -> Vec<&str> {
        bucket.entries.iter().map(|e| e.paper.id.as_str()).collect()
    }

    #[test]
    fn test_descending_and_truncated() {
        let papers = vec![
            classified("a", 0.2, 0.0),
            classified("b", 0.9, 0.1),
            classified("c", 0.5, 0.8),
        ];
        let buckets = select(&papers, &labels(), 2);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "Agent");
        assert_eq!(ids(&buckets[0]), vec!["b", "c"]);
        assert_eq!(ids(&buckets[1]), vec!["c", "b"]);
        assert_eq!(total_selected(&buckets), 4);
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let papers = vec![
            classified("first", 0.5, 0.0),
            classified("second", 0.5, 0.0),
            classified("third", 0.5, 0.0),
        ];
        let buckets = select(&papers, &labels(), 10);
        assert_eq!(ids(&buckets[0]), vec!["first", "second", "third"]);
        assert_eq!(ids(&buckets[1]), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_paper_tied_across_labels_appears_in_both() {
        let papers = vec![classified("x", 0.7, 0.7), classified("y", 0.1, 0.2)];
        let buckets = select(&papers, &labels(), 1);
        assert_eq!(ids(&buckets[0]), vec!["x"]);
        assert_eq!(ids(&buckets[1]), vec!["x"]);
    }

    #[test]
    fn test_never_exceeds_top_k() {
        let papers: Vec<_> = (0..25)
            .map(|i| classified(&i.to_string(), i as f64 / 25.0, 0.0))
            .collect();
        for k in [1, 3, 10, 40] {
            for bucket in select(&papers, &labels(), k) {
                assert!(bucket.len() <= k);
            }
        }
    }

    #[test]
    fn test_empty_input_gives_empty_buckets() {
        let buckets = select(&[], &labels(), 5);
        assert_eq!(buckets.len(), 2);
        assert!(buckets.iter().all(Bucket::is_empty));
    }
}
