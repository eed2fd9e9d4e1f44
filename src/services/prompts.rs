//! 各阶段的提示词
//!
//! 每个阶段一个结构体，输入字段在渲染前统一整理（去空白、截断），
//! 采样参数作为关联常量固定在类型上。

/// 分类时附带的正文摘录上限（字符）
pub const EXCERPT_CHAR_LIMIT: usize = 2000;

/// 单页正文送入模型前的上限（字符）
pub const PAGE_CHAR_LIMIT: usize = 3500;

/// 一个阶段的提示词
pub trait StagePrompt {
    const TEMPERATURE: f32;
    const MAX_TOKENS: u32;

    /// 渲染为单条用户消息
    fn render(&self) -> String;
}

fn title_or_placeholder(title: &str) -> &str {
    match title.trim() {
        "" => "(untitled)",
        t => t,
    }
}

fn abstract_or_placeholder(abstract_text: &str) -> &str {
    match abstract_text.trim() {
        "" => "(no abstract)",
        a => a,
    }
}

/// 按字符截断（不会切断 UTF-8 字符）
pub fn take_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 已知标签的判定说明
fn label_interpretation(label: &str) -> Option<&'static str> {
    match label {
        "Agent" => Some("autonomous agents / tool-using / multi-agent / planning / agent frameworks."),
        "LLM" => Some(
            "foundation models, pretraining, instruction-tuning, inference/training techniques for large language models.",
        ),
        "Memory" => Some(
            "episodic/long-term memory, retrieval memory modules, knowledge editing, memory-augmented architectures.",
        ),
        "RAG" => Some(
            "retrieval-augmented generation, indexing, retrievers, hybrid search, grounding with external corpora.",
        ),
        "Spatial Learning" => {
            Some("3D/embodied/spatial reasoning, navigation, mapping, spatial grounding.")
        }
        _ => None,
    }
}

// ========== 分类 ==========

pub struct ClassifyPrompt<'a> {
    pub title: &'a str,
    pub abstract_text: &'a str,
    pub excerpt: &'a str,
    pub labels: &'a [String],
}

impl StagePrompt for ClassifyPrompt<'_> {
    const TEMPERATURE: f32 = 0.0;
    const MAX_TOKENS: u32 = 400;

    fn render(&self) -> String {
        let interpretation: String = self
            .labels
            .iter()
            .map(|label| match label_interpretation(label) {
                Some(text) => format!("- {}: {}\n", label, text),
                None => format!("- {}: papers whose main contribution is about {}.\n", label, label),
            })
            .collect();

        let excerpt = take_chars(self.excerpt.trim(), EXCERPT_CHAR_LIMIT);
        let excerpt = if excerpt.is_empty() { "(none)" } else { excerpt };

        format!(
            "You are a domain expert classifying arXiv papers for a daily research digest.\n\
             Given the TITLE and ABSTRACT (and optional excerpt), assign **relevance scores** in [0,1] to these labels:\n\
             {labels}.\n\
             Interpretation:\n\
             {interpretation}\
             Return STRICT JSON with keys exactly: {{\"scores\": {{label: float}}, \"primary\": \"<one of labels>\"}}.\n\
             No extra text.\n\n\
             TITLE: {title}\n\
             ABSTRACT: {abstract_text}\n\
             EXCERPT: {excerpt}\n",
            labels = self.labels.join(", "),
            interpretation = interpretation,
            title = title_or_placeholder(self.title),
            abstract_text = abstract_or_placeholder(self.abstract_text),
            excerpt = excerpt,
        )
    }
}

// ========== TL;DR ==========

pub struct TldrPrompt<'a> {
    pub title: &'a str,
    pub abstract_text: &'a str,
}

impl StagePrompt for TldrPrompt<'_> {
    const TEMPERATURE: f32 = 0.1;
    const MAX_TOKENS: u32 = 200;

    fn render(&self) -> String {
        format!(
            "Write a crisp **TL;DR** for the paper below in 2 sentences, technical but compact.\n\
             Return plain text only.\n\n\
             TITLE: {}\nABSTRACT: {}\n",
            title_or_placeholder(self.title),
            abstract_or_placeholder(self.abstract_text),
        )
    }
}

// ========== Map: 单页要点 ==========

pub struct PagePrompt<'a> {
    pub page: u32,
    pub text: &'a str,
}

impl StagePrompt for PagePrompt<'_> {
    const TEMPERATURE: f32 = 0.1;
    const MAX_TOKENS: u32 = 900;

    fn render(&self) -> String {
        format!(
            "You are extracting key facts from a research paper PAGE to aid faithful summarization.\n\
             Given PAGE_NUM and PAGE_TEXT, output bullet points. Each bullet MUST cite the page like [p.{page}].\n\
             Focus on: problem, method modules, datasets, metrics, key numbers, limitations. Keep bullets short.\n\
             PAGE_NUM: {page}\n\
             PAGE_TEXT (truncated):\n---\n{text}\n---",
            page = self.page,
            text = take_chars(self.text.trim(), PAGE_CHAR_LIMIT),
        )
    }
}

// ========== Reduce 及基于要点的抽取 ==========

/// 基于要点块的提示词共用的输入
#[derive(Debug, Clone, Copy)]
pub struct BulletContext<'a> {
    pub title: &'a str,
    pub abstract_text: &'a str,
    pub bullets: &'a str,
}

impl BulletContext<'_> {
    fn tail(&self) -> String {
        let bullets = match self.bullets.trim() {
            "" => "(no page bullets; rely on the abstract)",
            b => b,
        };
        format!(
            "TITLE: {}\nABSTRACT: {}\nBULLETS:\n{}",
            title_or_placeholder(self.title),
            abstract_or_placeholder(self.abstract_text),
            bullets
        )
    }
}

pub struct ReducePrompt<'a>(pub BulletContext<'a>);

impl StagePrompt for ReducePrompt<'_> {
    const TEMPERATURE: f32 = 0.2;
    const MAX_TOKENS: u32 = 1200;

    fn render(&self) -> String {
        format!(
            "You are writing a faithful paper digest using page-anchored bullets.\n\
             Using TITLE, ABSTRACT, and BULLETS (each with [p.X] markers), produce:\n\
             1) **Method Card** with fields: Task/Domain, Core Idea (1 sentence), Components/Architecture, \
             Training/Inference Setup (params, context len, tricks), Datasets, Results (numbers with [p.X]), \
             Limitations (with [p.X]), Links (if present).\n\
             2) **Full Summary**: 1 short paragraph, include key numbers with [p.X].\n\
             3) **Discussion Prompts**: exactly 3 thoughtful questions for a research group.\n\
             Return in Markdown with clear headings. Preserve [p.X] citations verbatim.\n\n\
             {}",
            self.0.tail()
        )
    }
}

pub struct ReproPrompt<'a>(pub BulletContext<'a>);

impl StagePrompt for ReproPrompt<'_> {
    const TEMPERATURE: f32 = 0.0;
    const MAX_TOKENS: u32 = 500;

    fn render(&self) -> String {
        format!(
            "Assess REPRODUCIBILITY SIGNALS from TITLE/ABSTRACT and PAGE BULLETS (with [p.X]).\n\
             Return STRICT JSON with keys:\n\
             {{\"code\": {{ \"present\": bool, \"note\": str }}, \
             \"weights\": {{ \"present\": bool, \"note\": str }}, \
             \"data\": {{ \"present\": bool, \"note\": str }}, \
             \"train_details\": {{ \"present\": bool, \"note\": str }}, \
             \"eval_scripts\": {{ \"present\": bool, \"note\": str }}, \
             \"inference_params\": {{ \"present\": bool, \"note\": str }}}}\n\
             Use [p.X] page refs where relevant. If uncertain, set present=false and explain.\n\n\
             {}",
            self.0.tail()
        )
    }
}

pub struct SotaPrompt<'a>(pub BulletContext<'a>);

impl StagePrompt for SotaPrompt<'_> {
    const TEMPERATURE: f32 = 0.0;
    const MAX_TOKENS: u32 = 700;

    fn render(&self) -> String {
        format!(
            "From the paper info below, extract a list of SOTA-style results as JSON array.\n\
             Each item with keys: metric, dataset, value (number), baseline (optional), delta (optional), page (int).\n\
             Only include items where a concrete number is mentioned. If none, return [].\n\n\
             {}",
            self.0.tail()
        )
    }
}

// ========== 翻译 ==========

pub struct TranslatePrompt<'a> {
    pub markdown: &'a str,
    pub source_language: &'a str,
    pub target_language: &'a str,
}

impl StagePrompt for TranslatePrompt<'_> {
    const TEMPERATURE: f32 = 0.0;
    const MAX_TOKENS: u32 = 1400;

    fn render(&self) -> String {
        format!(
            "Translate the following Markdown from {} to {}. Keep code, links, [p.X] citations intact.\n\
             Return only the translated Markdown.\n\n\
             {}",
            self.source_language,
            self.target_language,
            self.markdown.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LABELS;

    fn labels() -> Vec<String> {
        DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_classify_prompt_lists_labels_and_interpretations() {
        let labels = labels();
        let prompt = ClassifyPrompt {
            title: "  Agents that Plan ",
            abstract_text: "A multi-agent planning framework.",
            excerpt: "",
            labels: &labels,
        }
        .render();

        assert!(prompt.contains("Agent, LLM, Memory, RAG, Spatial Learning."));
        assert!(prompt.contains("- RAG: retrieval-augmented generation"));
        assert!(prompt.contains("TITLE: Agents that Plan\n"));
        assert!(prompt.contains("EXCERPT: (none)"));
        assert!(prompt.contains(r#"{"scores": {label: float}, "primary": "<one of labels>"}"#));
    }

    #[test]
    fn test_classify_prompt_custom_label_gets_generic_line() {
        let labels = vec!["Robotics".to_string()];
        let prompt = ClassifyPrompt {
            title: "t",
            abstract_text: "a",
            excerpt: "",
            labels: &labels,
        }
        .render();
        assert!(prompt.contains("- Robotics: papers whose main contribution is about Robotics."));
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let labels = labels();
        let excerpt = "x".repeat(5000);
        let prompt = ClassifyPrompt {
            title: "t",
            abstract_text: "a",
            excerpt: &excerpt,
            labels: &labels,
        }
        .render();
        assert!(prompt.contains(&"x".repeat(EXCERPT_CHAR_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(EXCERPT_CHAR_LIMIT + 1)));
    }

    #[test]
    fn test_empty_fields_use_placeholders() {
        let prompt = TldrPrompt {
            title: "   ",
            abstract_text: "",
        }
        .render();
        assert!(prompt.contains("TITLE: (untitled)"));
        assert!(prompt.contains("ABSTRACT: (no abstract)"));
    }

    #[test]
    fn test_page_prompt_cites_page_and_truncates() {
        let text = "页".repeat(PAGE_CHAR_LIMIT + 10);
        let prompt = PagePrompt { page: 7, text: &text }.render();
        assert!(prompt.contains("[p.7]"));
        assert!(prompt.contains("PAGE_NUM: 7"));
        assert_eq!(prompt.matches('页').count(), PAGE_CHAR_LIMIT);
    }

    #[test]
    fn test_take_chars_respects_char_boundaries() {
        assert_eq!(take_chars("héllo", 2), "hé");
        assert_eq!(take_chars("abc", 10), "abc");
    }

    #[test]
    fn test_bullet_prompts_share_tail() {
        let ctx = BulletContext {
            title: "T",
            abstract_text: "A",
            bullets: "- From page 1:\n- fact [p.1]",
        };
        for rendered in [
            ReducePrompt(ctx).render(),
            ReproPrompt(ctx).render(),
            SotaPrompt(ctx).render(),
        ] {
            assert!(rendered.ends_with("TITLE: T\nABSTRACT: A\nBULLETS:\n- From page 1:\n- fact [p.1]"));
        }
        assert!(ReproPrompt(ctx).render().contains("\"inference_params\""));
        assert!(SotaPrompt(ctx).render().contains("If none, return []."));
    }

    #[test]
    fn test_sampling_parameters() {
        assert_eq!(ClassifyPrompt::TEMPERATURE, 0.0);
        assert_eq!(ClassifyPrompt::MAX_TOKENS, 400);
        assert_eq!(ReducePrompt::TEMPERATURE, 0.2);
        assert_eq!(TranslatePrompt::MAX_TOKENS, 1400);
    }
}
