//! 论文分类
//!
//! 一次模型调用给出每个标签的相关度。模型输出不可信，
//! 解析结果总会被整理成"每个配置标签都有得分、主标签一定合法"的形式。

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::models::LabelScore;
use crate::services::json_extract::extract_json_object;
use crate::services::llm_service::ModelGateway;
use crate::services::prompts::ClassifyPrompt;

/// 分类服务
pub struct Classifier {
    gateway: ModelGateway,
    labels: Vec<String>,
}

impl Classifier {
    pub fn new(gateway: ModelGateway, labels: Vec<String>) -> Self {
        Self { gateway, labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 对单篇论文打分
    ///
    /// 只有网关错误（重试耗尽）会返回 `Err`，模型输出格式错误不会。
    pub async fn classify(
        &self,
        title: &str,
        abstract_text: &str,
        excerpt: &str,
    ) -> Result<LabelScore, LlmError> {
        let prompt = ClassifyPrompt {
            title,
            abstract_text,
            excerpt,
            labels: &self.labels,
        };
        let response = self.gateway.ask(&prompt).await?;
        debug!("分类响应: {}", response.trim());
        Ok(interpret_response(&response, &self.labels))
    }
}

/// 把模型回复整理为标签得分
///
/// - 得分接受数字或数字字符串，并截断到 [0, 1]
/// - 未配置的标签丢弃，缺失的标签记 0.0
/// - 主标签不合法时取最高分标签，平分时取配置顺序靠前的
pub fn interpret_response(response: &str, labels: &[String]) -> LabelScore {
    let data = extract_json_object(response);
    if data.is_none() {
        warn!("分类结果无法解析，全部标签记 0 分");
    }

    let raw_scores = data.as_ref().and_then(|d| d.get("scores"));
    let scores: Vec<(String, f64)> = labels
        .iter()
        .map(|label| {
            let score = raw_scores
                .and_then(|s| s.get(label.as_str()))
                .and_then(coerce_score)
                .unwrap_or(0.0);
            (label.clone(), score)
        })
        .collect();

    let declared = data
        .as_ref()
        .and_then(|d| d.get("primary"))
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|p| labels.iter().any(|l| l == p));

    let primary = match declared {
        Some(p) => p.to_string(),
        None => max_score_label(&scores).unwrap_or_default(),
    };

    LabelScore::new(scores, primary)
}

fn coerce_score(value: &JsonValue) -> Option<f64> {
    let score = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if score.is_nan() {
        return None;
    }
    Some(score.clamp(0.0, 1.0))
}

/// 最高分标签，平分时保留先出现的
fn max_score_label(scores: &[(String, f64)]) -> Option<String> {
    let mut best: Option<&(String, f64)> = None;
    for entry in scores {
        match best {
            Some((_, top)) if entry.1 <= *top => {}
            _ => best = Some(entry),
        }
    }
    best.map(|(label, _)| label.clone())
}
