//! 可复现性清单与 SOTA 结果抽取
//!
//! 两个可选的确定性（temperature 0）抽取步骤，输入都是同一份要点块。
//! 模型输出无法解析时退化为空值，由格式化函数渲染为占位文本。

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::models::{ReproChecklist, ReproKey, ReproSignal, SotaItem};
use crate::services::json_extract::{extract_json, extract_json_object};
use crate::services::llm_service::ModelGateway;
use crate::services::prompts::{BulletContext, ReproPrompt, SotaPrompt};
use crate::services::report::md_escape;

/// SOTA 列表为空时的占位文本
pub const NO_SOTA_PLACEHOLDER: &str = "_No explicit SOTA-style numbers extracted._";

/// 可复现性未知时的占位文本
pub const REPRO_UNKNOWN_PLACEHOLDER: &str = "_Reproducibility signals: unknown._";

/// 结果抽取服务
pub struct ResultsExtractor {
    gateway: ModelGateway,
}

impl ResultsExtractor {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    /// 可复现性清单
    pub async fn repro(&self, ctx: BulletContext<'_>) -> Result<ReproChecklist, LlmError> {
        let response = self.gateway.ask(&ReproPrompt(ctx)).await?;
        debug!("可复现性响应: {}", response.trim());
        Ok(interpret_repro(&response))
    }

    /// SOTA 风格的数值结果
    pub async fn sota(&self, ctx: BulletContext<'_>) -> Result<Vec<SotaItem>, LlmError> {
        let response = self.gateway.ask(&SotaPrompt(ctx)).await?;
        debug!("SOTA 响应: {}", response.trim());
        Ok(interpret_sota(&response))
    }
}

// ========== 可复现性 ==========

/// 解析可复现性回复
///
/// 无法解析或得到空对象时返回"未知"；否则六项齐全，缺失项记为不存在、备注为空。
pub fn interpret_repro(response: &str) -> ReproChecklist {
    let data = match extract_json_object(response) {
        Some(JsonValue::Object(map)) if !map.is_empty() => map,
        _ => {
            warn!("可复现性结果无法解析，记为未知");
            return ReproChecklist::unknown();
        }
    };

    let signals = ReproKey::ALL
        .iter()
        .map(|key| repro_signal(*key, &data))
        .collect();
    ReproChecklist { signals }
}

fn repro_signal(key: ReproKey, data: &Map<String, JsonValue>) -> ReproSignal {
    let item = data.get(key.as_str());
    let (present, note) = match item {
        Some(JsonValue::Object(fields)) => (
            fields.get("present").map(coerce_bool).unwrap_or(false),
            fields
                .get("note")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        ),
        Some(other) => (coerce_bool(other), String::new()),
        None => (false, String::new()),
    };
    ReproSignal { key, present, note }
}

fn coerce_bool(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y"),
        JsonValue::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

/// 渲染可复现性清单
pub fn format_repro_checklist(checklist: &ReproChecklist) -> String {
    if checklist.is_unknown() {
        return REPRO_UNKNOWN_PLACEHOLDER.to_string();
    }
    checklist
        .signals
        .iter()
        .map(|signal| {
            let mark = if signal.present { "✅" } else { "❌" };
            format!("- {}: {} — {}", signal.key.as_str(), mark, signal.note)
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ========== SOTA ==========

/// 解析 SOTA 回复
///
/// 只接受数组；没有数值的条目丢弃。
pub fn interpret_sota(response: &str) -> Vec<SotaItem> {
    match extract_json(response) {
        Some(JsonValue::Array(items)) => items.iter().filter_map(sota_item).collect(),
        Some(_) => {
            warn!("SOTA 结果不是数组，忽略");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn sota_item(value: &JsonValue) -> Option<SotaItem> {
    let fields = value.as_object()?;
    let number = fields.get("value").and_then(coerce_number)?;

    Some(SotaItem {
        metric: optional_text(fields.get("metric")).unwrap_or_default(),
        dataset: optional_text(fields.get("dataset")).unwrap_or_default(),
        value: number,
        baseline: optional_text(fields.get("baseline")),
        delta: optional_text(fields.get("delta")),
        page: fields.get("page").and_then(coerce_page),
    })
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn coerce_page(value: &JsonValue) -> Option<u32> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        JsonValue::String(s) => s
            .trim()
            .trim_start_matches("p.")
            .trim()
            .parse()
            .ok(),
        _ => None,
    }
}

fn optional_text(value: Option<&JsonValue>) -> Option<String> {
    let text = match value? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// 渲染 SOTA 表格，空列表渲染为占位文本
pub fn format_sota_table(items: &[SotaItem]) -> String {
    if items.is_empty() {
        return NO_SOTA_PLACEHOLDER.to_string();
    }

    let mut lines = vec![
        "|Metric|Dataset|Value|Baseline|Delta|Page|".to_string(),
        "|---|---|---|---|---|---|".to_string(),
    ];
    for item in items {
        lines.push(format!(
            "|{}|{}|{}|{}|{}|{}|",
            md_escape(&item.metric),
            md_escape(&item.dataset),
            item.value,
            md_escape(item.baseline.as_deref().unwrap_or_default()),
            md_escape(item.delta.as_deref().unwrap_or_default()),
            item.page.map(|p| p.to_string()).unwrap_or_default(),
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::llm_service::testing::{gateway, ScriptedBackend};

    const FULL_REPRO: &str = r#"{
        "code": {"present": true, "note": "github.com/x/y [p.1]"},
        "weights": {"present": false, "note": "not released"},
        "data": {"present": true, "note": "public benchmarks"},
        "train_details": {"present": true, "note": "lr 3e-4 [p.5]"},
        "eval_scripts": {"present": false, "note": ""},
        "inference_params": {"present": "yes", "note": "T=0.7"}
    }"#;

    #[test]
    fn test_full_repro_response() {
        let checklist = interpret_repro(FULL_REPRO);
        assert_eq!(checklist.signals.len(), 6);
        assert!(checklist.get(ReproKey::Code).unwrap().present);
        assert!(!checklist.get(ReproKey::Weights).unwrap().present);
        assert!(checklist.get(ReproKey::InferenceParams).unwrap().present);
        assert_eq!(checklist.get(ReproKey::TrainDetails).unwrap().note, "lr 3e-4 [p.5]");
    }

    #[test]
    fn test_missing_data_key_renders_cross_with_blank_note() {
        let response = r#"{"code": {"present": true, "note": "repo"},
            "weights": {"present": true, "note": "hf"},
            "train_details": {"present": true, "note": "appendix"},
            "eval_scripts": {"present": false, "note": "none"},
            "inference_params": {"present": true, "note": "greedy"}}"#;
        let checklist = interpret_repro(response);

        let data = checklist.get(ReproKey::Data).unwrap();
        assert!(!data.present);
        assert_eq!(data.note, "");

        let rendered = format_repro_checklist(&checklist);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[2], "- data: ❌ —");
        assert_eq!(lines[0], "- code: ✅ — repo");
        assert!(lines[5].starts_with("- inference_params:"));
    }

    #[test]
    fn test_unparseable_repro_is_unknown() {
        for response in ["no idea", "{}", "[true, false]"] {
            let checklist = interpret_repro(response);
            assert!(checklist.is_unknown());
            assert_eq!(format_repro_checklist(&checklist), REPRO_UNKNOWN_PLACEHOLDER);
        }
    }

    #[test]
    fn test_repro_trailing_comma_repaired() {
        let checklist = interpret_repro(r#"{"code": {"present": true, "note": "x",},}"#);
        assert!(!checklist.is_unknown());
        assert!(checklist.get(ReproKey::Code).unwrap().present);
        assert!(!checklist.get(ReproKey::Weights).unwrap().present);
    }

    #[test]
    fn test_empty_sota_renders_placeholder() {
        let items = interpret_sota("[]");
        assert!(items.is_empty());
        assert_eq!(format_sota_table(&items), NO_SOTA_PLACEHOLDER);
    }

    #[test]
    fn test_sota_items_parsed_and_filtered() {
        let response = r#"Here you go:
        [
          {"metric": "Success Rate", "dataset": "ALFWorld", "value": 91.5, "baseline": "ReAct 78.0", "delta": "+13.5", "page": 6},
          {"metric": "EM", "dataset": "HotpotQA", "value": "45.2%", "page": "p.7"},
          {"metric": "qualitative", "dataset": "n/a", "value": "better"},
        ]"#;
        let items = interpret_sota(response);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value, 91.5);
        assert_eq!(items[0].baseline.as_deref(), Some("ReAct 78.0"));
        assert_eq!(items[0].page, Some(6));
        assert_eq!(items[1].value, 45.2);
        assert_eq!(items[1].baseline, None);
        assert_eq!(items[1].page, Some(7));
    }

    #[test]
    fn test_non_array_sota_is_empty() {
        assert!(interpret_sota(r#"{"metric": "acc", "value": 1}"#).is_empty());
        assert!(interpret_sota("none reported").is_empty());
    }

    #[test]
    fn test_sota_table_layout() {
        let items = vec![SotaItem {
            metric: "Acc|Top1".into(),
            dataset: "ImageNet".into(),
            value: 88.0,
            baseline: None,
            delta: Some("+1.2".into()),
            page: Some(4),
        }];
        assert_eq!(
            format_sota_table(&items),
            "|Metric|Dataset|Value|Baseline|Delta|Page|\n|---|---|---|---|---|---|\n|Acc\\|Top1|ImageNet|88||+1.2|4|"
        );
    }

    #[tokio::test]
    async fn test_extractor_uses_deterministic_sampling() {
        let backend = Arc::new(
            ScriptedBackend::new("[]").on("REPRODUCIBILITY SIGNALS", FULL_REPRO),
        );
        let extractor = ResultsExtractor::new(gateway(backend.clone()));
        let ctx = BulletContext {
            title: "T",
            abstract_text: "A",
            bullets: "- From page 1:\n- x [p.1]",
        };

        let checklist = extractor.repro(ctx).await.unwrap();
        let sota = extractor.sota(ctx).await.unwrap();

        assert_eq!(checklist.signals.len(), 6);
        assert!(sota.is_empty());
        let calls = backend.calls();
        assert_eq!((calls[0].temperature, calls[0].max_tokens), (0.0, 500));
        assert_eq!((calls[1].temperature, calls[1].max_tokens), (0.0, 700));
    }

    #[tokio::test]
    async fn test_repeated_repro_runs_are_identical() {
        let backend = Arc::new(ScriptedBackend::new(FULL_REPRO));
        let extractor = ResultsExtractor::new(gateway(backend.clone()));
        let ctx = BulletContext {
            title: "T",
            abstract_text: "A",
            bullets: "- From page 1:\n- code released [p.1]",
        };

        let first = extractor.repro(ctx).await.unwrap();
        let second = extractor.repro(ctx).await.unwrap();

        assert_eq!(first, second);
        let flags = |c: &ReproChecklist| c.signals.iter().map(|s| s.present).collect::<Vec<_>>();
        assert_eq!(flags(&first), vec![true, false, true, true, false, true]);
        assert_eq!(flags(&first), flags(&second));

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }
}
