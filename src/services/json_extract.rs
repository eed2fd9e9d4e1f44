//! 结构化输出提取
//!
//! 模型不一定遵守"只返回 JSON"的要求，这里从夹杂说明文字的回复中
//! 找出 JSON 片段并解析。
//!
//! 两阶段：
//! 1. 定位候选片段（逐个起始分隔符做配对扫描，最后退回"第一个起始到最后一个结束"）
//! 2. 严格解析，失败后去掉 `}` / `]` 前的多余逗号再解析一次
//!
//! 全部失败时返回 `None`，调用方按"没有结构化数据"处理。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

/// 提取第一个 JSON 对象
pub fn extract_json_object(text: &str) -> Option<JsonValue> {
    extract_delimited(text, '{', '}').filter(JsonValue::is_object)
}

/// 提取第一个 JSON 数组
pub fn extract_json_array(text: &str) -> Option<JsonValue> {
    extract_delimited(text, '[', ']').filter(JsonValue::is_array)
}

/// 提取第一个 JSON 对象或数组（以先出现的起始分隔符为准）
pub fn extract_json(text: &str) -> Option<JsonValue> {
    let object_at = text.find('{');
    let array_at = text.find('[');
    match (object_at, array_at) {
        (Some(o), Some(a)) if a < o => extract_json_array(text).or_else(|| extract_json_object(text)),
        (Some(_), _) => extract_json_object(text).or_else(|| extract_json_array(text)),
        (None, Some(_)) => extract_json_array(text),
        (None, None) => None,
    }
}

fn extract_delimited(text: &str, open: char, close: char) -> Option<JsonValue> {
    for (start, _) in text.match_indices(open) {
        if let Some(end) = balanced_end(text, start, open, close) {
            if let Some(value) = parse_with_repair(&text[start..end]) {
                return Some(value);
            }
        }
    }

    // 配对失败（例如字符串里的引号没闭合）时退回贪婪匹配
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    let value = parse_with_repair(&text[start..=end]);
    if value.is_none() {
        debug!("未能从模型输出中解析 JSON（{} 字符）", text.len());
    }
    value
}

/// 从 `start` 处的起始分隔符开始配对，返回结束分隔符之后的字节位置
fn balanced_end(text: &str, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_with_repair(candidate: &str) -> Option<JsonValue> {
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }
    let repaired = remove_trailing_commas(candidate);
    serde_json::from_str(&repaired).ok()
}

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));

/// 去掉 `}` / `]` 前的多余逗号
fn remove_trailing_commas(candidate: &str) -> String {
    TRAILING_COMMA.replace_all(candidate, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_object_unchanged() {
        let value = extract_json_object(r#"{"scores": {"Agent": 0.9}, "primary": "Agent"}"#);
        assert_eq!(value, Some(json!({"scores": {"Agent": 0.9}, "primary": "Agent"})));
    }

    #[test]
    fn test_object_surrounded_by_prose() {
        let text = "Sure! Here is the JSON:\n```json\n{\"primary\": \"RAG\"}\n```\nHope this helps.";
        assert_eq!(extract_json_object(text), Some(json!({"primary": "RAG"})));
    }

    #[test]
    fn test_trailing_comma_before_brace() {
        let text = r#"{"code": {"present": true, "note": "github",}, }"#;
        assert_eq!(
            extract_json_object(text),
            Some(json!({"code": {"present": true, "note": "github"}}))
        );
    }

    #[test]
    fn test_trailing_comma_before_bracket() {
        let text = r#"Results: [{"metric": "acc", "value": 85.3}, ]"#;
        assert_eq!(
            extract_json_array(text),
            Some(json!([{"metric": "acc", "value": 85.3}]))
        );
    }

    #[test]
    fn test_no_json_is_none() {
        assert_eq!(extract_json_object("I cannot answer that."), None);
        assert_eq!(extract_json_array("no numbers here"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_braces_inside_strings_do_not_break_span() {
        let text = r#"note {"note": "uses {curly} braces", "present": false} trailing }"#;
        assert_eq!(
            extract_json_object(text),
            Some(json!({"note": "uses {curly} braces", "present": false}))
        );
    }

    #[test]
    fn test_array_skips_citation_brackets() {
        let text = "As shown in [p.3], the results are:\n[{\"metric\": \"F1\", \"value\": 71.2, \"page\": 3}]";
        assert_eq!(
            extract_json_array(text),
            Some(json!([{"metric": "F1", "value": 71.2, "page": 3}]))
        );
    }

    #[test]
    fn test_empty_array() {
        assert_eq!(extract_json_array("[]"), Some(json!([])));
    }

    #[test]
    fn test_extract_json_picks_first_shape() {
        assert_eq!(extract_json("[1, 2]"), Some(json!([1, 2])));
        assert_eq!(extract_json(r#"{"a": [1]}"#), Some(json!({"a": [1]})));
    }

    #[test]
    fn test_object_variant_rejects_bare_array() {
        assert_eq!(extract_json_object("[1, 2, 3]"), None);
    }

    #[test]
    fn test_trailing_comma_repair_spans_whitespace_and_nesting() {
        assert_eq!(
            remove_trailing_commas("{\"a\": [1, 2,\n ],\n}"),
            "{\"a\": [1, 2]}"
        );
        assert_eq!(remove_trailing_commas("[{\"x\": 1,}, ]"), "[{\"x\": 1}]");
    }
}
