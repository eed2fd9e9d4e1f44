use serde::Serialize;

use super::paper::Paper;

/// 单篇论文的标签得分
///
/// 始终包含全部配置标签（按配置顺序），缺失的标签得分为 0.0；
/// `primary` 一定是配置标签之一。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    scores: Vec<(String, f64)>,
    primary: String,
}

impl LabelScore {
    pub(crate) fn new(scores: Vec<(String, f64)>, primary: String) -> Self {
        Self { scores, primary }
    }

    /// 指定标签的得分，未配置的标签返回 0.0
    pub fn get(&self, label: &str) -> f64 {
        self.scores
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, score)| *score)
            .unwrap_or(0.0)
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// 按配置顺序遍历 (标签, 得分)
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// 已分类的论文
#[derive(Debug, Clone)]
pub struct ClassifiedPaper {
    pub paper: Paper,
    pub scores: LabelScore,
}

/// SOTA 风格的结果条目，只收录给出了具体数值的条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SotaItem {
    pub metric: String,
    pub dataset: String,
    pub value: f64,
    pub baseline: Option<String>,
    pub delta: Option<String>,
    pub page: Option<u32>,
}

/// 可复现性检查项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproKey {
    Code,
    Weights,
    Data,
    TrainDetails,
    EvalScripts,
    InferenceParams,
}

impl ReproKey {
    /// 固定顺序的全部检查项
    pub const ALL: [ReproKey; 6] = [
        ReproKey::Code,
        ReproKey::Weights,
        ReproKey::Data,
        ReproKey::TrainDetails,
        ReproKey::EvalScripts,
        ReproKey::InferenceParams,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReproKey::Code => "code",
            ReproKey::Weights => "weights",
            ReproKey::Data => "data",
            ReproKey::TrainDetails => "train_details",
            ReproKey::EvalScripts => "eval_scripts",
            ReproKey::InferenceParams => "inference_params",
        }
    }
}

/// 单个检查项的信号
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproSignal {
    pub key: ReproKey,
    pub present: bool,
    pub note: String,
}

/// 可复现性清单
///
/// 为空表示"未知"（未生成或模型输出无法解析）；
/// 非空时六个检查项齐全且按 `ReproKey::ALL` 排序。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReproChecklist {
    pub signals: Vec<ReproSignal>,
}

impl ReproChecklist {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, key: ReproKey) -> Option<&ReproSignal> {
        self.signals.iter().find(|s| s.key == key)
    }
}

/// 单篇论文的分析结果
///
/// 英文片段总是存在；双语片段仅在启用翻译且翻译成功时存在。
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub tldr: String,
    pub digest_md: String,
    pub repro: ReproChecklist,
    pub sota: Vec<SotaItem>,
    pub english_md: String,
    pub bilingual_md: Option<String>,
    /// 降级的可选步骤数（仅用于统计）
    #[serde(skip)]
    pub degraded_steps: usize,
}
