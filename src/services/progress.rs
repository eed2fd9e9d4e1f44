//! 运行进度上报 - 业务能力层
//!
//! 进度记录每次整体覆盖写入，供外部监控轮询；
//! 写入失败只记录警告，不影响运行。

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, warn};

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Fetching,
    Fetched,
    Classifying,
    Summarizing,
    Email,
    Done,
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgressStage::Fetching => "fetching",
            ProgressStage::Fetched => "fetched",
            ProgressStage::Classifying => "classifying",
            ProgressStage::Summarizing => "summarizing",
            ProgressStage::Email => "email",
            ProgressStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// 一条进度记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub current: Option<usize>,
    pub total: Option<usize>,
    pub note: String,
    pub ts: String,
}

impl ProgressUpdate {
    pub fn new(
        stage: ProgressStage,
        current: Option<usize>,
        total: Option<usize>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            current,
            total,
            note: note.into(),
            ts: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// 带计数的进度
    pub fn counted(stage: ProgressStage, current: usize, total: usize, note: impl Into<String>) -> Self {
        Self::new(stage, Some(current), Some(total), note)
    }
}

/// 进度接收方
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// 丢弃所有进度
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

/// 覆盖写入 JSON 文件
pub struct JsonFileProgress {
    path: PathBuf,
}

impl JsonFileProgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProgressSink for JsonFileProgress {
    fn report(&self, update: &ProgressUpdate) {
        debug!(
            "进度: {} {:?}/{:?} {}",
            update.stage, update.current, update.total, update.note
        );

        let payload = match serde_json::to_string_pretty(update) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("进度序列化失败: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, payload) {
            warn!("进度写入失败 {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    #[test]
    fn test_file_is_overwritten_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_status.json");
        let sink = JsonFileProgress::new(&path);

        sink.report(&ProgressUpdate::counted(ProgressStage::Classifying, 1, 3, "2501.00001"));
        sink.report(&ProgressUpdate::new(ProgressStage::Done, None, None, "completed"));

        let content = std::fs::read_to_string(&path).unwrap();
        let value: JsonValue = serde_json::from_str(&content).unwrap();
        assert_eq!(value["stage"], "done");
        assert!(value["current"].is_null());
        assert!(value["total"].is_null());
        assert_eq!(value["note"], "completed");
        assert_eq!(value["ts"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileProgress::new(dir.path().join("missing").join("status.json"));
        sink.report(&ProgressUpdate::counted(ProgressStage::Fetching, 0, 0, "querying arXiv"));
    }

    #[test]
    fn test_stage_serialization() {
        let update = ProgressUpdate::counted(ProgressStage::Summarizing, 2, 10, "x");
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["stage"], "summarizing");
        assert_eq!(value["current"], 2);
        assert_eq!(ProgressStage::Email.to_string(), "email");
    }
}
