pub mod classifier;
pub mod docx_export;
pub mod extractors;
pub mod json_extract;
pub mod llm_service;
pub mod progress;
pub mod prompts;
pub mod ranking;
pub mod report;
pub mod summarizer;
pub mod translator;

pub use classifier::Classifier;
pub use extractors::ResultsExtractor;
pub use llm_service::ModelGateway;
pub use progress::{JsonFileProgress, NoopProgress, ProgressSink, ProgressStage, ProgressUpdate};
pub use ranking::{Bucket, BucketEntry};
pub use report::{ReportBuilder, ReportHeader};
pub use summarizer::{DigestReducer, PageSummarizer};
pub use translator::Translator;
