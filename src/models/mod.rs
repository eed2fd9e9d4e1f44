pub mod analysis;
pub mod paper;

pub use analysis::{
    AnalysisResult, ClassifiedPaper, LabelScore, ReproChecklist, ReproKey, ReproSignal, SotaItem,
};
pub use paper::{citation_marker, PageFact, PageText, Paper};
