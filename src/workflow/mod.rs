pub mod analysis_flow;
pub mod paper_ctx;

pub use analysis_flow::{AnalysisFlow, AnalysisOptions, BilingualOptions};
pub use paper_ctx::PaperCtx;
