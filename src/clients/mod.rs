pub mod arxiv_client;
pub mod llm_client;
pub mod mail_client;

pub use arxiv_client::{ArxivSource, PaperSource, SearchQuery, SubmissionWindow};
pub use llm_client::{build_backend, ChatBackend, ChatMessage, ChatRequest, Provider, Role};
pub use mail_client::{Envelope, SmtpMailer};
