//! SMTP 邮件客户端 - 基础设施层
//!
//! 端口 465 使用隐式 TLS，其他端口使用 STARTTLS。
//! 附件读取失败只记录警告，不影响发送。

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::error::DeliveryError;

/// 邮件内容
#[derive(Debug, Clone)]
pub struct Envelope {
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<PathBuf>,
}

/// SMTP 邮件发送器
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// 发送邮件
    pub async fn send(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let message = self.build_message(envelope).await?;
        let transport = self.build_transport()?;

        transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        info!("✉️ 邮件已发送至 {} 个收件人", self.config.to_addrs.len());
        Ok(())
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = if self.config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
        }
        .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build())
    }

    async fn build_message(&self, envelope: &Envelope) -> Result<Message, DeliveryError> {
        let from: Mailbox = parse_mailbox(&self.config.from_addr)?;
        let mut builder = Message::builder().from(from).subject(envelope.subject.clone());
        for addr in &self.config.to_addrs {
            builder = builder.to(parse_mailbox(addr)?);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(envelope.html_body.clone()));
        for path in &envelope.attachments {
            match attachment_part(path).await {
                Ok(part) => body = body.singlepart(part),
                Err(e) => warn!("附件添加失败 {}: {}", path.display(), e),
            }
        }

        builder
            .multipart(body)
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, DeliveryError> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::Address(format!("{}: {}", addr, e)))
}

async fn attachment_part(path: &Path) -> Result<SinglePart, std::io::Error> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Attachment::new(filename).body(bytes, content_type_for(path)))
}

fn content_type_for(path: &Path) -> ContentType {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("md") => "text/markdown; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}
