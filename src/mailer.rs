use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{PoolConfig, authentication::Credentials},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::SmtpSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP is not configured. Set SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and FROM_EMAIL")]
    NotConfigured,
    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// An HTML email with optional file attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            attachments: Vec::new(),
        }
    }

    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer backed by lettre's pooled async SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(creds)
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(Duration::from_secs(30)))
            .build();

        let from_raw = match &settings.from_name {
            Some(name) => format!("{} <{}>", name, settings.from_email),
            None => settings.from_email.clone(),
        };
        let from = parse_mailbox(&from_raw)?;

        Ok(Self { transport, from })
    }

    /// Build a mailer from optional settings, failing when SMTP is unset.
    pub fn from_settings(settings: Option<SmtpSettings>) -> Result<Self, MailError> {
        let settings = settings.ok_or(MailError::NotConfigured)?;
        Self::new(&settings)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Plain-text fallback for clients that do not render HTML.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag.trim_start_matches('/').to_lowercase();
                if name.starts_with("br") || name.starts_with('p') || name.starts_with("div") || name.starts_with("tr") {
                    text.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => text.push(ch),
        }
    }
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines.join("\n")
}

fn build_attachment(path: &Path) -> Result<Option<SinglePart>, MailError> {
    if !path.exists() {
        warn!(path = %path.display(), "attachment missing, skipping");
        return Ok(None);
    }

    let content = std::fs::read(path).map_err(|source| MailError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;

    // Renderer fallbacks produce HTML saved under a .pdf name.
    let mime_type = if content.starts_with(b"%PDF") {
        mime::APPLICATION_PDF
    } else if path.extension().is_some_and(|e| e == "pdf" || e == "html") {
        mime::TEXT_HTML_UTF_8
    } else {
        mime::APPLICATION_OCTET_STREAM
    };
    let content_type = ContentType::parse(mime_type.as_ref())
        .unwrap_or(ContentType::TEXT_PLAIN);

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(Some(Attachment::new(filename).body(content, content_type)))
}

pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, MailError> {
    let to = parse_mailbox(&email.to)?;

    let body = MultiPart::alternative()
        .singlepart(SinglePart::plain(html_to_text(&email.html)))
        .singlepart(SinglePart::html(email.html.clone()));

    let mut mixed = MultiPart::mixed().multipart(body);
    for path in &email.attachments {
        if let Some(part) = build_attachment(path)? {
            mixed = mixed.singlepart(part);
        }
    }

    let message = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(&email.subject)
        .multipart(mixed)?;

    Ok(message)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %email.to, subject = %email.subject, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %email.to, error = %e, "failed to send email");
                Err(MailError::Transport(e))
            }
        }
    }
}

/// Mailer that refuses every message; used when SMTP is not configured so the
/// console still runs and reports the problem on send.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_flattened_to_lines() {
        let text = html_to_text("<div><p>Hello Ada,</p><p>Total: <strong>£10.00</strong></p></div>");
        assert_eq!(text, "Hello Ada,\nTotal: £10.00");
    }

    #[test]
    fn message_includes_existing_attachments_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("1.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

        let from: Mailbox = "Acme <billing@acme.test>".parse().unwrap();
        let email = OutgoingEmail::new("ada@client.test", "Invoice", "<p>Hi</p>")
            .attach(&pdf)
            .attach(dir.path().join("missing.pdf"));

        let message = build_message(&from, &email).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("1.pdf"));
        assert!(!raw.contains("missing.pdf"));
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let from: Mailbox = "billing@acme.test".parse().unwrap();
        let email = OutgoingEmail::new("not-an-address", "Invoice", "<p>Hi</p>");
        assert!(matches!(build_message(&from, &email), Err(MailError::Address { .. })));
    }

    #[test]
    fn missing_settings_fail_fast() {
        assert!(matches!(SmtpMailer::from_settings(None), Err(MailError::NotConfigured)));
    }
}
