use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::db::Store;
use crate::invoice_gen::escape;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::models::{Client, Message, RepeatInterval};

/// A canned marketing message. `{name}` and `{company}` are substituted on send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub subject: &'static str,
    pub content: &'static str,
}

pub const TEMPLATES: [MessageTemplate; 2] = [
    MessageTemplate {
        id: "invoice_reminder",
        name: "Invoice Reminder",
        subject: "Reminder: Invoice due",
        content: "Hi {name},\nJust a friendly reminder your invoice is due.\nThanks,\n{company}",
    },
    MessageTemplate {
        id: "promo",
        name: "New Services",
        subject: "What's new at {company}",
        content: "Hi {name},\nWe've launched new services that might help you.\nCheers,\n{company}",
    },
];

pub fn fill_placeholders(text: &str, client: &Client, company: &str) -> String {
    text.replace("{name}", &client.name).replace("{company}", company)
}

/// Wrap plain message text so line breaks survive HTML mail clients.
pub fn message_html(content: &str) -> String {
    format!("<pre style='font-family:inherit;white-space:pre-wrap'>{}</pre>", escape(content))
}

/// A message composed by the operator for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub subject: String,
    pub content: String,
    pub repeat: Option<RepeatInterval>,
}

impl Campaign {
    pub fn from_template(template: &MessageTemplate) -> Self {
        Self {
            subject: template.subject.to_string(),
            content: template.content.to_string(),
            repeat: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketingOutcome {
    pub message_id: i32,
    pub rule_id: Option<i32>,
    /// Delivery error, if the immediate send failed.
    pub error: Option<String>,
}

impl MarketingOutcome {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Send a campaign to a client now, record it, and schedule repeats when an
/// interval was chosen. Delivery failures are reported in the outcome rather
/// than returned as errors.
pub async fn send_marketing(
    store: &dyn Store,
    mailer: &dyn Mailer,
    client: &Client,
    campaign: &Campaign,
    sender: &str,
    company: &str,
    now: DateTime<Utc>,
) -> Result<MarketingOutcome> {
    let subject = fill_placeholders(&campaign.subject, client, company);
    let content = fill_placeholders(&campaign.content, client, company);

    let email = OutgoingEmail::new(client.email.clone(), subject.clone(), message_html(&content));
    let error = match mailer.send(&email).await {
        Ok(()) => None,
        Err(e) => {
            error!(client = client.id, to = %client.email, error = %e, "marketing email failed");
            Some(e.to_string())
        }
    };

    let message = Message {
        id: 0,
        client_id: Some(client.id),
        sender: sender.to_string(),
        recipient: client.email.clone(),
        subject,
        content,
        sent_at: error.is_none().then_some(now),
        created_at: now,
    };
    let message_id = store.create_message(&message).await?;

    let rule_id = match campaign.repeat {
        Some(interval) => Some(store.create_repeat_rule(message_id, interval).await?),
        None => None,
    };

    info!(message_id, ?rule_id, delivered = error.is_none(), "marketing message recorded");

    Ok(MarketingOutcome {
        message_id,
        rule_id,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::mailer::testing::RecordingMailer;

    fn client() -> Client {
        let mut client = Client::blank();
        client.id = 4;
        client.name = "Grace".into();
        client.email = "grace@client.test".into();
        client
    }

    #[test]
    fn placeholders_are_substituted() {
        let text = fill_placeholders(TEMPLATES[1].subject, &client(), "Acme");
        assert_eq!(text, "What's new at Acme");
        let body = fill_placeholders(TEMPLATES[0].content, &client(), "Acme");
        assert!(body.starts_with("Hi Grace,"));
        assert!(body.ends_with("Acme"));
    }

    #[test]
    fn html_body_keeps_text_escaped() {
        assert_eq!(
            message_html("a < b"),
            "<pre style='font-family:inherit;white-space:pre-wrap'>a &lt; b</pre>"
        );
    }

    #[tokio::test]
    async fn send_records_message_and_repeat_rule() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let mut campaign = Campaign::from_template(&TEMPLATES[0]);
        campaign.repeat = Some(RepeatInterval::Weekly);
        let now = Utc::now();

        let outcome = send_marketing(&store, &mailer, &client(), &campaign, "billing@acme.test", "Acme", now)
            .await
            .unwrap();

        assert!(outcome.delivered());
        assert_eq!(mailer.sent().len(), 1);
        let messages = store.messages();
        assert_eq!(messages[0].sent_at, Some(now));
        assert_eq!(messages[0].recipient, "grace@client.test");
        let scheduled = store.list_scheduled_messages().await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].rule.interval, RepeatInterval::Weekly);
        assert_eq!(Some(scheduled[0].rule.id), outcome.rule_id);
    }

    #[tokio::test]
    async fn failed_send_is_reported_not_raised() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        mailer.reject("grace@client.test");
        let campaign = Campaign::from_template(&TEMPLATES[1]);

        let outcome = send_marketing(&store, &mailer, &client(), &campaign, "billing@acme.test", "Acme", Utc::now())
            .await
            .unwrap();

        assert!(!outcome.delivered());
        assert!(outcome.rule_id.is_none());
        assert_eq!(store.messages()[0].sent_at, None);
    }
}
