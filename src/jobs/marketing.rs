use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::{JobContext, JobReport, JobResult};
use crate::mailer::OutgoingEmail;
use crate::marketing::message_html;
use crate::models::ScheduledMessage;

/// Resends messages attached to a repeat rule once their interval elapses.
pub struct MarketingJob {
    ctx: JobContext,
}

impl MarketingJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> JobResult<JobReport> {
        let scheduled = self.ctx.store.list_scheduled_messages().await?;
        let mut report = JobReport::default();

        for ScheduledMessage { rule, message } in scheduled {
            if !rule.interval.is_due(message.sent_at, now) {
                debug!(rule = rule.id, interval = rule.interval.as_str(), "repeat rule not due");
                continue;
            }
            report.processed += 1;

            let email = OutgoingEmail::new(
                message.recipient.clone(),
                message.subject.clone(),
                message_html(&message.content),
            );

            if let Err(e) = self.ctx.mailer.send(&email).await {
                error!(rule = rule.id, to = %message.recipient, error = %e, "marketing resend failed");
                report.errors.push(format!("message {} to {}: {}", message.id, message.recipient, e));
                continue;
            }

            match self.ctx.store.stamp_message_sent(message.id, now).await {
                Ok(()) => {
                    info!(rule = rule.id, to = %message.recipient, "marketing message resent");
                    report.succeeded += 1;
                }
                Err(e) => report.errors.push(format!("message {}: {:#}", message.id, e)),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::db::memory::MemoryStore;
    use crate::jobs::testing::harness;
    use crate::models::{Message, RepeatInterval};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 8, 9, 0, 0).unwrap()
    }

    async fn schedule(
        store: &MemoryStore,
        recipient: &str,
        interval: RepeatInterval,
        sent_at: Option<DateTime<Utc>>,
    ) -> i32 {
        let message = Message {
            id: 0,
            client_id: None,
            sender: "billing@acme.test".into(),
            recipient: recipient.into(),
            subject: "What's new at Acme".into(),
            content: "Hi Grace,\nNew things.".into(),
            sent_at,
            created_at: now() - Duration::days(60),
        };
        let id = store.create_message(&message).await.unwrap();
        store.create_repeat_rule(id, interval).await.unwrap();
        id
    }

    async fn sent_at(store: &MemoryStore, id: i32) -> Option<DateTime<Utc>> {
        store
            .messages()
            .into_iter()
            .find(|m| m.id == id)
            .and_then(|m| m.sent_at)
    }

    #[tokio::test]
    async fn due_rules_are_resent_and_stamped() {
        let h = harness();
        let daily = schedule(&h.store, "a@client.test", RepeatInterval::Daily, Some(now() - Duration::days(1))).await;
        let weekly = schedule(&h.store, "b@client.test", RepeatInterval::Weekly, Some(now() - Duration::days(2))).await;

        let report = MarketingJob::new(h.ctx.clone()).run(now()).await.unwrap();

        assert_eq!(report, JobReport { processed: 1, succeeded: 1, errors: vec![] });
        assert_eq!(sent_at(&h.store, daily).await, Some(now()));
        assert_eq!(sent_at(&h.store, weekly).await, Some(now() - Duration::days(2)));

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@client.test");
        assert!(sent[0].html.contains("white-space:pre-wrap"));
    }

    #[tokio::test]
    async fn never_sent_message_goes_out() {
        let h = harness();
        let id = schedule(&h.store, "a@client.test", RepeatInterval::Monthly, None).await;

        let report = MarketingJob::new(h.ctx.clone()).run(now()).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(sent_at(&h.store, id).await, Some(now()));
    }

    #[tokio::test]
    async fn failed_send_keeps_old_timestamp() {
        let h = harness();
        let last = now() - Duration::days(1);
        let id = schedule(&h.store, "bounce@client.test", RepeatInterval::Daily, Some(last)).await;
        schedule(&h.store, "ok@client.test", RepeatInterval::Daily, Some(last)).await;
        h.mailer.reject("bounce@client.test");

        let report = MarketingJob::new(h.ctx.clone()).run(now()).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(sent_at(&h.store, id).await, Some(last));
    }
}
