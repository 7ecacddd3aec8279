//! In-memory `Store` used by unit tests.

use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Store;
use crate::models::{
    Client, Frequency, Invoice, Message, RecurringInvoice, RepeatInterval, RepeatRule,
    ScheduledMessage, Service, services_total,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    clients: Vec<Client>,
    invoices: Vec<Invoice>,
    services: Vec<Service>,
    recurring: Vec<RecurringInvoice>,
    messages: Vec<Message>,
    rules: Vec<RepeatRule>,
}

impl Tables {
    fn id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn put_services(&mut self, invoice_id: i32, services: &[Service]) {
        self.services.retain(|s| s.invoice_id != invoice_id);
        for (position, service) in services.iter().enumerate() {
            let id = self.id();
            self.services.push(Service {
                id,
                invoice_id,
                position: position as i32,
                description: service.description.clone(),
                price: service.price,
            });
        }
    }

    fn put_invoice(&mut self, invoice: &Invoice, services: &[Service]) -> i32 {
        let id = self.id();
        self.invoices.push(Invoice {
            id,
            total: services_total(services),
            ..invoice.clone()
        });
        self.put_services(id, services);
        id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Invoice ids whose clone attempt should fail.
    pub fail_clone_for: Mutex<Vec<i32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        f(&mut tables)
    }

    /// Every recorded message, including one-offs without a repeat rule.
    pub fn messages(&self) -> Vec<Message> {
        self.with(|t| t.messages.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_clients(&self) -> Result<Vec<Client>> {
        Ok(self.with(|t| t.clients.clone()))
    }

    async fn get_client(&self, id: i32) -> Result<Client> {
        self.with(|t| t.clients.iter().find(|c| c.id == id).cloned())
            .ok_or_else(|| anyhow!("client {id} not found"))
    }

    async fn create_client(&self, client: &Client) -> Result<i32> {
        Ok(self.with(|t| {
            let id = t.id();
            t.clients.push(Client { id, ..client.clone() });
            id
        }))
    }

    async fn update_client(&self, client: &Client) -> Result<()> {
        self.with(|t| {
            let existing = t
                .clients
                .iter_mut()
                .find(|c| c.id == client.id)
                .ok_or_else(|| anyhow!("client {} not found", client.id))?;
            *existing = client.clone();
            Ok(())
        })
    }

    async fn delete_client(&self, id: i32) -> Result<()> {
        self.with(|t| {
            let invoice_ids: Vec<i32> = t
                .invoices
                .iter()
                .filter(|i| i.client_id == id)
                .map(|i| i.id)
                .collect();
            t.recurring.retain(|r| !invoice_ids.contains(&r.invoice_id));
            t.services.retain(|s| !invoice_ids.contains(&s.invoice_id));
            t.invoices.retain(|i| i.client_id != id);
            for message in t.messages.iter_mut().filter(|m| m.client_id == Some(id)) {
                message.client_id = None;
            }
            t.clients.retain(|c| c.id != id);
        });
        Ok(())
    }

    async fn list_invoices(&self, client_id: Option<i32>) -> Result<Vec<Invoice>> {
        Ok(self.with(|t| {
            t.invoices
                .iter()
                .filter(|i| client_id.is_none_or(|c| i.client_id == c))
                .cloned()
                .collect()
        }))
    }

    async fn get_invoice(&self, id: i32) -> Result<Invoice> {
        self.with(|t| t.invoices.iter().find(|i| i.id == id).cloned())
            .ok_or_else(|| anyhow!("invoice {id} not found"))
    }

    async fn get_services(&self, invoice_id: i32) -> Result<Vec<Service>> {
        Ok(self.with(|t| {
            let mut services: Vec<Service> = t
                .services
                .iter()
                .filter(|s| s.invoice_id == invoice_id)
                .cloned()
                .collect();
            services.sort_by_key(|s| (s.position, s.id));
            services
        }))
    }

    async fn save_invoice_with_services(&self, invoice: &Invoice, services: &[Service]) -> Result<i32> {
        self.with(|t| {
            if invoice.id == 0 {
                return Ok(t.put_invoice(invoice, services));
            }
            let existing = t
                .invoices
                .iter_mut()
                .find(|i| i.id == invoice.id)
                .ok_or_else(|| anyhow!("invoice {} not found", invoice.id))?;
            existing.client_id = invoice.client_id;
            existing.invoice_type = invoice.invoice_type;
            existing.invoice_date = invoice.invoice_date;
            existing.due_date = invoice.due_date;
            existing.notes = invoice.notes.clone();
            existing.total = services_total(services);
            t.put_services(invoice.id, services);
            Ok(invoice.id)
        })
    }

    async fn delete_invoice(&self, id: i32) -> Result<()> {
        self.with(|t| {
            t.recurring.retain(|r| r.invoice_id != id);
            t.services.retain(|s| s.invoice_id != id);
            t.invoices.retain(|i| i.id != id);
        });
        Ok(())
    }

    async fn mark_invoice_sent(&self, id: i32, pdf_path: &str) -> Result<()> {
        self.with(|t| {
            let invoice = t
                .invoices
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| anyhow!("invoice {id} not found"))?;
            invoice.sent = true;
            invoice.pdf_path = Some(pdf_path.to_string());
            Ok(())
        })
    }

    async fn set_invoice_paid(&self, id: i32, paid: bool) -> Result<()> {
        self.with(|t| {
            let invoice = t
                .invoices
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| anyhow!("invoice {id} not found"))?;
            invoice.paid = paid;
            Ok(())
        })
    }

    async fn upsert_recurrence(&self, invoice_id: i32, frequency: Frequency, next_run: DateTime<Utc>) -> Result<i32> {
        Ok(self.with(|t| {
            if let Some(existing) = t.recurring.iter_mut().find(|r| r.invoice_id == invoice_id) {
                existing.frequency = frequency;
                existing.next_run = next_run;
                existing.active = true;
                return existing.id;
            }
            let id = t.id();
            t.recurring.push(RecurringInvoice {
                id,
                invoice_id,
                frequency,
                next_run,
                last_run: None,
                active: true,
            });
            id
        }))
    }

    async fn get_recurrence(&self, invoice_id: i32) -> Result<Option<RecurringInvoice>> {
        Ok(self.with(|t| t.recurring.iter().find(|r| r.invoice_id == invoice_id).cloned()))
    }

    async fn list_recurrences(&self) -> Result<Vec<RecurringInvoice>> {
        Ok(self.with(|t| t.recurring.iter().filter(|r| r.active).cloned().collect()))
    }

    async fn pause_recurrence(&self, invoice_id: i32) -> Result<()> {
        self.with(|t| {
            for recurring in t.recurring.iter_mut().filter(|r| r.invoice_id == invoice_id) {
                recurring.active = false;
            }
        });
        Ok(())
    }

    async fn due_recurrences(&self, now: DateTime<Utc>) -> Result<Vec<RecurringInvoice>> {
        Ok(self.with(|t| {
            let mut due: Vec<RecurringInvoice> =
                t.recurring.iter().filter(|r| r.active && r.next_run <= now).cloned().collect();
            due.sort_by_key(|r| r.next_run);
            due
        }))
    }

    async fn clone_recurring_invoice(
        &self,
        recurring: &RecurringInvoice,
        invoice: &Invoice,
        services: &[Service],
        run_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i32> {
        if self
            .fail_clone_for
            .lock()
            .expect("memory store poisoned")
            .contains(&recurring.invoice_id)
        {
            return Err(anyhow!("simulated failure cloning invoice {}", recurring.invoice_id));
        }
        self.with(|t| {
            let id = t.put_invoice(invoice, services);
            let template = t
                .recurring
                .iter_mut()
                .find(|r| r.id == recurring.id)
                .ok_or_else(|| anyhow!("recurrence {} not found", recurring.id))?;
            template.next_run = next_run;
            template.last_run = Some(run_at);
            Ok(id)
        })
    }

    async fn create_message(&self, message: &Message) -> Result<i32> {
        Ok(self.with(|t| {
            let id = t.id();
            t.messages.push(Message { id, ..message.clone() });
            id
        }))
    }

    async fn create_repeat_rule(&self, message_id: i32, interval: RepeatInterval) -> Result<i32> {
        Ok(self.with(|t| {
            let id = t.id();
            t.rules.push(RepeatRule {
                id,
                message_id,
                interval,
            });
            id
        }))
    }

    async fn list_scheduled_messages(&self) -> Result<Vec<ScheduledMessage>> {
        Ok(self.with(|t| {
            t.rules
                .iter()
                .filter_map(|rule| {
                    t.messages
                        .iter()
                        .find(|m| m.id == rule.message_id)
                        .map(|message| ScheduledMessage {
                            rule: rule.clone(),
                            message: message.clone(),
                        })
                })
                .collect()
        }))
    }

    async fn delete_repeat_rule(&self, id: i32) -> Result<()> {
        self.with(|t| t.rules.retain(|r| r.id != id));
        Ok(())
    }

    async fn stamp_message_sent(&self, message_id: i32, sent_at: DateTime<Utc>) -> Result<()> {
        self.with(|t| {
            let message = t
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| anyhow!("message {message_id} not found"))?;
            message.sent_at = Some(sent_at);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn updates_to_missing_rows_are_errors() {
        let store = MemoryStore::new();
        let mut client = Client::blank();
        client.id = 404;

        let err = store.update_client(&client).await.unwrap_err();
        assert_eq!(err.to_string(), "client 404 not found");
        let err = store.mark_invoice_sent(404, "invoice.pdf").await.unwrap_err();
        assert_eq!(err.to_string(), "invoice 404 not found");
        let err = store.set_invoice_paid(404, true).await.unwrap_err();
        assert_eq!(err.to_string(), "invoice 404 not found");
        let err = store.stamp_message_sent(404, Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "message 404 not found");
    }

    #[tokio::test]
    async fn paused_schedules_are_hidden_but_keep_their_history() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        store.upsert_recurrence(7, Frequency::Monthly, last).await.unwrap();
        store.with(|t| t.recurring[0].last_run = Some(last));

        store.pause_recurrence(7).await.unwrap();
        assert!(store.due_recurrences(now).await.unwrap().is_empty());
        assert!(store.list_recurrences().await.unwrap().is_empty());
        let paused = store.get_recurrence(7).await.unwrap().unwrap();
        assert!(!paused.active);
        assert_eq!(paused.last_run, Some(last));

        store.upsert_recurrence(7, Frequency::Monthly, now).await.unwrap();
        let resumed = store.get_recurrence(7).await.unwrap().unwrap();
        assert!(resumed.active);
        assert_eq!(resumed.last_run, Some(last));
        assert_eq!(store.due_recurrences(now).await.unwrap().len(), 1);
    }
}
