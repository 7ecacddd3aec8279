use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use super::{JobContext, JobReport, JobResult};
use crate::models::{Invoice, RecurringInvoice, Service, services_total};

/// Regenerates invoices whose recurrence is due, emails them, and moves each
/// schedule one period forward.
pub struct RecurringInvoiceJob {
    ctx: JobContext,
}

enum Outcome {
    Sent,
    Unsent(String),
}

impl RecurringInvoiceJob {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> JobResult<JobReport> {
        let due = self.ctx.store.due_recurrences(now).await?;
        let mut report = JobReport::default();

        if due.is_empty() {
            return Ok(report);
        }
        info!(count = due.len(), "processing due recurring invoices");

        for recurrence in due {
            report.processed += 1;
            match self.process(&recurrence, now).await {
                Ok(Outcome::Sent) => report.succeeded += 1,
                Ok(Outcome::Unsent(reason)) => report.errors.push(reason),
                Err(e) => {
                    error!(invoice_id = recurrence.invoice_id, error = %e, "recurring invoice failed");
                    report
                        .errors
                        .push(format!("invoice {}: {:#}", recurrence.invoice_id, e));
                }
            }
        }

        Ok(report)
    }

    async fn process(&self, recurrence: &RecurringInvoice, now: DateTime<Utc>) -> Result<Outcome> {
        let store = self.ctx.store.as_ref();
        let (template, services) = store
            .get_invoice_with_services(recurrence.invoice_id)
            .await
            .context("failed to load template invoice")?;

        let (invoice, services) = clone_for_period(&template, &services, now, self.ctx.payment_terms_days);
        let next_run = recurrence.frequency.next_run_after(now);

        let new_id = store
            .clone_recurring_invoice(recurrence, &invoice, &services, now, next_run)
            .await
            .context("failed to clone invoice")?;
        info!(template = recurrence.invoice_id, invoice = new_id, %next_run, "recurring invoice issued");

        // The schedule has already moved on, so a delivery failure only leaves
        // the new invoice unsent for a manual resend.
        match self.ctx.dispatcher().send_invoice(store, new_id).await {
            Ok(()) => Ok(Outcome::Sent),
            Err(e) => {
                warn!(invoice = new_id, error = %e, "recurring invoice created but not sent");
                Ok(Outcome::Unsent(format!("invoice {new_id} created but not sent: {e:#}")))
            }
        }
    }
}

/// Copy a template invoice for a new billing period. Dates restart from
/// `now`, notes and delivery state are cleared, and the total comes from the
/// copied services.
pub fn clone_for_period(
    template: &Invoice,
    services: &[Service],
    now: DateTime<Utc>,
    payment_terms_days: i64,
) -> (Invoice, Vec<Service>) {
    let services: Vec<Service> = services
        .iter()
        .map(|s| Service::new(s.description.clone(), s.price))
        .collect();
    let issue_date = now.date_naive();

    let invoice = Invoice {
        id: 0,
        client_id: template.client_id,
        invoice_type: template.invoice_type,
        invoice_date: issue_date,
        due_date: issue_date + Duration::days(payment_terms_days),
        total: services_total(&services),
        bank: template.bank.clone(),
        notes: None,
        sent: false,
        paid: false,
        pdf_path: None,
        created_at: now,
    };

    (invoice, services)
}
