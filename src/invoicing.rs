//! Invoice operations behind the admin forms: drafting, saving, sending and
//! settling invoices.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::info;

use crate::config::CompanyProfile;
use crate::db::Store;
use crate::invoice_gen::{InvoiceDocument, InvoiceGenerator, escape};
use crate::mailer::{Mailer, OutgoingEmail};
use crate::models::{BankDetails, Client, Invoice, InvoiceType, Service, round_money, services_total};

/// Raw invoice form input.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceForm {
    pub client_id: i32,
    pub invoice_type: InvoiceType,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: String,
    pub services: Vec<(String, f64)>,
    pub recurring: bool,
}

/// Build an unsaved invoice from form input. Rows without a description are
/// dropped and prices are rounded to pennies.
pub fn draft_invoice(form: &InvoiceForm, bank: BankDetails) -> (Invoice, Vec<Service>) {
    let services: Vec<Service> = form
        .services
        .iter()
        .filter(|(description, _)| !description.trim().is_empty())
        .map(|(description, price)| Service::new(description.trim(), round_money(*price)))
        .collect();

    let invoice = Invoice {
        id: 0,
        client_id: form.client_id,
        invoice_type: form.invoice_type,
        invoice_date: form.invoice_date,
        due_date: form.due_date,
        total: services_total(&services),
        bank,
        notes: Some(form.notes.trim().to_string()).filter(|n| !n.is_empty()),
        sent: false,
        paid: false,
        pdf_path: None,
        created_at: Utc::now(),
    };

    (invoice, services)
}

/// Persist an invoice and keep its recurrence row in step with the form.
///
/// Periodic invoices flagged as recurring get a schedule whose first run is
/// one period after the issue date, or one period after the last generated
/// copy when the schedule has run before. Anything else has its schedule
/// paused.
pub async fn save_invoice(
    store: &dyn Store,
    invoice: &Invoice,
    services: &[Service],
    recurring: bool,
) -> Result<i32> {
    if services.is_empty() {
        bail!("an invoice needs at least one service");
    }
    if invoice.due_date < invoice.invoice_date {
        bail!("due date cannot be before the issue date");
    }

    let invoice_id = store
        .save_invoice_with_services(invoice, services)
        .await
        .context("failed to save invoice")?;

    let current = store.get_recurrence(invoice_id).await?;
    match invoice.invoice_type.recurrence().filter(|_| recurring) {
        Some(frequency) => {
            // Re-saving an already scheduled invoice keeps its place in the cycle.
            if current.as_ref().is_some_and(|r| r.active && r.frequency == frequency) {
                return Ok(invoice_id);
            }
            let issued_at = invoice.invoice_date.and_time(NaiveTime::MIN).and_utc();
            let next_run = frequency.first_run(issued_at, current.and_then(|r| r.last_run));
            store.upsert_recurrence(invoice_id, frequency, next_run).await?;
            info!(invoice_id, frequency = frequency.as_str(), %next_run, "invoice scheduled to recur");
        }
        None => {
            if current.is_some_and(|r| r.active) {
                store.pause_recurrence(invoice_id).await?;
                info!(invoice_id, "invoice schedule paused");
            }
        }
    }

    Ok(invoice_id)
}

pub fn invoice_subject(invoice: &Invoice, total: f64, currency: &str) -> String {
    format!("Invoice {} - {}{:.2}", invoice.number(), currency, total)
}

pub fn invoice_email_body(
    invoice: &Invoice,
    client: &Client,
    total: f64,
    company: &CompanyProfile,
    currency: &str,
) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif">
<p>Hello {name},</p>
<p>Please find attached your invoice. Total due: <strong>{currency}{total:.2}</strong> by {due}.</p>
<p>Account: <strong>{account}</strong><br/>
Sort code: <strong>{sort}</strong> &bull; Account no: <strong>{number}</strong><br/>
IBAN: <strong>{iban}</strong></p>
<p>Thanks,<br/>{company}</p>
</div>"#,
        name = escape(&client.name),
        due = invoice.due_date.format("%d %b %Y"),
        account = escape(&invoice.bank.account_name),
        sort = escape(&invoice.bank.sort_code),
        number = escape(&invoice.bank.account_number),
        iban = escape(invoice.bank.iban.as_deref().unwrap_or("-")),
        company = escape(&company.name),
    )
}

/// Rendering and delivery settings shared by manual sends and the scheduler.
pub struct Dispatcher<'a> {
    pub generator: &'a InvoiceGenerator,
    pub mailer: &'a dyn Mailer,
    pub company: &'a CompanyProfile,
    pub currency: &'a str,
}

impl Dispatcher<'_> {
    /// Render the invoice PDF, email it to the client and mark it sent.
    /// The invoice stays unsent when delivery fails.
    pub async fn send_invoice(&self, store: &dyn Store, invoice_id: i32) -> Result<()> {
        let (invoice, services) = store.get_invoice_with_services(invoice_id).await?;
        let client = store.get_client(invoice.client_id).await?;
        let total = services_total(&services);

        let pdf_path = self.generator.generate_invoice(&InvoiceDocument {
            invoice: &invoice,
            client: &client,
            services: &services,
            company: self.company,
            currency: self.currency,
        })?;

        let email = OutgoingEmail::new(
            client.email.clone(),
            invoice_subject(&invoice, total, self.currency),
            invoice_email_body(&invoice, &client, total, self.company, self.currency),
        )
        .attach(&pdf_path);

        self.mailer
            .send(&email)
            .await
            .with_context(|| format!("failed to email invoice {} to {}", invoice.number(), client.email))?;

        store
            .mark_invoice_sent(invoice.id, &pdf_path.to_string_lossy())
            .await?;

        info!(invoice = %invoice.number(), to = %client.email, "invoice sent");
        Ok(())
    }
}

pub async fn mark_paid(store: &dyn Store, invoice_id: i32, paid: bool) -> Result<()> {
    store.set_invoice_paid(invoice_id, paid).await?;
    info!(invoice_id, paid, "invoice payment state changed");
    Ok(())
}
