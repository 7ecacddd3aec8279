use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use crate::config::CompanyProfile;
use crate::models::{Client, Invoice, Service, services_total};

/// Everything printed on one invoice document.
pub struct InvoiceDocument<'a> {
    pub invoice: &'a Invoice,
    pub client: &'a Client,
    pub services: &'a [Service],
    pub company: &'a CompanyProfile,
    pub currency: &'a str,
}

/// Service for generating invoice files in HTML and PDF format
pub struct InvoiceGenerator {
    output_dir: PathBuf,
}

impl InvoiceGenerator {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let path = output_dir.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("failed to create invoice directory {}", path.display()))?;
        }

        Ok(Self {
            output_dir: path.to_path_buf(),
        })
    }

    /// Write `<id>.html` and convert it to `<id>.pdf` with pandoc when
    /// available. Returns the PDF path.
    pub fn generate_invoice(&self, doc: &InvoiceDocument<'_>) -> Result<PathBuf> {
        let html = render_html(doc);

        let html_path = self.output_dir.join(format!("{}.html", doc.invoice.id));
        let pdf_path = self.output_dir.join(format!("{}.pdf", doc.invoice.id));

        let mut file = File::create(&html_path)
            .with_context(|| format!("failed to create {}", html_path.display()))?;
        file.write_all(html.as_bytes())?;

        let pdf_result = Command::new("pandoc")
            .arg(&html_path)
            .arg("-o")
            .arg(&pdf_path)
            .output();

        match pdf_result {
            Ok(output) if output.status.success() => {
                info!(invoice = doc.invoice.id, path = %pdf_path.display(), "rendered invoice PDF");
            }
            Ok(output) => {
                let error = String::from_utf8_lossy(&output.stderr);
                warn!(invoice = doc.invoice.id, %error, "pandoc failed, attaching HTML copy");
                fs::copy(&html_path, &pdf_path)?;
            }
            Err(e) => {
                warn!(invoice = doc.invoice.id, error = %e, "could not run pandoc, attaching HTML copy");
                fs::copy(&html_path, &pdf_path)?;
            }
        }

        Ok(pdf_path)
    }
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the invoice as a self-contained HTML page.
pub fn render_html(doc: &InvoiceDocument<'_>) -> String {
    let InvoiceDocument {
        invoice,
        client,
        services,
        company,
        currency,
    } = doc;
    let total = services_total(services);
    let mut content = String::new();

    content.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    content.push_str(&format!("<title>Invoice {}</title>\n", invoice.number()));
    content.push_str("<style>body { font-family: Arial, sans-serif; } td, th { padding: 4px 8px; }</style>\n");
    content.push_str("</head>\n<body>\n");

    content.push_str("<hr style=\"height: 5px; background-color: #343876; border: none;\">\n");

    if let Some(logo) = &invoice.bank.logo_path {
        content.push_str(&format!("<img src=\"{}\" alt=\"logo\" style=\"max-height: 60px;\">\n", escape(logo)));
    }

    // Company header
    content.push_str(&format!("<h1>{}</h1>\n", escape(&company.name)));
    for line in [&company.email, &company.site, &company.phone] {
        if !line.is_empty() {
            content.push_str(&format!("{}<br>\n", escape(line)));
        }
    }

    content.push_str("<h1>Invoice</h1>\n");
    content.push_str(&format!(
        "<p><strong>Invoice #</strong> {}<br>\n<strong>Issued</strong> {}<br>\n<strong>Due</strong> {}</p>\n",
        invoice.number(),
        invoice.invoice_date.format("%d %b %Y"),
        invoice.due_date.format("%d %b %Y"),
    ));

    content.push_str("<div style=\"display: flex; justify-content: space-between;\">\n");

    content.push_str("<div style=\"width: 50%;\">\n<strong>Invoice for</strong><br>\n");
    content.push_str(&format!("{}<br>\n", escape(&client.full_name())));
    if let Some(address) = &client.address {
        content.push_str(&format!("{}<br>\n", escape(address)));
    }
    content.push_str(&format!("{}\n</div>\n", escape(&client.email)));

    content.push_str("<div style=\"width: 50%;\">\n<strong>Payable to</strong><br>\n");
    content.push_str(&format!("{}<br>\n", escape(&invoice.bank.account_name)));
    content.push_str(&format!("Sort code: {}<br>\n", escape(&invoice.bank.sort_code)));
    content.push_str(&format!("Account no: {}<br>\n", escape(&invoice.bank.account_number)));
    if let Some(iban) = &invoice.bank.iban {
        content.push_str(&format!("IBAN: {}<br>\n", escape(iban)));
    }
    content.push_str("</div>\n</div>\n<hr>\n");

    content.push_str("<table style=\"width: 100%; border-collapse: collapse;\">\n");
    content.push_str("<tr>\n<th style=\"text-align: left;\">Description</th>\n<th style=\"text-align: right;\">Price</th>\n</tr>\n");

    for service in services.iter() {
        content.push_str("<tr>\n");
        content.push_str(&format!("<td style=\"text-align: left;\">{}</td>\n", escape(&service.description)));
        content.push_str(&format!("<td style=\"text-align: right;\">{}{:.2}</td>\n", currency, service.price));
        content.push_str("</tr>\n");
    }

    content.push_str("<tr>\n<td style=\"text-align: right;\">Total</td>\n");
    content.push_str(&format!(
        "<td style=\"text-align: right; font-weight: bold; color: #e83e8c;\"><h2>{}{:.2}</h2></td>\n",
        currency, total
    ));
    content.push_str("</tr>\n</table>\n");

    if let Some(notes) = invoice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        content.push_str(&format!("<p><strong>Notes</strong><br>\n{}</p>\n", escape(notes)));
    }

    content.push_str("</body>\n</html>\n");

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankDetails, InvoiceType};
    use chrono::{NaiveDate, Utc};

    fn fixture() -> (Invoice, Client, Vec<Service>, CompanyProfile) {
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let invoice = Invoice {
            id: 7,
            client_id: 3,
            invoice_type: InvoiceType::Monthly,
            invoice_date: date,
            due_date: date + chrono::Duration::days(14),
            total: 999.0,
            bank: BankDetails {
                account_name: "Acme Studio Ltd".into(),
                sort_code: "12-34-56".into(),
                account_number: "12345678".into(),
                iban: Some("GB00ACME".into()),
                logo_path: None,
            },
            notes: Some("Thanks <3".into()),
            sent: false,
            paid: false,
            pdf_path: None,
            created_at: Utc::now(),
        };
        let mut client = Client::blank();
        client.id = 3;
        client.name = "Ada".into();
        client.surname = "Lovelace".into();
        client.email = "ada@client.test".into();
        let services = vec![Service::new("Hosting", 20.0), Service::new("Support & care", 30.5)];
        let company = CompanyProfile {
            name: "Acme Studio".into(),
            email: "hello@acme.test".into(),
            ..Default::default()
        };
        (invoice, client, services, company)
    }

    #[test]
    fn html_lists_services_and_recomputed_total() {
        let (invoice, client, services, company) = fixture();
        let html = render_html(&InvoiceDocument {
            invoice: &invoice,
            client: &client,
            services: &services,
            company: &company,
            currency: "£",
        });

        assert!(html.contains("INV-20260401-000007"));
        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains("Support &amp; care"));
        assert!(html.contains("£50.50"));
        assert!(!html.contains("999"));
        assert!(html.contains("IBAN: GB00ACME"));
        assert!(html.contains("Thanks &lt;3"));
    }

    #[test]
    fn generate_always_leaves_a_pdf_path() {
        let dir = tempfile::tempdir().unwrap();
        let generator = InvoiceGenerator::new(dir.path().join("out")).unwrap();
        let (invoice, client, services, company) = fixture();

        let pdf = generator
            .generate_invoice(&InvoiceDocument {
                invoice: &invoice,
                client: &client,
                services: &services,
                company: &company,
                currency: "£",
            })
            .unwrap();

        assert_eq!(pdf, dir.path().join("out").join("7.pdf"));
        assert!(pdf.exists());
        assert!(dir.path().join("out").join("7.html").exists());
    }
}
