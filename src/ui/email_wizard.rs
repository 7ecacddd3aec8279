use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::config::CompanyProfile;
use crate::invoicing::{invoice_email_body, invoice_subject};
use crate::mailer::html_to_text;
use crate::models::{Client, Invoice, Service, services_total};
use crate::ui::components::popup::render_error;

// Preview of the invoice email before it is rendered and sent
pub struct EmailWizardState {
    invoice: Invoice,
    recipient: String,
    subject: String,
    body: String,
    lines: Vec<String>,
    pub show_error: Option<String>,
}

pub enum EmailWizardAction {
    Cancel,
    Send(i32),
}

impl EmailWizardState {
    pub fn new(
        invoice: Invoice,
        services: &[Service],
        client: &Client,
        company: &CompanyProfile,
        currency: &str,
    ) -> Self {
        let total = services_total(services);
        let subject = invoice_subject(&invoice, total, currency);
        let body = html_to_text(&invoice_email_body(&invoice, client, total, company, currency));
        let lines = services
            .iter()
            .map(|s| format!("{} - {}{:.2}", s.description, currency, s.price))
            .collect();

        Self {
            invoice,
            recipient: client.email.clone(),
            subject,
            body,
            lines,
            show_error: None,
        }
    }

    pub fn invoice_id(&self) -> i32 {
        self.invoice.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    fn validate(&self) -> Result<(), String> {
        if self.recipient.trim().is_empty() || !self.recipient.contains('@') {
            return Err(format!("Client has no valid email address: '{}'", self.recipient));
        }
        if self.lines.is_empty() {
            return Err("Invoice has no services to bill".into());
        }
        Ok(())
    }
}

pub fn render_email_wizard<B: Backend>(frame: &mut Frame<B>, state: &mut EmailWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3), // Title
                Constraint::Length(4), // Envelope
                Constraint::Min(6),    // Body
                Constraint::Length(3), // Help
            ]
            .as_ref(),
        )
        .split(frame.size());

    let mut title_text = format!("Send invoice {}", state.invoice.number());
    if state.invoice.sent {
        title_text.push_str(" (already sent once)");
    }
    let title = Paragraph::new(title_text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    let label = Style::default().fg(Color::Yellow);
    let envelope = Paragraph::new(vec![
        Spans::from(vec![
            Span::styled("To: ", label),
            Span::styled(state.recipient.clone(), Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Spans::from(vec![Span::styled("Subject: ", label), Span::raw(state.subject.clone())]),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(envelope, chunks[1]);

    let mut body: Vec<Spans> = state.body.lines().map(|l| Spans::from(l.to_string())).collect();
    body.push(Spans::from(""));
    body.push(Spans::from(Span::styled("Attached PDF lists:", label)));
    body.extend(state.lines.iter().map(|l| Spans::from(format!("  {l}"))));

    let preview = Paragraph::new(body)
        .block(Block::default().title("Message").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, chunks[2]);

    let help = Paragraph::new("Enter - Generate PDF and send | Esc - Cancel")
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, chunks[3]);

    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut EmailWizardState) -> Result<Option<EmailWizardAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() {
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => return Ok(Some(EmailWizardAction::Cancel)),
            KeyCode::Enter => match state.validate() {
                Ok(()) => return Ok(Some(EmailWizardAction::Send(state.invoice_id()))),
                Err(e) => state.show_error = Some(e),
            },
            _ => {}
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankDetails, InvoiceType};
    use chrono::{NaiveDate, Utc};

    fn state_for(email: &str, services: &[Service]) -> EmailWizardState {
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let invoice = Invoice {
            id: 12,
            client_id: 1,
            invoice_type: InvoiceType::OneTime,
            invoice_date: date,
            due_date: date,
            total: services_total(services),
            bank: BankDetails::default(),
            notes: None,
            sent: false,
            paid: false,
            pdf_path: None,
            created_at: Utc::now(),
        };
        let mut client = Client::blank();
        client.name = "Ada".into();
        client.email = email.into();
        let company = CompanyProfile {
            name: "Acme Studio".into(),
            ..Default::default()
        };
        EmailWizardState::new(invoice, services, &client, &company, "£")
    }

    #[test]
    fn preview_uses_invoice_subject_and_total() {
        let state = state_for("ada@client.test", &[Service::new("Hosting", 12.5), Service::new("Domain", 7.5)]);
        assert!(state.subject.ends_with("£20.00"));
        assert_eq!(state.recipient(), "ada@client.test");
        assert!(state.body.contains("Hello Ada"));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn refuses_clients_without_an_address() {
        let state = state_for("", &[Service::new("Hosting", 1.0)]);
        assert!(state.validate().is_err());
    }
}
