use std::collections::HashMap;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::models::{Client, Invoice, RecurringInvoice};
use crate::ui::components::popup::{render_delete_confirmation, render_error, render_success};
use crate::ui::step_selection;

// Represents the state of the invoice table screen
pub struct InvoicesState {
    client: Client,
    invoices: Vec<Invoice>,
    schedules: HashMap<i32, RecurringInvoice>,
    currency: String,
    table_state: TableState,
    show_delete_confirmation: bool,
    pub show_error: Option<String>,
    pub show_success: Option<String>,
}

impl InvoicesState {
    pub fn new(
        client: Client,
        invoices: Vec<Invoice>,
        schedules: Vec<RecurringInvoice>,
        currency: impl Into<String>,
    ) -> Self {
        let mut table_state = TableState::default();
        if !invoices.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            client,
            invoices,
            schedules: schedules.into_iter().map(|r| (r.invoice_id, r)).collect(),
            currency: currency.into(),
            table_state,
            show_delete_confirmation: false,
            show_error: None,
            show_success: None,
        }
    }

    pub fn next(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.invoices.len(), true) {
            self.table_state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.invoices.len(), false) {
            self.table_state.select(Some(i));
        }
    }

    pub fn select_invoice(&mut self, id: i32) {
        if let Some(i) = self.invoices.iter().position(|inv| inv.id == id) {
            self.table_state.select(Some(i));
        }
    }

    pub fn selected_invoice(&self) -> Option<&Invoice> {
        self.table_state.selected().and_then(|i| self.invoices.get(i))
    }

    pub fn selected_invoice_id(&self) -> Option<i32> {
        self.selected_invoice().map(|i| i.id)
    }

    pub fn client_id(&self) -> i32 {
        self.client.id
    }

    pub fn schedule_for(&self, invoice_id: i32) -> Option<&RecurringInvoice> {
        self.schedules.get(&invoice_id)
    }

    /// Sum of unpaid invoice totals.
    pub fn outstanding(&self) -> f64 {
        self.invoices.iter().filter(|i| !i.paid).map(|i| i.total).sum()
    }
}

pub enum InvoiceAction {
    Back,
    NewInvoice(i32),
    EditInvoice(i32),
    DeleteInvoice(i32),
    SendInvoice(i32),
    SetPaid(i32, bool),
}

pub fn render_invoices<B: Backend>(frame: &mut Frame<B>, state: &mut InvoicesState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let header_cells = ["Number", "Type", "Issued", "Due", "Total", "Status", "Next run"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells)
        .style(Style::default())
        .height(1)
        .bottom_margin(1);

    let rows = state.invoices.iter().map(|invoice| {
        let status_style = match (invoice.paid, invoice.sent) {
            (true, _) => Style::default().fg(Color::Green),
            (false, true) => Style::default().fg(Color::Cyan),
            (false, false) => Style::default().fg(Color::Gray),
        };
        let next_run = state
            .schedule_for(invoice.id)
            .map(|r| format!("{} ({})", r.next_run.format("%Y-%m-%d"), r.frequency.as_str()))
            .unwrap_or_else(|| "-".to_string());

        Row::new(vec![
            Cell::from(invoice.number()),
            Cell::from(invoice.invoice_type.label()),
            Cell::from(invoice.invoice_date.format("%Y-%m-%d").to_string()),
            Cell::from(invoice.due_date.format("%Y-%m-%d").to_string()),
            Cell::from(format!("{}{:.2}", state.currency, invoice.total)),
            Cell::from(invoice.status_label()).style(status_style),
            Cell::from(next_run),
        ])
        .height(1)
    });

    let title = format!(
        "Invoices for {} - outstanding {}{:.2}",
        state.client.full_name(),
        state.currency,
        state.outstanding()
    );
    let table = Table::new(rows)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(22),
            Constraint::Percentage(10),
            Constraint::Percentage(12),
            Constraint::Percentage(12),
            Constraint::Percentage(12),
            Constraint::Percentage(8),
            Constraint::Percentage(24),
        ]);

    frame.render_stateful_widget(table, chunks[0], &mut state.table_state);

    let buttons_text = if state.selected_invoice().is_some() {
        "<N> New | <E> Edit | <D> Delete | <M> Email | <P> Paid/unpaid | <Esc> Back"
    } else {
        "<N> New Invoice | <Esc> Back"
    };

    let buttons = Paragraph::new(buttons_text)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);

    if state.show_delete_confirmation {
        render_delete_confirmation(frame, "invoice", "Its services and schedule will also be deleted.");
    }
    if let Some(error) = &state.show_error {
        render_error(frame, error);
    } else if let Some(message) = &state.show_success {
        render_success(frame, message);
    }
}

pub fn handle_input(state: &mut InvoicesState) -> Result<Option<InvoiceAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() || state.show_success.take().is_some() {
            return Ok(None);
        }

        if state.show_delete_confirmation {
            state.show_delete_confirmation = false;
            if key.code == KeyCode::Char('y') {
                if let Some(id) = state.selected_invoice_id() {
                    return Ok(Some(InvoiceAction::DeleteInvoice(id)));
                }
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(InvoiceAction::Back));
            }
            KeyCode::Char('n') => {
                return Ok(Some(InvoiceAction::NewInvoice(state.client_id())));
            }
            KeyCode::Char('e') => {
                if let Some(id) = state.selected_invoice_id() {
                    return Ok(Some(InvoiceAction::EditInvoice(id)));
                }
            }
            KeyCode::Char('d') => {
                if state.selected_invoice().is_some() {
                    state.show_delete_confirmation = true;
                }
            }
            KeyCode::Char('m') => {
                if let Some(id) = state.selected_invoice_id() {
                    return Ok(Some(InvoiceAction::SendInvoice(id)));
                }
            }
            KeyCode::Char('p') => {
                if let Some(invoice) = state.selected_invoice() {
                    return Ok(Some(InvoiceAction::SetPaid(invoice.id, !invoice.paid)));
                }
            }
            KeyCode::Down => {
                state.next();
            }
            KeyCode::Up => {
                state.previous();
            }
            _ => {}
        }
    }
    Ok(None)
}
