use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::invoicing::InvoiceForm;
use crate::models::{Invoice, InvoiceType, Service, round_money};
use crate::ui::components::date_input::{render_date_field, DateInputState};
use crate::ui::components::popup::render_error;
use crate::ui::step_selection;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InvoiceField {
    Type,
    Recurring,
    InvoiceDate,
    DueDate,
    Notes,
    Services,
}

impl InvoiceField {
    const ALL: [InvoiceField; 6] = [
        InvoiceField::Type,
        InvoiceField::Recurring,
        InvoiceField::InvoiceDate,
        InvoiceField::DueDate,
        InvoiceField::Notes,
        InvoiceField::Services,
    ];
}

// Which column of a service row is being typed into
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ServiceField {
    Description,
    Price,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRow {
    pub description: String,
    pub price: f64,
}

pub struct InvoiceWizardState {
    client_id: i32,
    invoice_id: Option<i32>,
    currency: String,
    invoice_type: InvoiceType,
    recurring: bool,
    notes: String,
    services: Vec<ServiceRow>,
    current_field: InvoiceField,
    services_list_state: ListState,
    editing_service: Option<(usize, ServiceField, String)>,
    editing: bool,
    invoice_date_state: DateInputState,
    due_date_state: DateInputState,
    pub show_error: Option<String>,
}

impl InvoiceWizardState {
    pub fn new(client_id: i32, payment_terms_days: i64, currency: impl Into<String>) -> Self {
        let today = Utc::now().date_naive();
        Self {
            client_id,
            invoice_id: None,
            currency: currency.into(),
            invoice_type: InvoiceType::OneTime,
            recurring: false,
            notes: String::new(),
            services: Vec::new(),
            current_field: InvoiceField::Type,
            services_list_state: ListState::default(),
            editing_service: None,
            editing: false,
            invoice_date_state: DateInputState::new(today),
            due_date_state: DateInputState::new(today + Duration::days(payment_terms_days)),
            show_error: None,
        }
    }

    pub fn from_existing(
        invoice: &Invoice,
        services: &[Service],
        recurring: bool,
        currency: impl Into<String>,
    ) -> Self {
        let mut state = Self::new(invoice.client_id, 0, currency);
        state.invoice_id = Some(invoice.id);
        state.invoice_type = invoice.invoice_type;
        state.recurring = recurring;
        state.notes = invoice.notes.clone().unwrap_or_default();
        state.invoice_date_state = DateInputState::new(invoice.invoice_date);
        state.due_date_state = DateInputState::new(invoice.due_date);
        state.services = services
            .iter()
            .map(|s| ServiceRow {
                description: s.description.clone(),
                price: s.price,
            })
            .collect();
        if !state.services.is_empty() {
            state.services_list_state.select(Some(0));
        }
        state
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date_state.date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date_state.date
    }

    pub fn total(&self) -> f64 {
        round_money(self.services.iter().map(|s| s.price).sum())
    }

    fn field_index(&self) -> usize {
        InvoiceField::ALL
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0)
    }

    pub fn next_field(&mut self) {
        self.current_field = InvoiceField::ALL[(self.field_index() + 1) % InvoiceField::ALL.len()];
    }

    pub fn previous_field(&mut self) {
        let len = InvoiceField::ALL.len();
        self.current_field = InvoiceField::ALL[(self.field_index() + len - 1) % len];
    }

    /// Enter on a field outside edit mode.
    pub fn activate(&mut self) {
        match self.current_field {
            InvoiceField::Type => {
                self.invoice_type = self.invoice_type.next();
                if self.invoice_type.recurrence().is_none() {
                    self.recurring = false;
                }
            }
            InvoiceField::Recurring => {
                if self.invoice_type.recurrence().is_some() {
                    self.recurring = !self.recurring;
                } else {
                    self.show_error = Some("Only monthly or annual invoices can recur".into());
                }
            }
            InvoiceField::InvoiceDate => {
                self.invoice_date_state.start_editing();
                self.editing = true;
            }
            InvoiceField::DueDate => {
                self.due_date_state.start_editing();
                self.editing = true;
            }
            InvoiceField::Notes | InvoiceField::Services => self.editing = true,
        }
    }

    pub fn stop_editing(&mut self) {
        self.editing = false;
        self.editing_service = None;
        self.invoice_date_state.stop_editing();
        self.due_date_state.stop_editing();
    }

    pub fn add_service(&mut self) {
        self.services.push(ServiceRow {
            description: String::new(),
            price: 0.0,
        });
        let idx = self.services.len() - 1;
        self.services_list_state.select(Some(idx));
        self.editing_service = Some((idx, ServiceField::Description, String::new()));
    }

    pub fn edit_service(&mut self) {
        if let Some(selected) = self.services_list_state.selected() {
            if let Some(row) = self.services.get(selected) {
                self.editing_service = Some((selected, ServiceField::Description, row.description.clone()));
            }
        }
    }

    pub fn delete_service(&mut self) {
        if let Some(selected) = self.services_list_state.selected() {
            if selected < self.services.len() {
                self.services.remove(selected);
                let next = if self.services.is_empty() {
                    None
                } else {
                    Some(selected.min(self.services.len() - 1))
                };
                self.services_list_state.select(next);
                self.editing_service = None;
            }
        }
    }

    /// Commit the value being typed and move to the next column, or finish
    /// the row after the price.
    pub fn advance_service_field(&mut self) {
        let Some((idx, field, value)) = self.editing_service.clone() else {
            return;
        };
        if idx >= self.services.len() {
            self.editing_service = None;
            return;
        }

        match field {
            ServiceField::Description => {
                self.services[idx].description = value;
                let price = if self.services[idx].price == 0.0 {
                    String::new()
                } else {
                    format!("{:.2}", self.services[idx].price)
                };
                self.editing_service = Some((idx, ServiceField::Price, price));
            }
            ServiceField::Price => match value.trim().parse::<f64>() {
                Ok(price) if price >= 0.0 => {
                    self.services[idx].price = round_money(price);
                    self.editing_service = None;
                }
                _ => {
                    self.show_error = Some("Invalid price. Please enter a number.".to_string());
                }
            },
        }
    }

    pub fn edit_current_field(&mut self, key: KeyCode) {
        if !self.editing {
            return;
        }

        match self.current_field {
            InvoiceField::InvoiceDate => self.invoice_date_state.handle_input(key),
            InvoiceField::DueDate => self.due_date_state.handle_input(key),
            InvoiceField::Notes => match key {
                KeyCode::Char(c) => self.notes.push(c),
                KeyCode::Backspace => {
                    self.notes.pop();
                }
                _ => {}
            },
            InvoiceField::Services => {
                if let Some((_, field, value)) = &mut self.editing_service {
                    match key {
                        KeyCode::Char(c) if *field == ServiceField::Description => value.push(c),
                        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => value.push(c),
                        KeyCode::Backspace => {
                            value.pop();
                        }
                        _ => {}
                    }
                }
            }
            InvoiceField::Type | InvoiceField::Recurring => {}
        }
    }

    fn move_service_selection(&mut self, forward: bool) {
        let next = step_selection(self.services_list_state.selected(), self.services.len(), forward);
        self.services_list_state.select(next);
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.services.iter().any(|s| !s.description.trim().is_empty()) {
            return Err("Add at least one service with a description".into());
        }
        if self.due_date() < self.invoice_date() {
            return Err("Due date cannot be before the invoice date".into());
        }
        Ok(())
    }

    pub fn to_form(&self) -> InvoiceForm {
        InvoiceForm {
            client_id: self.client_id,
            invoice_type: self.invoice_type,
            invoice_date: self.invoice_date(),
            due_date: self.due_date(),
            notes: self.notes.clone(),
            services: self
                .services
                .iter()
                .map(|s| (s.description.clone(), s.price))
                .collect(),
            recurring: self.recurring,
        }
    }
}

pub enum InvoiceWizardAction {
    Cancel,
    Save(Option<i32>, InvoiceForm),
}

pub fn render_invoice_wizard<B: Backend>(frame: &mut Frame<B>, state: &mut InvoiceWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),  // Title
                Constraint::Min(10),    // Form
                Constraint::Length(3),  // Help
            ]
            .as_ref(),
        )
        .split(frame.size());

    let title_text = match state.invoice_id {
        Some(id) => format!("Edit Invoice #{id}"),
        None => "New Invoice".to_string(),
    };

    let title = Paragraph::new(title_text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    render_form(frame, state, chunks[1]);

    let help_text = match (state.editing, state.current_field) {
        (false, InvoiceField::Type | InvoiceField::Recurring) => "Enter - Change | Up/Down - Navigate | S - Save invoice | Esc - Cancel",
        (false, _) => "Enter - Edit field | Up/Down - Navigate | S - Save invoice | Esc - Cancel",
        (true, InvoiceField::InvoiceDate | InvoiceField::DueDate) =>
            "Digits - Fill date | Left/Right - Switch date part | Enter/Esc - Done",
        (true, InvoiceField::Services) => {
            if state.editing_service.is_some() {
                "Enter/Tab - Next column | Esc - Stop editing"
            } else {
                "A - Add service | E - Edit selected | D - Delete selected | Enter/Esc - Done"
            }
        }
        (true, _) => "Enter - Save field | Esc - Stop editing",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, chunks[2]);

    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

fn field_style(state: &InvoiceWizardState, field: InvoiceField) -> Style {
    if state.current_field == field {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_form<B: Backend>(frame: &mut Frame<B>, state: &mut InvoiceWizardState, area: Rect) {
    let form_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),  // Type + recurring
                Constraint::Length(3),  // Invoice date
                Constraint::Length(3),  // Due date
                Constraint::Length(3),  // Notes
                Constraint::Min(6),     // Services
            ]
            .as_ref(),
        )
        .split(area);

    let recurring_value = match (state.invoice_type.recurrence(), state.recurring) {
        (None, _) => "n/a".to_string(),
        (Some(freq), true) => format!("yes, every {}", freq.as_str()),
        (Some(_), false) => "no".to_string(),
    };
    let kind = Paragraph::new(Spans::from(vec![
        Span::styled("Type: ", field_style(state, InvoiceField::Type)),
        Span::raw(state.invoice_type.label()),
        Span::raw("    "),
        Span::styled("Recurring: ", field_style(state, InvoiceField::Recurring)),
        Span::raw(recurring_value),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(kind, form_chunks[0]);

    render_date_field(
        frame,
        form_chunks[1],
        "Invoice Date",
        &state.invoice_date_state,
        state.current_field == InvoiceField::InvoiceDate,
    );
    render_date_field(
        frame,
        form_chunks[2],
        "Due Date",
        &state.due_date_state,
        state.current_field == InvoiceField::DueDate,
    );

    let notes_cursor = if state.editing && state.current_field == InvoiceField::Notes { "|" } else { "" };
    let notes = Paragraph::new(Spans::from(vec![
        Span::styled("Notes: ", field_style(state, InvoiceField::Notes)),
        Span::raw(format!("{}{}", state.notes, notes_cursor)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(notes, form_chunks[3]);

    let services_block = Block::default()
        .title(format!("Services - total {}{:.2}", state.currency, state.total()))
        .borders(Borders::ALL)
        .style(field_style(state, InvoiceField::Services));

    if let (true, InvoiceField::Services, Some((idx, field, value))) =
        (state.editing, state.current_field, &state.editing_service)
    {
        let inner = services_block.inner(form_chunks[4]);
        frame.render_widget(services_block, form_chunks[4]);

        let edit_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Length(3)])
            .split(inner);

        let active = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let row = state.services.get(*idx);

        let (desc_value, desc_style) = if *field == ServiceField::Description {
            (format!("{value}|"), active)
        } else {
            (row.map(|r| r.description.clone()).unwrap_or_default(), Style::default())
        };
        let (price_value, price_style) = if *field == ServiceField::Price {
            (format!("{value}|"), active)
        } else {
            (row.map(|r| format!("{:.2}", r.price)).unwrap_or_default(), Style::default())
        };

        let desc = Paragraph::new(Spans::from(vec![
            Span::raw("Description: "),
            Span::styled(desc_value, desc_style),
        ]))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(desc, edit_chunks[0]);

        let price = Paragraph::new(Spans::from(vec![
            Span::raw(format!("Price ({}): ", state.currency)),
            Span::styled(price_value, price_style),
        ]))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(price, edit_chunks[1]);
        return;
    }

    let items: Vec<ListItem> = if state.services.is_empty() {
        vec![ListItem::new("No services added yet")]
    } else {
        state
            .services
            .iter()
            .map(|s| ListItem::new(format!("{} - {}{:.2}", s.description, state.currency, s.price)))
            .collect()
    };

    let list = List::new(items)
        .block(services_block)
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));

    if state.editing && state.current_field == InvoiceField::Services {
        frame.render_stateful_widget(list, form_chunks[4], &mut state.services_list_state);
    } else {
        frame.render_widget(list, form_chunks[4]);
    }
}

pub fn handle_input(state: &mut InvoiceWizardState) -> Result<Option<InvoiceWizardAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() {
            return Ok(None);
        }

        let in_services = state.editing && state.current_field == InvoiceField::Services;
        let row_open = state.editing_service.is_some();

        match key.code {
            KeyCode::Esc => {
                if row_open {
                    state.editing_service = None;
                } else if state.editing {
                    state.stop_editing();
                } else {
                    return Ok(Some(InvoiceWizardAction::Cancel));
                }
            }
            KeyCode::Enter | KeyCode::Tab if in_services && row_open => state.advance_service_field(),
            KeyCode::Enter => {
                if state.editing {
                    state.stop_editing();
                } else {
                    state.activate();
                }
            }
            KeyCode::Char('s') if !state.editing => match state.validate() {
                Ok(()) => {
                    return Ok(Some(InvoiceWizardAction::Save(state.invoice_id, state.to_form())));
                }
                Err(e) => state.show_error = Some(e),
            },
            KeyCode::Char('a') if in_services && !row_open => state.add_service(),
            KeyCode::Char('e') if in_services && !row_open => state.edit_service(),
            KeyCode::Char('d') if in_services && !row_open => state.delete_service(),
            KeyCode::Up if in_services && !row_open => state.move_service_selection(false),
            KeyCode::Down if in_services && !row_open => state.move_service_selection(true),
            KeyCode::Up if !state.editing => state.previous_field(),
            KeyCode::Down if !state.editing => state.next_field(),
            _ if state.editing => state.edit_current_field(key.code),
            _ => {}
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(state: &mut InvoiceWizardState, text: &str) {
        for c in text.chars() {
            state.edit_current_field(KeyCode::Char(c));
        }
    }

    fn with_services(rows: &[(&str, &str)]) -> InvoiceWizardState {
        let mut state = InvoiceWizardState::new(3, 14, "£");
        state.current_field = InvoiceField::Services;
        state.activate();
        for (description, price) in rows {
            state.add_service();
            type_text(&mut state, description);
            state.advance_service_field();
            type_text(&mut state, price);
            state.advance_service_field();
        }
        state.stop_editing();
        state
    }

    #[test]
    fn due_date_defaults_to_payment_terms() {
        let state = InvoiceWizardState::new(3, 14, "£");
        assert_eq!(state.due_date() - state.invoice_date(), Duration::days(14));
    }

    #[test]
    fn new_invoice_is_dated_in_utc() {
        let before = Utc::now().date_naive();
        let state = InvoiceWizardState::new(3, 14, "£");
        let after = Utc::now().date_naive();
        assert!(state.invoice_date() == before || state.invoice_date() == after);
    }

    #[test]
    fn services_update_live_total() {
        let state = with_services(&[("Hosting", "10.50"), ("Support", "4.25")]);
        assert_eq!(state.services.len(), 2);
        assert_eq!(state.total(), 14.75);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn price_column_rejects_letters() {
        let mut state = with_services(&[]);
        state.editing = true;
        state.add_service();
        type_text(&mut state, "Hosting");
        state.advance_service_field();
        type_text(&mut state, "1x2");
        assert_eq!(state.editing_service.as_ref().map(|(_, _, v)| v.as_str()), Some("12"));
    }

    #[test]
    fn recurring_only_for_periodic_types() {
        let mut state = InvoiceWizardState::new(3, 14, "£");
        state.current_field = InvoiceField::Recurring;
        state.activate();
        assert!(!state.recurring);
        assert!(state.show_error.is_some());

        state.current_field = InvoiceField::Type;
        state.activate();
        assert_eq!(state.invoice_type, InvoiceType::Monthly);
        state.current_field = InvoiceField::Recurring;
        state.activate();
        assert!(state.recurring);

        // Cycling back to one-time clears the flag.
        state.current_field = InvoiceField::Type;
        state.activate();
        state.activate();
        assert_eq!(state.invoice_type, InvoiceType::OneTime);
        assert!(!state.recurring);
    }

    #[test]
    fn form_carries_rows_and_flags() {
        let mut state = with_services(&[("Hosting", "20")]);
        state.invoice_type = InvoiceType::Annual;
        state.recurring = true;
        let form = state.to_form();
        assert_eq!(form.client_id, 3);
        assert_eq!(form.services, vec![("Hosting".to_string(), 20.0)]);
        assert!(form.recurring);
    }

    #[test]
    fn empty_invoice_does_not_validate() {
        let state = InvoiceWizardState::new(3, 14, "£");
        assert!(state.validate().is_err());
    }

    #[test]
    fn delete_keeps_selection_in_range() {
        let mut state = with_services(&[("A", "1"), ("B", "2")]);
        state.services_list_state.select(Some(1));
        state.delete_service();
        assert_eq!(state.services_list_state.selected(), Some(0));
        state.delete_service();
        assert_eq!(state.services_list_state.selected(), None);
    }
}
