use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::models::{Client, ClientStatus};
use crate::ui::components::popup::{render_delete_confirmation, render_error, render_success};
use crate::ui::step_selection;

// Represents the state of the client list screen
pub struct ClientsState {
    operator: String,
    clients: Vec<Client>,
    table_state: TableState,
    show_delete_confirmation: bool,
    pub show_error: Option<String>,
    pub show_success: Option<String>,
}

impl ClientsState {
    pub fn new(operator: impl Into<String>, clients: Vec<Client>) -> Self {
        let mut table_state = TableState::default();
        if !clients.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            operator: operator.into(),
            clients,
            table_state,
            show_delete_confirmation: false,
            show_error: None,
            show_success: None,
        }
    }

    /// Keep the cursor on the same client after a reload when it still exists.
    pub fn select_client(&mut self, id: i32) {
        if let Some(i) = self.clients.iter().position(|c| c.id == id) {
            self.table_state.select(Some(i));
        }
    }

    pub fn next(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.clients.len(), true) {
            self.table_state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.clients.len(), false) {
            self.table_state.select(Some(i));
        }
    }

    pub fn toggle_delete_confirmation(&mut self) {
        self.show_delete_confirmation = !self.show_delete_confirmation;
    }

    pub fn selected_client(&self) -> Option<&Client> {
        self.table_state.selected().and_then(|i| self.clients.get(i))
    }

    pub fn selected_client_id(&self) -> Option<i32> {
        self.selected_client().map(|c| c.id)
    }

    fn count_with(&self, status: ClientStatus) -> usize {
        self.clients.iter().filter(|c| c.status == status).count()
    }
}

pub enum ClientAction {
    Quit,
    NewClient,
    EditClient(i32),
    DeleteClient(i32),
    ViewInvoices(i32),
    Marketing(i32),
    RepeatRules,
}

fn status_color(status: ClientStatus) -> Color {
    match status {
        ClientStatus::Potential => Color::Gray,
        ClientStatus::Negotiating => Color::Yellow,
        ClientStatus::Active => Color::Green,
        ClientStatus::Paid => Color::Cyan,
        ClientStatus::Inactive => Color::DarkGray,
    }
}

pub fn render_clients<B: Backend>(frame: &mut Frame<B>, state: &mut ClientsState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let header_cells = ["Name", "Email", "Phone", "Type", "Status", "Tasks"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells)
        .height(1)
        .bottom_margin(1);

    let rows = state.clients.iter().map(|client| {
        Row::new(vec![
            Cell::from(client.full_name()),
            Cell::from(client.email.as_str()),
            Cell::from(client.phone.as_str()),
            Cell::from(client.client_type.as_deref().unwrap_or("-")),
            Cell::from(client.status.label()).style(Style::default().fg(status_color(client.status))),
            Cell::from(client.tasks_line()),
        ])
    });

    let title = format!(
        "Clients ({} active, {} negotiating) - signed in as {}",
        state.count_with(ClientStatus::Active),
        state.count_with(ClientStatus::Negotiating),
        state.operator,
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
            Constraint::Percentage(20),
            Constraint::Percentage(22),
            Constraint::Percentage(14),
            Constraint::Percentage(10),
            Constraint::Percentage(12),
            Constraint::Percentage(22),
        ]);

    frame.render_stateful_widget(table, chunks[0], &mut state.table_state);

    let buttons_text = if state.selected_client().is_some() {
        "<N> New | <E> Edit | <D> Delete | <Enter> Invoices | <M> Marketing | <R> Repeat rules | <Q> Quit"
    } else {
        "<N> New Client | <R> Repeat rules | <Q> Quit"
    };

    let buttons = Paragraph::new(buttons_text)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);

    if state.show_delete_confirmation {
        render_delete_confirmation(
            frame,
            "client",
            "Their invoices and schedules will also be deleted.",
        );
    }
    if let Some(error) = &state.show_error {
        render_error(frame, error);
    } else if let Some(message) = &state.show_success {
        render_success(frame, message);
    }
}

pub fn handle_input(state: &mut ClientsState) -> Result<Option<ClientAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() || state.show_success.take().is_some() {
            return Ok(None);
        }

        if state.show_delete_confirmation {
            match key.code {
                KeyCode::Char('y') => {
                    state.toggle_delete_confirmation();
                    if let Some(id) = state.selected_client_id() {
                        return Ok(Some(ClientAction::DeleteClient(id)));
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => state.toggle_delete_confirmation(),
                _ => {}
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Some(ClientAction::Quit)),
            KeyCode::Char('n') => return Ok(Some(ClientAction::NewClient)),
            KeyCode::Char('r') => return Ok(Some(ClientAction::RepeatRules)),
            KeyCode::Char('e') => {
                if let Some(id) = state.selected_client_id() {
                    return Ok(Some(ClientAction::EditClient(id)));
                }
            }
            KeyCode::Char('d') => {
                if state.selected_client().is_some() {
                    state.toggle_delete_confirmation();
                }
            }
            KeyCode::Char('m') => {
                if let Some(id) = state.selected_client_id() {
                    return Ok(Some(ClientAction::Marketing(id)));
                }
            }
            KeyCode::Enter => {
                if let Some(id) = state.selected_client_id() {
                    return Ok(Some(ClientAction::ViewInvoices(id)));
                }
            }
            KeyCode::Down => state.next(),
            KeyCode::Up => state.previous(),
            _ => {}
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: i32, status: ClientStatus) -> Client {
        let mut client = Client::blank();
        client.id = id;
        client.status = status;
        client
    }

    #[test]
    fn selection_follows_reloaded_client() {
        let mut state = ClientsState::new(
            "owner@acme.test",
            vec![client(1, ClientStatus::Active), client(5, ClientStatus::Paid)],
        );
        assert_eq!(state.selected_client_id(), Some(1));
        state.select_client(5);
        assert_eq!(state.selected_client_id(), Some(5));
        state.next();
        assert_eq!(state.selected_client_id(), Some(1));
    }

    #[test]
    fn empty_list_has_no_selection() {
        let mut state = ClientsState::new("owner@acme.test", vec![]);
        state.next();
        assert!(state.selected_client().is_none());
    }

    #[test]
    fn counts_by_status() {
        let state = ClientsState::new(
            "owner@acme.test",
            vec![
                client(1, ClientStatus::Active),
                client(2, ClientStatus::Active),
                client(3, ClientStatus::Negotiating),
            ],
        );
        assert_eq!(state.count_with(ClientStatus::Active), 2);
        assert_eq!(state.count_with(ClientStatus::Inactive), 0);
    }
}
