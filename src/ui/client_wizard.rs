use anyhow::Result;
use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::models::{Client, ClientType};
use crate::ui::components::date_input::DateInputState;
use crate::ui::components::popup::render_error;

pub enum ClientWizardAction {
    Cancel,
    Save(Client),
}

#[derive(Clone, PartialEq, Copy, Debug)]
pub enum ClientField {
    Name,
    Surname,
    Email,
    Phone,
    Address,
    DateOfBirth,
    PlaceOfBirth,
    Sex,
    Type,
    Status,
    Tasks,
    Description,
}

impl ClientField {
    const ALL: [ClientField; 12] = [
        ClientField::Name,
        ClientField::Surname,
        ClientField::Email,
        ClientField::Phone,
        ClientField::Address,
        ClientField::DateOfBirth,
        ClientField::PlaceOfBirth,
        ClientField::Sex,
        ClientField::Type,
        ClientField::Status,
        ClientField::Tasks,
        ClientField::Description,
    ];

    fn label(&self) -> &'static str {
        match self {
            ClientField::Name => "Name",
            ClientField::Surname => "Surname",
            ClientField::Email => "Email",
            ClientField::Phone => "Phone",
            ClientField::Address => "Address",
            ClientField::DateOfBirth => "Date of birth",
            ClientField::PlaceOfBirth => "Place of birth",
            ClientField::Sex => "Sex",
            ClientField::Type => "Client type",
            ClientField::Status => "Status",
            ClientField::Tasks => "Tasks (comma separated)",
            ClientField::Description => "Description",
        }
    }

    /// Fields that change on Enter instead of taking typed input.
    fn is_choice(&self) -> bool {
        matches!(self, ClientField::Type | ClientField::Status)
    }
}

pub struct ClientWizardState {
    pub client: Client,
    pub current_field: ClientField,
    pub editing: bool,
    tasks_input: String,
    dob_state: DateInputState,
    pub show_error: Option<String>,
}

impl ClientWizardState {
    pub fn new() -> Self {
        Self::from_existing(Client::blank())
    }

    pub fn from_existing(client: Client) -> Self {
        let dob = client
            .date_of_birth
            .or_else(|| NaiveDate::from_ymd_opt(1990, 1, 1))
            .unwrap_or(NaiveDate::MIN);
        Self {
            tasks_input: client.tasks_line(),
            dob_state: DateInputState::new(dob),
            client,
            current_field: ClientField::Name,
            editing: false,
            show_error: None,
        }
    }

    fn field_index(&self) -> usize {
        ClientField::ALL
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0)
    }

    pub fn next_field(&mut self) {
        let i = (self.field_index() + 1) % ClientField::ALL.len();
        self.current_field = ClientField::ALL[i];
    }

    pub fn previous_field(&mut self) {
        let len = ClientField::ALL.len();
        let i = (self.field_index() + len - 1) % len;
        self.current_field = ClientField::ALL[i];
    }

    /// Enter on a field: choice fields cycle, others toggle editing.
    pub fn activate(&mut self) {
        match self.current_field {
            ClientField::Status => self.client.status = self.client.status.next(),
            ClientField::Type => {
                self.client.client_type = match self.client.client_type.as_deref() {
                    None => Some(ClientType::Individual.as_str().to_string()),
                    Some("individual") => Some(ClientType::Company.as_str().to_string()),
                    Some(_) => None,
                };
            }
            ClientField::DateOfBirth => {
                if self.editing {
                    self.dob_state.stop_editing();
                    self.client.date_of_birth = Some(self.dob_state.date);
                } else {
                    self.dob_state.start_editing();
                }
                self.editing = !self.editing;
            }
            _ => self.editing = !self.editing,
        }
    }

    pub fn stop_editing(&mut self) {
        if self.current_field == ClientField::DateOfBirth {
            self.dob_state.stop_editing();
        }
        self.editing = false;
    }

    /// Clear an optional field.
    pub fn clear_current_field(&mut self) {
        match self.current_field {
            ClientField::Address => self.client.address = None,
            ClientField::DateOfBirth => self.client.date_of_birth = None,
            ClientField::PlaceOfBirth => self.client.place_of_birth = None,
            ClientField::Sex => self.client.sex = None,
            ClientField::Type => self.client.client_type = None,
            ClientField::Description => self.client.description = None,
            ClientField::Tasks => self.tasks_input.clear(),
            _ => {}
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        fn optional(value: &mut Option<String>) -> &mut String {
            value.get_or_insert_with(String::new)
        }

        match self.current_field {
            ClientField::Name => Some(&mut self.client.name),
            ClientField::Surname => Some(&mut self.client.surname),
            ClientField::Email => Some(&mut self.client.email),
            ClientField::Phone => Some(&mut self.client.phone),
            ClientField::Address => Some(optional(&mut self.client.address)),
            ClientField::PlaceOfBirth => Some(optional(&mut self.client.place_of_birth)),
            ClientField::Sex => Some(optional(&mut self.client.sex)),
            ClientField::Description => Some(optional(&mut self.client.description)),
            ClientField::Tasks => Some(&mut self.tasks_input),
            ClientField::DateOfBirth | ClientField::Type | ClientField::Status => None,
        }
    }

    pub fn edit_current_field(&mut self, key: KeyCode) {
        if !self.editing {
            return;
        }

        if self.current_field == ClientField::DateOfBirth {
            self.dob_state.handle_input(key);
            return;
        }

        if let Some(value) = self.text_mut() {
            match key {
                KeyCode::Char(c) => value.push(c),
                KeyCode::Backspace => {
                    value.pop();
                }
                _ => {}
            }
        }
    }

    fn value_of(&self, field: ClientField) -> String {
        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        match field {
            ClientField::Name => self.client.name.clone(),
            ClientField::Surname => self.client.surname.clone(),
            ClientField::Email => self.client.email.clone(),
            ClientField::Phone => self.client.phone.clone(),
            ClientField::Address => optional(&self.client.address),
            ClientField::DateOfBirth => {
                if self.editing && self.current_field == ClientField::DateOfBirth {
                    self.dob_state.display()
                } else {
                    self.client
                        .date_of_birth
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()
                }
            }
            ClientField::PlaceOfBirth => optional(&self.client.place_of_birth),
            ClientField::Sex => optional(&self.client.sex),
            ClientField::Type => optional(&self.client.client_type),
            ClientField::Status => self.client.status.label().to_string(),
            ClientField::Tasks => self.tasks_input.clone(),
            ClientField::Description => optional(&self.client.description),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client.name.trim().is_empty() {
            return Err("Name is required".into());
        }
        if !self.client.email.contains('@') {
            return Err("A valid email address is required".into());
        }
        Ok(())
    }

    /// The client as it should be stored: trimmed text, empty optionals as
    /// `None`, tasks parsed from the task line.
    pub fn to_client(&self) -> Client {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Client {
            name: self.client.name.trim().to_string(),
            surname: self.client.surname.trim().to_string(),
            email: self.client.email.trim().to_string(),
            phone: self.client.phone.trim().to_string(),
            address: clean(&self.client.address),
            place_of_birth: clean(&self.client.place_of_birth),
            sex: clean(&self.client.sex),
            description: clean(&self.client.description),
            tasks: Client::parse_tasks(&self.tasks_input),
            ..self.client.clone()
        }
    }
}

pub fn render_client_wizard<B: Backend>(f: &mut Frame<B>, state: &mut ClientWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title_text = if state.client.id == 0 {
        "New Client"
    } else {
        "Edit Client"
    };

    let title = Paragraph::new(title_text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_form(f, state, chunks[1]);

    let help_text = match (state.editing, state.current_field) {
        (true, ClientField::DateOfBirth) => "Digits - Fill date | Left/Right - Date part | Enter - Done | Esc - Cancel",
        (true, _) => "Enter - Save field | Esc - Cancel editing",
        (false, field) if field.is_choice() => "Enter - Change | Up/Down - Navigate | S - Save client | Esc - Cancel",
        (false, _) => "Enter - Edit field | Del - Clear | Up/Down - Navigate | S - Save client | Esc - Cancel",
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[2]);

    if let Some(error) = &state.show_error {
        render_error(f, error);
    }
}

fn render_form<B: Backend>(f: &mut Frame<B>, state: &mut ClientWizardState, area: Rect) {
    let items: Vec<ListItem> = ClientField::ALL
        .iter()
        .map(|field| {
            let selected = *field == state.current_field;
            let value = state.value_of(*field);
            let content = if selected && state.editing {
                let cursor = if *field == ClientField::DateOfBirth { "" } else { "|" };
                Spans::from(vec![
                    Span::styled(format!("{}: ", field.label()), Style::default().fg(Color::Yellow)),
                    Span::styled(format!("{value}{cursor}"), Style::default().add_modifier(Modifier::BOLD)),
                ])
            } else {
                let style = if selected {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                Spans::from(vec![
                    Span::styled(format!("{}: ", field.label()), style),
                    Span::raw(value),
                ])
            };

            ListItem::new(content)
        })
        .collect();

    let form_list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Client Details"));

    f.render_widget(form_list, area);
}

pub fn handle_input(state: &mut ClientWizardState) -> Result<Option<ClientWizardAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() {
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => {
                if state.editing {
                    state.stop_editing();
                } else {
                    return Ok(Some(ClientWizardAction::Cancel));
                }
            }
            KeyCode::Enter => state.activate(),
            KeyCode::Up if !state.editing => state.previous_field(),
            KeyCode::Down if !state.editing => state.next_field(),
            KeyCode::Delete if !state.editing => state.clear_current_field(),
            KeyCode::Char('s') if !state.editing => match state.validate() {
                Ok(()) => return Ok(Some(ClientWizardAction::Save(state.to_client()))),
                Err(e) => state.show_error = Some(e),
            },
            _ if state.editing => state.edit_current_field(key.code),
            _ => {}
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientStatus;

    fn type_text(state: &mut ClientWizardState, text: &str) {
        for c in text.chars() {
            state.edit_current_field(KeyCode::Char(c));
        }
    }

    #[test]
    fn fields_wrap_around() {
        let mut state = ClientWizardState::new();
        state.previous_field();
        assert_eq!(state.current_field, ClientField::Description);
        state.next_field();
        assert_eq!(state.current_field, ClientField::Name);
    }

    #[test]
    fn typing_only_applies_while_editing() {
        let mut state = ClientWizardState::new();
        type_text(&mut state, "ignored");
        assert!(state.client.name.is_empty());

        state.activate();
        type_text(&mut state, "Ada");
        state.edit_current_field(KeyCode::Backspace);
        assert_eq!(state.client.name, "Ad");
    }

    #[test]
    fn choice_fields_cycle_on_enter() {
        let mut state = ClientWizardState::new();
        state.current_field = ClientField::Status;
        state.activate();
        assert_eq!(state.client.status, ClientStatus::Active);
        assert!(!state.editing);

        state.current_field = ClientField::Type;
        state.activate();
        assert_eq!(state.client.client_type.as_deref(), Some("individual"));
        state.activate();
        assert_eq!(state.client.client_type.as_deref(), Some("company"));
        state.activate();
        assert_eq!(state.client.client_type, None);
    }

    #[test]
    fn date_of_birth_is_entered_by_parts() {
        let mut state = ClientWizardState::new();
        state.current_field = ClientField::DateOfBirth;
        state.activate();
        type_text(&mut state, "19851207");
        state.activate();
        assert_eq!(state.client.date_of_birth, NaiveDate::from_ymd_opt(1985, 12, 7));
    }

    #[test]
    fn saved_client_is_cleaned_up() {
        let mut client = Client::blank();
        client.name = " Ada ".into();
        client.email = "ada@client.test".into();
        client.address = Some("   ".into());
        let mut state = ClientWizardState::from_existing(client);
        state.current_field = ClientField::Tasks;
        state.activate();
        type_text(&mut state, "Audit, , Build");

        let saved = state.to_client();
        assert_eq!(saved.name, "Ada");
        assert_eq!(saved.address, None);
        assert_eq!(saved.tasks, vec!["Audit", "Build"]);
    }

    #[test]
    fn validation_requires_name_and_email() {
        let mut state = ClientWizardState::new();
        assert!(state.validate().is_err());
        state.client.name = "Ada".into();
        state.client.email = "nope".into();
        assert!(state.validate().is_err());
        state.client.email = "ada@client.test".into();
        assert!(state.validate().is_ok());
    }
}
