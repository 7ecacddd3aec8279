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

use crate::marketing::{fill_placeholders, Campaign, TEMPLATES};
use crate::models::{Client, RepeatInterval};
use crate::ui::components::popup::render_error;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MarketingField {
    Template,
    Subject,
    Content,
    Repeat,
}

impl MarketingField {
    const ALL: [MarketingField; 4] = [
        MarketingField::Template,
        MarketingField::Subject,
        MarketingField::Content,
        MarketingField::Repeat,
    ];

    fn label(&self) -> &'static str {
        match self {
            MarketingField::Template => "Template",
            MarketingField::Subject => "Subject",
            MarketingField::Content => "Message",
            MarketingField::Repeat => "Repeat",
        }
    }
}

pub struct MarketingWizardState {
    client: Client,
    company: String,
    /// Index into `TEMPLATES`; `None` while composing from scratch.
    template: Option<usize>,
    campaign: Campaign,
    current_field: MarketingField,
    editing: bool,
    pub show_error: Option<String>,
}

pub enum MarketingWizardAction {
    Cancel,
    Send(Campaign),
}

impl MarketingWizardState {
    pub fn new(client: Client, company: impl Into<String>) -> Self {
        Self {
            client,
            company: company.into(),
            template: None,
            campaign: Campaign {
                subject: String::new(),
                content: String::new(),
                repeat: None,
            },
            current_field: MarketingField::Template,
            editing: false,
            show_error: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn field_index(&self) -> usize {
        MarketingField::ALL
            .iter()
            .position(|f| *f == self.current_field)
            .unwrap_or(0)
    }

    pub fn next_field(&mut self) {
        self.current_field = MarketingField::ALL[(self.field_index() + 1) % MarketingField::ALL.len()];
    }

    pub fn previous_field(&mut self) {
        let len = MarketingField::ALL.len();
        self.current_field = MarketingField::ALL[(self.field_index() + len - 1) % len];
    }

    /// Step to the next canned template and load its text. Wraps back to a
    /// blank message after the last one; the repeat choice is kept.
    pub fn cycle_template(&mut self) {
        let repeat = self.campaign.repeat;
        self.template = match self.template {
            None => Some(0),
            Some(i) if i + 1 < TEMPLATES.len() => Some(i + 1),
            Some(_) => None,
        };
        self.campaign = match self.template {
            Some(i) => Campaign::from_template(&TEMPLATES[i]),
            None => Campaign {
                subject: String::new(),
                content: String::new(),
                repeat: None,
            },
        };
        self.campaign.repeat = repeat;
    }

    pub fn cycle_repeat(&mut self) {
        self.campaign.repeat = match self.campaign.repeat {
            None => Some(RepeatInterval::ALL[0]),
            Some(current) => RepeatInterval::ALL
                .iter()
                .position(|r| *r == current)
                .and_then(|i| RepeatInterval::ALL.get(i + 1).copied()),
        };
    }

    pub fn activate(&mut self) {
        match self.current_field {
            MarketingField::Template => self.cycle_template(),
            MarketingField::Repeat => self.cycle_repeat(),
            MarketingField::Subject | MarketingField::Content => self.editing = true,
        }
    }

    pub fn edit_current_field(&mut self, key: KeyCode) {
        let target = match self.current_field {
            MarketingField::Subject => &mut self.campaign.subject,
            MarketingField::Content => &mut self.campaign.content,
            _ => return,
        };
        match key {
            KeyCode::Char(c) => target.push(c),
            KeyCode::Backspace => {
                target.pop();
            }
            KeyCode::Enter if self.current_field == MarketingField::Content => target.push('\n'),
            _ => {}
        }
    }

    pub fn preview_subject(&self) -> String {
        fill_placeholders(&self.campaign.subject, &self.client, &self.company)
    }

    pub fn preview_content(&self) -> String {
        fill_placeholders(&self.campaign.content, &self.client, &self.company)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client.email.trim().is_empty() {
            return Err("Client has no email address".into());
        }
        if self.campaign.subject.trim().is_empty() {
            return Err("Subject is required".into());
        }
        if self.campaign.content.trim().is_empty() {
            return Err("Message is required".into());
        }
        Ok(())
    }

    fn field_value(&self, field: MarketingField) -> String {
        match field {
            MarketingField::Template => self
                .template
                .map(|i| TEMPLATES[i].name.to_string())
                .unwrap_or_else(|| "(custom)".to_string()),
            MarketingField::Subject => self.campaign.subject.clone(),
            MarketingField::Content => self.campaign.content.replace('\n', " / "),
            MarketingField::Repeat => self
                .campaign
                .repeat
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}

pub fn render_marketing_wizard<B: Backend>(frame: &mut Frame<B>, state: &mut MarketingWizardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(MarketingField::ALL.len() as u16 + 2),
                Constraint::Min(6),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(frame.size());

    let title = Paragraph::new(format!(
        "Message {} <{}>",
        state.client.full_name(),
        state.client.email
    ))
    .style(Style::default().fg(Color::Cyan))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    let form: Vec<Spans> = MarketingField::ALL
        .iter()
        .map(|field| {
            let selected = *field == state.current_field;
            let label_style = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let mut value = state.field_value(*field);
            if selected && state.editing {
                value.push('|');
            }
            Spans::from(vec![
                Span::styled(format!("{}: ", field.label()), label_style),
                Span::raw(value),
            ])
        })
        .collect();
    let form = Paragraph::new(form).block(Block::default().borders(Borders::ALL));
    frame.render_widget(form, chunks[1]);

    let mut preview = vec![
        Spans::from(Span::styled(
            state.preview_subject(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Spans::from(""),
    ];
    preview.extend(state.preview_content().lines().map(|l| Spans::from(l.to_string())));
    let preview = Paragraph::new(preview)
        .block(Block::default().title("Preview").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, chunks[2]);

    let help_text = match (state.editing, state.current_field) {
        (true, MarketingField::Content) => "Type message | Enter - New line | Esc - Done",
        (true, _) => "Type subject | Enter/Esc - Done",
        (false, MarketingField::Template | MarketingField::Repeat) => {
            "Enter - Change | Up/Down - Navigate | S - Send | Esc - Cancel"
        }
        (false, _) => "Enter - Edit | Up/Down - Navigate | S - Send | Esc - Cancel",
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, chunks[3]);

    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut MarketingWizardState) -> Result<Option<MarketingWizardAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() {
            return Ok(None);
        }

        if state.editing {
            match key.code {
                KeyCode::Esc => state.editing = false,
                KeyCode::Enter if state.current_field != MarketingField::Content => state.editing = false,
                code => state.edit_current_field(code),
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => return Ok(Some(MarketingWizardAction::Cancel)),
            KeyCode::Enter => state.activate(),
            KeyCode::Up => state.previous_field(),
            KeyCode::Down | KeyCode::Tab => state.next_field(),
            KeyCode::Char('s') => match state.validate() {
                Ok(()) => return Ok(Some(MarketingWizardAction::Send(state.campaign.clone()))),
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

    fn state() -> MarketingWizardState {
        let mut client = Client::blank();
        client.name = "Grace".into();
        client.email = "grace@client.test".into();
        MarketingWizardState::new(client, "Acme Studio")
    }

    #[test]
    fn templates_cycle_and_wrap_to_custom() {
        let mut state = state();
        state.cycle_template();
        assert_eq!(state.campaign.subject, TEMPLATES[0].subject);
        state.cycle_template();
        assert_eq!(state.preview_subject(), "What's new at Acme Studio");
        state.cycle_template();
        assert_eq!(state.template, None);
        assert!(state.campaign.content.is_empty());
    }

    #[test]
    fn template_change_keeps_repeat_choice() {
        let mut state = state();
        state.cycle_repeat();
        state.cycle_template();
        assert_eq!(state.campaign.repeat, Some(RepeatInterval::ALL[0]));
    }

    #[test]
    fn repeat_cycles_through_intervals_then_off() {
        let mut state = state();
        for interval in RepeatInterval::ALL {
            state.cycle_repeat();
            assert_eq!(state.campaign.repeat, Some(interval));
        }
        state.cycle_repeat();
        assert_eq!(state.campaign.repeat, None);
    }

    #[test]
    fn content_accepts_new_lines() {
        let mut state = state();
        state.current_field = MarketingField::Content;
        state.activate();
        for key in [KeyCode::Char('H'), KeyCode::Char('i'), KeyCode::Enter, KeyCode::Char('{')] {
            state.edit_current_field(key);
        }
        assert_eq!(state.campaign.content, "Hi\n{");
    }

    #[test]
    fn preview_fills_placeholders() {
        let mut state = state();
        state.cycle_template();
        assert!(state.preview_content().starts_with("Hi Grace,"));
        assert!(state.preview_content().ends_with("Acme Studio"));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn blank_message_is_rejected() {
        let state = state();
        assert!(state.validate().is_err());
    }
}
