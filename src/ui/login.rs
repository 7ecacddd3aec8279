use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::ui::components::popup::{centered_rect, render_error};

pub struct LoginState {
    pub company_name: String,
    pub email: String,
    pub error: Option<String>,
}

pub enum LoginAction {
    Quit,
    Submit(String),
}

impl LoginState {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            email: String::new(),
            error: None,
        }
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.error = Some(reason.into());
        self.email.clear();
    }
}

pub fn render_login<B: Backend>(frame: &mut Frame<B>, state: &mut LoginState) {
    let area = centered_rect(60, 40, frame.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(area);

    let title = Paragraph::new(format!("{} back office", state.company_name))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    let input = Paragraph::new(Spans::from(vec![
        Span::styled("Email: ", Style::default().fg(Color::Yellow)),
        Span::styled(format!("{}|", state.email), Style::default().add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().title("Sign in").borders(Borders::ALL));
    frame.render_widget(input, chunks[1]);

    let help = Paragraph::new("Enter - Sign in | Esc - Quit")
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(help, chunks[2]);

    if let Some(error) = &state.error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut LoginState) -> Result<Option<LoginAction>> {
    if let Event::Key(key) = event::read()? {
        if state.error.take().is_some() {
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => return Ok(Some(LoginAction::Quit)),
            KeyCode::Enter => {
                if !state.email.trim().is_empty() {
                    return Ok(Some(LoginAction::Submit(state.email.trim().to_string())));
                }
            }
            KeyCode::Char(c) => state.email.push(c),
            KeyCode::Backspace => {
                state.email.pop();
            }
            _ => {}
        }
    }

    Ok(None)
}
