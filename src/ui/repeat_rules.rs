use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::models::ScheduledMessage;
use crate::ui::components::popup::{render_delete_confirmation, render_error};
use crate::ui::step_selection;

// Marketing messages that are resent on a cadence
pub struct RepeatRulesState {
    rules: Vec<ScheduledMessage>,
    table_state: TableState,
    show_delete_confirmation: bool,
    pub show_error: Option<String>,
}

pub enum RepeatRulesAction {
    Back,
    DeleteRule(i32),
}

impl RepeatRulesState {
    pub fn new(rules: Vec<ScheduledMessage>) -> Self {
        let mut table_state = TableState::default();
        if !rules.is_empty() {
            table_state.select(Some(0));
        }
        Self {
            rules,
            table_state,
            show_delete_confirmation: false,
            show_error: None,
        }
    }

    pub fn next(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.rules.len(), true) {
            self.table_state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some(i) = step_selection(self.table_state.selected(), self.rules.len(), false) {
            self.table_state.select(Some(i));
        }
    }

    pub fn selected_rule_id(&self) -> Option<i32> {
        self.table_state
            .selected()
            .and_then(|i| self.rules.get(i))
            .map(|r| r.rule.id)
    }
}

pub fn render_repeat_rules<B: Backend>(frame: &mut Frame<B>, state: &mut RepeatRulesState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)].as_ref())
        .split(frame.size());

    let header_cells = ["Recipient", "Subject", "Repeats", "Last sent"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows = state.rules.iter().map(|scheduled| {
        let last_sent = scheduled
            .message
            .sent_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        Row::new(vec![
            Cell::from(scheduled.message.recipient.clone()),
            Cell::from(scheduled.message.subject.clone()),
            Cell::from(scheduled.rule.interval.as_str()),
            Cell::from(last_sent),
        ])
    });

    let table = Table::new(rows)
        .header(header)
        .block(
            Block::default()
                .title(format!("Repeat rules ({})", state.rules.len()))
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(28),
            Constraint::Percentage(40),
            Constraint::Percentage(12),
            Constraint::Percentage(20),
        ]);
    frame.render_stateful_widget(table, chunks[0], &mut state.table_state);

    let buttons_text = if state.selected_rule_id().is_some() {
        "<D> Stop repeating | <Esc> Back"
    } else {
        "<Esc> Back"
    };
    let buttons = Paragraph::new(buttons_text)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));
    frame.render_widget(buttons, chunks[1]);

    if state.show_delete_confirmation {
        render_delete_confirmation(frame, "repeat rule", "The message history is kept.");
    }
    if let Some(error) = &state.show_error {
        render_error(frame, error);
    }
}

pub fn handle_input(state: &mut RepeatRulesState) -> Result<Option<RepeatRulesAction>> {
    if let Event::Key(key) = event::read()? {
        if state.show_error.take().is_some() {
            return Ok(None);
        }

        if state.show_delete_confirmation {
            state.show_delete_confirmation = false;
            if key.code == KeyCode::Char('y') {
                if let Some(id) = state.selected_rule_id() {
                    return Ok(Some(RepeatRulesAction::DeleteRule(id)));
                }
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Some(RepeatRulesAction::Back)),
            KeyCode::Char('d') => {
                if state.selected_rule_id().is_some() {
                    state.show_delete_confirmation = true;
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
    use crate::models::{Message, RepeatInterval, RepeatRule};
    use chrono::Utc;

    fn scheduled(rule_id: i32) -> ScheduledMessage {
        ScheduledMessage {
            rule: RepeatRule {
                id: rule_id,
                message_id: rule_id * 10,
                interval: RepeatInterval::Weekly,
            },
            message: Message {
                id: rule_id * 10,
                client_id: Some(1),
                sender: "hello@acme.test".into(),
                recipient: "grace@client.test".into(),
                subject: "News".into(),
                content: "Hi".into(),
                sent_at: None,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn selection_walks_rules() {
        let mut state = RepeatRulesState::new(vec![scheduled(1), scheduled(2)]);
        assert_eq!(state.selected_rule_id(), Some(1));
        state.next();
        assert_eq!(state.selected_rule_id(), Some(2));
        state.previous();
        assert_eq!(state.selected_rule_id(), Some(1));
    }

    #[test]
    fn empty_table_selects_nothing() {
        let state = RepeatRulesState::new(vec![]);
        assert_eq!(state.selected_rule_id(), None);
    }
}
