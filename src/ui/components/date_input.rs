use chrono::{Datelike, NaiveDate};
use crossterm::event::KeyCode;
use tui::{
    backend::Backend,
    layout::Rect,
    style::{Color, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    fn width(&self) -> usize {
        match self {
            DatePart::Year => 4,
            DatePart::Month | DatePart::Day => 2,
        }
    }
}

/// Segment-by-segment date entry. Digits fill the active part; once the part
/// is complete the date is updated and the cursor moves on.
pub struct DateInputState {
    pub date: NaiveDate,
    pub editing: bool,
    pub date_part: DatePart,
    buffer: String,
}

impl DateInputState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            editing: false,
            date_part: DatePart::Year,
            buffer: String::new(),
        }
    }

    pub fn start_editing(&mut self) {
        self.editing = true;
        self.date_part = DatePart::Year;
        self.buffer.clear();
    }

    pub fn stop_editing(&mut self) {
        self.editing = false;
        self.buffer.clear();
    }

    fn move_part(&mut self, forward: bool) {
        self.date_part = match (self.date_part, forward) {
            (DatePart::Year, true) | (DatePart::Day, false) => DatePart::Month,
            (DatePart::Month, true) | (DatePart::Year, false) => DatePart::Day,
            (DatePart::Day, true) | (DatePart::Month, false) => DatePart::Year,
        };
        self.buffer.clear();
    }

    pub fn handle_input(&mut self, key: KeyCode) {
        if !self.editing {
            return;
        }

        match key {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.buffer.push(c);
                if self.buffer.len() == self.date_part.width() {
                    if let Ok(value) = self.buffer.parse::<u32>() {
                        if let Some(date) = self.with_part(value) {
                            self.date = date;
                        }
                    }
                    self.move_part(true);
                }
            }
            KeyCode::Backspace => {
                self.buffer.pop();
            }
            KeyCode::Right | KeyCode::Tab => self.move_part(true),
            KeyCode::Left => self.move_part(false),
            _ => {}
        }
    }

    /// Replace the active part, clamping the day to the target month.
    fn with_part(&self, value: u32) -> Option<NaiveDate> {
        let (year, month, day) = (self.date.year(), self.date.month(), self.date.day());
        match self.date_part {
            DatePart::Year if (1900..=2100).contains(&value) => {
                let year = value as i32;
                NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))
            }
            DatePart::Month if (1..=12).contains(&value) => {
                NaiveDate::from_ymd_opt(year, value, day.min(days_in_month(year, value)))
            }
            DatePart::Day => NaiveDate::from_ymd_opt(year, month, value),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        let year = format!("{:04}", self.date.year());
        let month = format!("{:02}", self.date.month());
        let day = format!("{:02}", self.date.day());
        if !self.editing {
            return format!("{year}-{month}-{day}");
        }

        let marker = if self.buffer.is_empty() {
            match self.date_part {
                DatePart::Year => "[YYYY]".to_string(),
                DatePart::Month => "[MM]".to_string(),
                DatePart::Day => "[DD]".to_string(),
            }
        } else {
            format!("[{}]", self.buffer)
        };

        match self.date_part {
            DatePart::Year => format!("{marker}-{month}-{day}"),
            DatePart::Month => format!("{year}-{marker}-{day}"),
            DatePart::Day => format!("{year}-{month}-{marker}"),
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// One bordered line: `label: value`, highlighted when selected.
pub fn render_date_field<B: Backend>(
    frame: &mut Frame<B>,
    area: Rect,
    label: &str,
    state: &DateInputState,
    selected: bool,
) {
    let style = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let field = Paragraph::new(Spans::from(vec![
        Span::styled(format!("{label}: "), style),
        Span::raw(state.display()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(field, area);
}
