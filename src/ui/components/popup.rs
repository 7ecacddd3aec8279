use tui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Spans,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

// Helper function to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn render_message<B: Backend>(frame: &mut Frame<B>, title: &str, message: &str, color: Color) {
    let popup_area = centered_rect(60, 25, frame.size());

    let mut lines = vec![Spans::from("")];
    lines.extend(message.lines().map(|l| Spans::from(l.to_string())));
    lines.push(Spans::from(""));
    lines.push(Spans::from("Press any key to continue"));

    let popup = Paragraph::new(lines)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .style(Style::default().fg(color).bg(Color::Black))
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}

pub fn render_error<B: Backend>(frame: &mut Frame<B>, error: &str) {
    render_message(frame, "Error", error, Color::Red);
}

pub fn render_success<B: Backend>(frame: &mut Frame<B>, message: &str) {
    render_message(frame, "Success", message, Color::Green);
}

pub fn render_delete_confirmation<B: Backend>(frame: &mut Frame<B>, what: &str, consequence: &str) {
    let popup_area = centered_rect(50, 25, frame.size());

    let popup = Paragraph::new(vec![
        Spans::from(""),
        Spans::from(format!("Are you sure you want to delete this {what}?")),
        Spans::from(""),
        Spans::from(consequence.to_string()),
        Spans::from(""),
        Spans::from("<Y> Yes  <N> No"),
    ])
    .block(Block::default().title("Confirm Delete").borders(Borders::ALL))
    .style(Style::default().fg(Color::White).bg(Color::Black));

    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}
