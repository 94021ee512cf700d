use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:pad$}{what}", "")),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("d", 11, "Toggle demo mode"),
        key_line("r", 11, "Restart the tour (clears preview data)"),
        key_line("x", 11, "Reset preview data"),
        key_line("l", 11, "Reload the step catalog"),
        key_line("e", 11, "Export store snapshot as JSON"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Walkthrough:"),
        Line::from("  Each step is shown for a moment, then runs and advances on its own."),
        Line::from("  The yellow frame marks the panel the current step is about."),
        Line::from("  Leaving demo mode cancels whatever the current step was waiting on."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
