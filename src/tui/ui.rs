//! UI rendering for the player.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
    style::{Color, Style},
};
use super::app::PlayerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &PlayerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(34),
            Constraint::Length(28),
        ])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_screen(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(12),
            Constraint::Length(7),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw the frame buffer, two pixel rows per text row using half blocks.
fn draw_screen(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let cpu = app.machine.cpu();
    let display = cpu.display();
    let rows: Vec<&[u8]> = display.rows().collect();

    let lines: Vec<Line> = rows
        .chunks(2)
        .map(|pair| {
            let top = pair[0];
            let bottom = pair.get(1).copied();
            let text: String = (0..top.len())
                .map(|x| {
                    let upper = top[x] != 0;
                    let lower = bottom.is_some_and(|row| row[x] != 0);
                    match (upper, lower) {
                        (true, true) => '█',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (false, false) => ' ',
                    }
                })
                .collect();
            Line::from(text)
        })
        .collect();

    let border = if app.is_running() { Color::Green } else { Color::DarkGray };
    let screen = Paragraph::new(lines)
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(format!(" {} ", app.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)));

    frame.render_widget(screen, area);
}

/// Draw V registers, I, PC, timers and stack depth.
fn draw_registers(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let cpu = app.machine.cpu();
    let state = cpu.state();
    let v = state.registers().v_all();

    let mut content: Vec<Line> = (0..8)
        .map(|row| {
            Line::from(vec![
                Span::raw(format!("V{:X}: ", row)),
                Span::styled(format!("{:02X}", v[row]), Style::default().fg(Color::White)),
                Span::raw(format!("   V{:X}: ", row + 8)),
                Span::styled(format!("{:02X}", v[row + 8]), Style::default().fg(Color::White)),
            ])
        })
        .collect();

    content.push(Line::from(vec![
        Span::raw("PC: "),
        Span::styled(format!("{:03X}", state.pc()), Style::default().fg(Color::Yellow)),
        Span::raw("   I: "),
        Span::styled(format!("{:03X}", state.i()), Style::default().fg(Color::White)),
    ]));
    content.push(Line::from(format!(
        "DT: {:3}  ST: {:3}  SP: {}",
        state.delay(),
        state.sound(),
        state.stack_depth()
    )));
    content.push(Line::from(vec![
        Span::raw("Cycles: "),
        Span::styled(format!("{}", cpu.cycles()), Style::default().fg(Color::Cyan)),
    ]));

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let style = if app.failure().is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::White)
    };
    let status = Paragraph::new(app.status.clone())
        .style(style)
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("space: Run/Pause"),
        Line::from("bksp: Reset  esc: Quit"),
        Line::from("0-9 a-f: Keypad"),
        Line::from("arrows: 8 4 6 2"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
