use parley_core::{ChatSession, Feedback, Message, MessageStatus, Role};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, InputMode, SUGGESTIONS};
use crate::markdown::render_markdown;

const SIDEBAR_WIDTH: u16 = 28;
const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

pub fn draw(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(30)])
        .split(f.size());

    draw_sidebar(f, app, columns[0]);

    let strip_height = if app.composer.attachments().is_empty() { 0 } else { 1 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),            // Header
            Constraint::Min(5),               // Messages
            Constraint::Length(strip_height), // Attachments
            Constraint::Length(3),            // Input
            Constraint::Length(1),            // Status bar
        ])
        .split(columns[1]);

    draw_header(f, app, chunks[0]);
    draw_messages(f, app, chunks[1]);
    if strip_height > 0 {
        draw_attachment_strip(f, app, chunks[2]);
    }
    draw_input(f, app, chunks[3]);
    draw_status_bar(f, app, chunks[4]);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let current = app.store.current_id();
    let mut state = ListState::default();

    let items: Vec<ListItem> = app
        .store
        .sessions()
        .enumerate()
        .map(|(idx, session)| {
            if Some(session.id) == current {
                state.select(Some(idx));
            }
            let streaming = app.in_flight.map(|flight| flight.session_id == session.id).unwrap_or(false);
            let marker = if streaming { "◐ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::raw(session.title.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Chats")
                .border_style(Style::default().fg(Color::Blue)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        );

    f.render_stateful_widget(list, area, &mut state);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Parley",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
        ),
        Span::styled(format!(" · {}", app.provider_name()), Style::default().fg(Color::Gray)),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
    ];

    spans.push(if app.composer.use_search() {
        Span::styled("🔎 Search on", Style::default().fg(Color::Green))
    } else {
        Span::styled("Search off", Style::default().fg(Color::DarkGray))
    });

    if app.composer.is_listening() {
        spans.push(Span::styled("  🎙 Listening", Style::default().fg(Color::Red)));
    }

    if app.is_loading() {
        let frame = SPINNER[app.tick % SPINNER.len()];
        spans.push(Span::styled(
            format!("  {} Streaming...", frame),
            Style::default().fg(Color::Yellow),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = app.current_session() else {
        let empty = Paragraph::new(Line::from(Span::styled(
            "No chat selected. Press Ctrl+N to start one.",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )))
        .alignment(Alignment::Center)
        .block(messages_block("Messages"));
        f.render_widget(empty, area);
        return;
    };

    let lines = if session.is_empty() {
        welcome_lines(app)
    } else {
        session_lines(app, session)
    };

    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let total = wrapped_height(&lines, inner_width);
    let bottom = total.saturating_sub(inner_height);
    let top = bottom.saturating_sub(app.scroll_offset as usize);

    let messages = Paragraph::new(lines)
        .block(messages_block(&session.title))
        .wrap(Wrap { trim: false })
        .scroll((top.min(u16::MAX as usize) as u16, 0));

    f.render_widget(messages, area);
}

fn messages_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Blue))
}

/// Rows the lines occupy once wrapped to `width`
fn wrapped_height(lines: &[Line], width: usize) -> usize {
    lines
        .iter()
        .map(|line| {
            let cols: usize = line.spans.iter().map(|s| s.content.width()).sum();
            cols.max(1).div_ceil(width)
        })
        .sum()
}

fn welcome_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Hello! I'm Parley",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    ];
    if app.dictation_supported() {
        lines.push(Line::from(Span::styled(
            "Would you like to turn the microphone on? Press Ctrl+T.",
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Try one of these:",
        Style::default().fg(Color::Gray),
    )));
    for (idx, suggestion) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  [F{}] ", idx + 1), Style::default().fg(Color::Yellow)),
            Span::raw(suggestion.to_string()),
        ]));
    }
    lines
}

fn session_lines(app: &App, session: &ChatSession) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let last = session.messages.len().saturating_sub(1);
    for (idx, message) in session.messages.iter().enumerate() {
        let streaming = app.is_streaming(session.id, message);
        lines.extend(format_message(message, streaming, app.tick, idx == last));
    }
    lines
}

fn format_message(msg: &Message, streaming: bool, tick: usize, is_last: bool) -> Vec<Line<'static>> {
    let timestamp = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M").to_string();
    let mut lines = Vec::new();

    match msg.role {
        Role::User => {
            lines.push(Line::from(vec![
                Span::styled("You ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
            ]));
            if !msg.attachments.is_empty() {
                let thumbs: Vec<Span> = msg
                    .attachments
                    .iter()
                    .map(|a| Span::styled(format!("[{}] ", a.label()), Style::default().fg(Color::Magenta)))
                    .collect();
                lines.push(Line::from(thumbs));
            }
            for text in msg.content.lines() {
                lines.push(Line::from(Span::styled(text.to_string(), Style::default().fg(Color::Cyan))));
            }
        }
        Role::Model => {
            lines.push(Line::from(vec![
                Span::styled("Parley ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
            ]));

            if msg.status == MessageStatus::Pending {
                let dots = ".".repeat(tick % 3 + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                )));
            } else if msg.is_error {
                for text in msg.content.lines() {
                    lines.push(Line::from(Span::styled(text.to_string(), Style::default().fg(Color::Red))));
                }
            } else {
                lines.extend(render_markdown(&msg.content));
            }

            if streaming && msg.status == MessageStatus::Streaming {
                let cursor = Span::styled("▌", Style::default().fg(Color::Green));
                match lines.last_mut() {
                    Some(line) => line.spans.push(cursor),
                    None => lines.push(Line::from(cursor)),
                }
            }

            if let Some(grounding) = msg.grounding.as_ref() {
                let sources: Vec<_> = grounding.web_sources().collect();
                if !sources.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "Sources:",
                        Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
                    )));
                }
                for (n, source) in sources.iter().enumerate() {
                    let title = if source.title.is_empty() { &source.uri } else { &source.title };
                    lines.push(Line::from(vec![
                        Span::styled(format!("  [{}] ", n + 1), Style::default().fg(Color::Yellow)),
                        Span::raw(title.clone()),
                        Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                        Span::styled(
                            source.uri.clone(),
                            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                        ),
                    ]));
                }
            }

            if msg.actions_enabled() {
                let mut actions = vec![Span::styled(
                    "   └─ ",
                    Style::default().fg(Color::DarkGray),
                )];
                if is_last {
                    actions.push(Span::styled(
                        "[Ctrl+Y] copy  [Ctrl+R] regenerate  [Ctrl+U] 👍  [Ctrl+D] 👎",
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    ));
                }
                match msg.feedback {
                    Some(Feedback::Positive) => actions.push(Span::styled("  👍", Style::default().fg(Color::Green))),
                    Some(Feedback::Negative) => actions.push(Span::styled("  👎", Style::default().fg(Color::Red))),
                    None => {}
                }
                lines.push(Line::from(actions));
            }
        }
    }

    lines.push(Line::from(""));
    lines
}

fn draw_attachment_strip(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(" 📎 ", Style::default().fg(Color::Magenta))];
    for attachment in app.composer.attachments() {
        spans.push(Span::styled(
            format!("[{}] ", attachment.label()),
            Style::default().fg(Color::Magenta),
        ));
    }
    spans.push(Span::styled("[Ctrl+X] remove last", Style::default().fg(Color::DarkGray)));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let (title, line) = match app.input_mode() {
        InputMode::AttachPath => (
            "Attach image (Enter to add, Esc to cancel)",
            Line::from(vec![
                Span::styled("path: ", Style::default().fg(Color::Magenta)),
                Span::raw(app.path_input.clone()),
                Span::styled("▌", Style::default().fg(Color::Magenta)),
            ]),
        ),
        InputMode::Normal if app.composer.text().is_empty() => (
            "Input",
            Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::Green)),
                Span::styled(
                    if app.composer.is_listening() {
                        "Listening..."
                    } else {
                        "Type a message and press Enter to send..."
                    },
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                ),
            ]),
        ),
        InputMode::Normal => {
            let prompt_color = if app.is_loading() { Color::Yellow } else { Color::Green };
            (
                "Input",
                Line::from(vec![
                    Span::styled("> ", Style::default().fg(prompt_color)),
                    Span::raw(app.composer.text().to_string()),
                    Span::styled("▌", Style::default().fg(Color::Green)),
                ]),
            )
        }
    };

    let input = Paragraph::new(line)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match app.notice.as_deref() {
        Some(notice) => format!(" {} ", notice),
        None => {
            let help = if app.is_loading() {
                "[Tab] Switch chat  [Ctrl+N] New  [Ctrl+W] Delete  [Ctrl+C] Quit"
            } else {
                "[Enter] Send  [Ctrl+O] Attach  [Ctrl+G] Search  [Ctrl+T] Mic  [Ctrl+N] New  [Ctrl+W] Delete  [Ctrl+C] Quit"
            };
            format!(" Chats: {} | {}", app.store.len(), help)
        }
    };

    let style = if app.notice.is_some() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::REVERSED)
    } else {
        Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED)
    };

    f.render_widget(Paragraph::new(text).alignment(Alignment::Center).style(style), area);
}
