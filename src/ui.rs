use crate::app::{App, FocusPane, InputMode, NoticeKind, Screen};
use chrono::Local;
use pdfqa_core::{format_date, format_file_size, ChatRole, DocumentStatus};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};

/// Render one line of an answer: `# ` headings, `- ` bullets and `**bold**` spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    if let Some(heading) = text.strip_prefix("# ").or_else(|| text.strip_prefix("## ")) {
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }

    let (prefix, body) = match text.strip_prefix("- ").or_else(|| text.strip_prefix("* ")) {
        Some(rest) => (Some(Span::raw("  • ")), rest),
        None => (None, text),
    };

    let parts: Vec<&str> = body.split("**").collect();
    // An odd number of parts means every ** has a partner
    let balanced = parts.len() % 2 == 1;
    let last = parts.len() - 1;

    let mut spans: Vec<Span<'static>> = prefix.into_iter().collect();
    for (i, part) in parts.iter().enumerate() {
        let bold = i % 2 == 1;
        if bold && !balanced && i == last {
            spans.push(Span::raw(format!("**{}", part)));
        } else if bold && !part.is_empty() {
            spans.push(Span::styled(
                part.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, status, footer
    let [header_area, body_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::History => render_history_screen(app, frame, body_area),
    }

    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);

    if app.show_upload_input {
        render_upload_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let active = match app.session.active_document() {
        Some(doc) => Span::styled(
            format!(" {} ", doc.display_name()),
            Style::default().fg(Color::White),
        ),
        None => Span::styled(" no document selected ", Style::default().fg(Color::Gray)),
    };

    let title = Line::from(vec![
        Span::styled(" PDF Q&A ", Style::default().fg(Color::Cyan).bold()),
        Span::raw("|"),
        active,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(notice) = &app.notice {
        let color = match notice.kind {
            NoticeKind::Info => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        Line::from(Span::styled(format!(" {}", notice.text), Style::default().fg(color)))
    } else if app.is_uploading() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!(" Uploading{}", dots),
            Style::default().fg(Color::Yellow),
        ))
    } else if let Some(stats) = app.session.last_answer() {
        Line::from(Span::styled(
            format!(
                " Last answer: {} context chunks, {:.2}s",
                stats.context_chunks_used, stats.response_time_seconds
            ),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::default()
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::History => " HISTORY ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let hints: Vec<Span> = if app.show_upload_input {
        [hint(" Enter ", " upload "), hint(" Esc ", " cancel ")].concat()
    } else if app.confirm_delete.is_some() {
        [hint(" y ", " delete "), hint(" any ", " cancel ")].concat()
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Chat, InputMode::Editing) => {
                [hint(" Enter ", " send "), hint(" Esc ", " stop typing ")].concat()
            }
            (Screen::Chat, InputMode::Normal) => {
                let mut hints = hint(" Tab ", " focus ").to_vec();
                match app.focus {
                    FocusPane::Documents => {
                        hints.extend(hint(" j/k ", " nav "));
                        hints.extend(hint(" Enter ", " select "));
                        hints.extend(hint(" d ", " delete "));
                    }
                    FocusPane::Conversation => hints.extend(hint(" j/k ", " scroll ")),
                    FocusPane::Input => hints.extend(hint(" i ", " ask ")),
                }
                hints.extend(hint(" u ", " upload "));
                hints.extend(hint(" r ", " refresh "));
                hints.extend(hint(" H ", " history "));
                hints.extend(hint(" q ", " quit "));
                hints
            }
            (Screen::History, _) => [
                hint(" j/k ", " scroll "),
                hint(" r ", " refresh "),
                hint(" Esc ", " chat "),
                hint(" q ", " quit "),
            ]
            .concat(),
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray })
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [documents_area, conversation_area] =
        Layout::horizontal([Constraint::Length(34), Constraint::Min(0)]).areas(area);

    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(conversation_area);

    // Store areas for mouse hit-testing
    app.documents_area = Some(documents_area);
    app.chat_area = Some(chat_area);

    render_documents(app, frame, documents_area);
    render_conversation(app, frame, chat_area);
    render_query_input(app, frame, input_area);
}

fn render_documents(app: &mut App, frame: &mut Frame, area: Rect) {
    let processing: Vec<ListItem> = app
        .processing_documents()
        .into_iter()
        .map(|doc| {
            let (label, color) = match doc.status() {
                DocumentStatus::Failed(_) => ("failed", Color::Red),
                _ => ("processing", Color::Yellow),
            };
            ListItem::new(vec![
                Line::from(format!(" {}", doc.display_name())),
                Line::from(Span::styled(
                    format!("   {} · {}", format_file_size(doc.file_size), label),
                    Style::default().fg(color),
                )),
            ])
        })
        .collect();

    // Documents still processing get their own block below the list
    let processing_height = if processing.is_empty() {
        0
    } else {
        (processing.len() as u16 * 2 + 2).min(area.height / 2)
    };
    let [list_area, processing_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(processing_height),
    ])
    .areas(area);

    let active_id = app.session.registry().active_id();
    let items: Vec<ListItem> = app
        .selectable_documents()
        .into_iter()
        .map(|doc| {
            let marker = if Some(doc.id) == active_id { "● " } else { "  " };
            let pages = doc
                .total_pages
                .map(|p| format!(" · {} pages", p))
                .unwrap_or_default();
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::raw(doc.display_name().to_string()),
                ]),
                Line::from(Span::styled(
                    format!("  {}{}", format_file_size(doc.file_size), pages),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == FocusPane::Documents))
        .title(format!(" Documents ({}) ", items.len()));

    if items.is_empty() {
        let text = if app.refresh_task.is_some() {
            "Loading documents..."
        } else {
            "No documents yet.\nPress 'u' to upload a PDF."
        };
        let placeholder = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, list_area);
    } else {
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut app.documents_state);
    }

    if processing_height > 0 {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Processing ");
        frame.render_widget(List::new(processing).block(block), processing_area);
    }
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.query_chat_height = area.height.saturating_sub(2);
    app.query_chat_width = area.width.saturating_sub(2);

    let title = match app.session.active_document() {
        Some(doc) => format!(" Chat: {} ", doc.display_name()),
        None => " Chat ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.focus == FocusPane::Conversation))
        .title(title);

    let messages = app.session.ledger().messages();

    let chat_text = match app.session.active_document() {
        None => Text::from(vec![
            Line::from(Span::styled(
                "Welcome to PDF Q&A",
                Style::default().fg(Color::Cyan).bold(),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Upload a PDF with 'u', then pick it from the document list",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "to ask questions about its content.",
                Style::default().fg(Color::DarkGray),
            )),
        ]),
        Some(doc) if messages.is_empty() => Text::from(vec![
            Line::from(Span::styled(
                format!("\"{}\" is ready", doc.display_name()),
                Style::default().fg(Color::Green).bold(),
            )),
            Line::from(Span::styled(
                format!(
                    "Uploaded {} · {} chunks",
                    format_date(&doc.upload_date.with_timezone(&Local)),
                    doc.chunk_count
                ),
                Style::default().fg(Color::DarkGray),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Ask a question about this document...",
                Style::default().fg(Color::DarkGray),
            )),
        ]),
        Some(_) => {
            let mut lines: Vec<Line> = Vec::new();
            for msg in messages {
                let time = msg.timestamp.with_timezone(&Local).format("%H:%M").to_string();
                let (label, color) = match msg.role {
                    ChatRole::User => ("You:", Color::Cyan),
                    ChatRole::Assistant => ("AI:", Color::Yellow),
                };
                lines.push(Line::from(vec![
                    Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                    Span::styled(format!(" {}", time), Style::default().fg(Color::DarkGray)),
                ]));

                if msg.pending {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else if msg.role == ChatRole::Assistant {
                    lines.extend(msg.content.lines().map(parse_markdown_line));
                } else {
                    lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
                }
                lines.push(Line::default());
            }
            Text::from(lines)
        }
    };

    let total_lines = chat_text.lines.len();
    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.query_scroll, 0));

    frame.render_widget(chat, area);

    if total_lines > app.query_chat_height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state =
            ScrollbarState::new(total_lines).position(app.query_scroll as usize);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_query_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let ready = app.session.active_document().is_some();

    let input_border_color = if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if !ready {
        " Select a document first "
    } else if app.session.is_busy() {
        " Waiting for answer... "
    } else {
        " Ask a question "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_history_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    app.documents_area = None;
    app.chat_area = None;

    let title = match (&app.history, app.session.active_document()) {
        (Some(history), _) => match &history.document_filename {
            Some(name) => format!(" History: {} ({}) ", name, history.total),
            None => format!(" History ({}) ", history.total),
        },
        (None, Some(doc)) => format!(" History: {} ", doc.display_name()),
        (None, None) => " History ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let text = match &app.history {
        None if app.history_task.is_some() => Text::from("Loading history..."),
        None => Text::from("No history loaded. Select a document and press 'H'."),
        Some(history) if history.conversations.is_empty() => {
            Text::from("No questions have been asked about this document yet.")
        }
        Some(history) => {
            let mut lines: Vec<Line> = Vec::new();
            for record in &history.conversations {
                let timing = record
                    .response_time_seconds
                    .map(|s| format!(" · {:.2}s", s))
                    .unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!(
                        "{} · {} chunks{}",
                        format_date(&record.created_at.with_timezone(&Local)),
                        record.context_chunks_used,
                        timing
                    ),
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::from(vec![
                    Span::styled("Q: ", Style::default().fg(Color::Cyan).bold()),
                    Span::raw(record.question.clone()),
                ]));
                lines.push(Line::from(Span::styled(
                    "A:",
                    Style::default().fg(Color::Yellow).bold(),
                )));
                lines.extend(record.answer.lines().map(parse_markdown_line));
                lines.push(Line::default());
            }
            Text::from(lines)
        }
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.history_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_upload_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 6;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Upload PDF ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Type or paste the path of a PDF file. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 2));

    let input_area = Rect::new(inner.x, inner.y + 3, inner.width, 1);
    let width = input_area.width as usize;
    let offset = (app.upload_cursor + 1).saturating_sub(width);
    let visible: String = app.upload_input.chars().skip(offset).take(width).collect();

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = (app.upload_cursor - offset) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}
