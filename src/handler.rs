use crate::app::{App, FocusPane, InputMode, Screen};
use crate::tui::AppEvent;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text editing shared by the question box and the upload path popup
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(text.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

fn insert_text(text: &mut String, cursor: &mut usize, pasted: &str) {
    // Single-line inputs: newlines in pasted text become spaces
    let cleaned: String = pasted
        .trim_end_matches(['\r', '\n'])
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let byte_pos = char_to_byte_index(text, *cursor);
    text.insert_str(byte_pos, &cleaned);
    *cursor += cleaned.chars().count();
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_upload_input {
        handle_upload_input(app, key);
        return;
    }

    if app.confirm_delete.is_some() {
        if key.code == KeyCode::Char('y') {
            app.start_delete();
        } else {
            app.confirm_delete = None;
            app.notice = None;
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_upload_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_upload_input = false;
            app.upload_input.clear();
            app.upload_cursor = 0;
        }
        KeyCode::Enter => app.start_upload(),
        _ => edit_line(&mut app.upload_input, &mut app.upload_cursor, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Keys shared by both screens
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('u') => {
            if app.is_uploading() {
                app.info("An upload is already in progress");
            } else {
                app.show_upload_input = true;
            }
            return;
        }
        KeyCode::Char('r') => {
            app.start_refresh();
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Chat => handle_chat_normal(app, key),
        Screen::History => handle_history_normal(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::Char('H') => {
            app.screen = Screen::History;
            app.start_history();
        }
        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        _ => match app.focus {
            FocusPane::Documents => match key.code {
                KeyCode::Char('j') | KeyCode::Down => app.documents_nav_down(),
                KeyCode::Char('k') | KeyCode::Up => app.documents_nav_up(),
                KeyCode::Enter => app.select_highlighted_document(),
                KeyCode::Char('d') => app.request_delete(),
                _ => {}
            },
            FocusPane::Conversation => match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    app.query_scroll = app.query_scroll.saturating_add(1)
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.query_scroll = app.query_scroll.saturating_sub(1)
                }
                KeyCode::Char('g') => app.query_scroll = 0,
                KeyCode::Char('G') => app.scroll_query_to_bottom(),
                _ => {}
            },
            FocusPane::Input => {
                if key.code == KeyCode::Enter {
                    app.input_mode = InputMode::Editing;
                }
            }
        },
    }
}

fn handle_history_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('H') => app.screen = Screen::Chat,
        KeyCode::Char('j') | KeyCode::Down => {
            app.history_scroll = app.history_scroll.saturating_add(1)
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.history_scroll = app.history_scroll.saturating_sub(1)
        }
        KeyCode::Char('g') => app.history_scroll = 0,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.submit_question(),
        _ => edit_line(&mut app.query_input, &mut app.query_cursor, key),
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.show_upload_input {
        insert_text(&mut app.upload_input, &mut app.upload_cursor, text);
    } else if app.input_mode == InputMode::Editing {
        insert_text(&mut app.query_input, &mut app.query_cursor, text);
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);
    let in_documents = app.documents_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));

    match (mouse.kind, app.screen) {
        (MouseEventKind::ScrollDown, Screen::History) => {
            app.history_scroll = app.history_scroll.saturating_add(3)
        }
        (MouseEventKind::ScrollUp, Screen::History) => {
            app.history_scroll = app.history_scroll.saturating_sub(3)
        }
        (MouseEventKind::ScrollDown, Screen::Chat) if in_chat => {
            app.query_scroll = app.query_scroll.saturating_add(3)
        }
        (MouseEventKind::ScrollUp, Screen::Chat) if in_chat => {
            app.query_scroll = app.query_scroll.saturating_sub(3)
        }
        (MouseEventKind::ScrollDown, Screen::Chat) if in_documents => app.documents_nav_down(),
        (MouseEventKind::ScrollUp, Screen::Chat) if in_documents => app.documents_nav_up(),
        _ => {}
    }
}
