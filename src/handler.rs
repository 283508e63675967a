use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::client::ChatBackend;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event<B: ChatBackend>(app: &mut App<B>, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Tick => app.on_tick(),
    }
    Ok(())
}

fn handle_key<B: ChatBackend>(app: &mut App<B>, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode<B: ChatBackend>(app: &mut App<B>, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Tab => app.focus = app.focus.next(),

        // Start editing the focused input
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.focus.is_input() {
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('/') | KeyCode::Char('a') => {
            app.focus = FocusPane::TextInput;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('o') => {
            app.focus = FocusPane::FileInput;
            app.input_mode = InputMode::Editing;
        }

        _ => {}
    }
}

fn handle_editing_mode<B: ChatBackend>(app: &mut App<B>, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => app.focus = app.focus.other_input(),
        KeyCode::Enter => match app.focus {
            FocusPane::TextInput => app.submit_text(),
            FocusPane::FileInput => app.submit_image(),
            FocusPane::Transcript => app.input_mode = InputMode::Normal,
        },
        _ => match app.focus {
            FocusPane::TextInput => {
                let mut cursor = app.text_cursor;
                app.text_input.edit(|buffer| edit_line(buffer, &mut cursor, key));
                app.text_cursor = cursor;
            }
            FocusPane::FileInput => {
                edit_line(&mut app.path_draft, &mut app.path_cursor, key);
            }
            FocusPane::Transcript => {}
        },
    }
}

/// Single-line editing keys shared by both input boxes
fn edit_line(buffer: &mut String, cursor: &mut usize, key: KeyEvent) {
    let char_count = buffer.chars().count();
    // The controller may have cleared the buffer since the last key.
    *cursor = (*cursor).min(char_count);

    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = char_count;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(buffer, *cursor);
            buffer.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse<B: ChatBackend>(app: &mut App<B>, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
