use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, FocusPane, InputMode};
use crate::client::ChatBackend;
use crate::markdown::{self, Segment};
use crate::message::{Message, Sender};
use crate::preview::{self, PreviewStore};

/// Ratatui style for a markdown-lite emphasis set
fn emphasis_style(style: markdown::Style) -> Style {
    let mut out = Style::default();
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        out = out.add_modifier(Modifier::ITALIC);
    }
    out
}

/// Convert parsed markdown-lite segments into a styled line
fn markdown_line(segments: Vec<Segment>) -> Line<'static> {
    let spans: Vec<Span<'static>> = segments
        .into_iter()
        .filter(|s| !s.text.is_empty())
        .map(|s| Span::styled(s.text, emphasis_style(s.style)))
        .collect();

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// `[image: name (size)]` while the preview is live, `[image: name]` after release
fn image_line(url: &str, previews: &PreviewStore) -> Line<'static> {
    let label = match previews.resolve(url) {
        Some(info) => format!("[image: {} ({})]", info.filename, format_size(info.size)),
        None => format!("[image: {}]", preview::filename_from_url(url).unwrap_or(url)),
    };
    Line::from(Span::styled(label, Style::default().fg(Color::Green)))
}

fn message_lines(msg: &Message, assistant: &str, previews: &PreviewStore) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let header = match msg.sender {
        Sender::User => Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Sender::Bot => Span::styled(
            format!("{}:", assistant),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    };
    lines.push(Line::from(header));
    lines.extend(markdown::parse(&msg.text).into_iter().map(markdown_line));
    if let Some(url) = &msg.image {
        lines.push(image_line(url, previews));
    }
    lines.push(Line::default());

    lines
}

pub fn render<B: ChatBackend>(app: &mut App<B>, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat_screen(app, frame, body_area);
    render_footer(app, frame, footer_area);
}

fn render_header<B: ChatBackend>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let pending = app.pending.len();
    let pending_indicator = if pending > 0 {
        format!(" [{} pending]", pending)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.controller.persona().assistant_name),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(pending_indicator, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer<B: ChatBackend>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => {
            let submit = if app.focus == FocusPane::FileInput { " send image " } else { " ask " };
            vec![
                Span::styled(" Enter ", key_style),
                Span::styled(submit, label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" switch input ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" done ", label_style),
            ]
        }
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" G ", key_style),
            Span::styled(" latest ", label_style),
            Span::styled(" / ", key_style),
            Span::styled(" ask ", label_style),
            Span::styled(" o ", key_style),
            Span::styled(" image ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen<B: ChatBackend>(app: &mut App<B>, frame: &mut Frame, area: Rect) {
    let [chat_area, text_area, file_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store areas for mouse hit-testing and scroll calculations (inner size minus borders)
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    app.update_scroll();

    render_transcript(app, frame, chat_area);
    render_text_input(app, frame, text_area);
    render_file_input(app, frame, file_area);
}

fn render_transcript<B: ChatBackend>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let persona = app.controller.persona();
    let title = if app.is_loading() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        format!(" {}: {} | waiting{} ", persona.assistant_name, persona.model_label, dots)
    } else {
        format!(" {}: {} ", persona.assistant_name, persona.model_label)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let messages = app.messages();
    let text = if messages.is_empty() {
        Text::from(Span::styled(
            "Ask a question about birds, or send a photo to identify one...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let previews = app.controller.previews();
        let lines: Vec<Line> = messages
            .iter()
            .flat_map(|msg| message_lines(msg, &persona.assistant_name, previews))
            .collect();
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Portion of `text` that fits in `width` columns with the cursor visible
fn visible_window(text: &str, cursor: usize, width: usize) -> (String, usize) {
    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if width == 0 {
        0
    } else if cursor >= width {
        cursor - width + 1
    } else {
        0
    };

    let visible: String = text.chars().skip(scroll_offset).take(width).collect();
    (visible, cursor - scroll_offset)
}

fn input_block(title: &'static str, active: bool) -> Block<'static> {
    let border_color = if active { Color::Yellow } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
}

fn render_text_input<B: ChatBackend>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::TextInput;
    let editing = focused && app.input_mode == InputMode::Editing;

    let value = app.text_input.value();
    let cursor = app.text_cursor.min(value.chars().count());
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_window(&value, cursor, inner_width);

    // Use cyan text to match the "You:" style - visible in both light and dark terminals
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block(" Ask (Enter to send) ", focused));
    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((area.x + cursor_x as u16 + 1, area.y + 1));
    }
}

fn render_file_input<B: ChatBackend>(app: &App<B>, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::FileInput;
    let editing = focused && app.input_mode == InputMode::Editing;
    let block = input_block(" Image path (Enter to identify) ", focused);

    // While an upload runs the selection stays visible until the flow clears it
    if app.path_draft.is_empty() && !editing {
        if let Some(selected) = app.file_input.selected() {
            let pending = Paragraph::new(Span::styled(
                format!("{} (sending...)", selected.display()),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))
            .block(block);
            frame.render_widget(pending, area);
            return;
        }
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_x) = visible_window(&app.path_draft, app.path_cursor, inner_width);
    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((area.x + cursor_x as u16 + 1, area.y + 1));
    }
}
