use ratatui::layout::Rect;
use tokio::task::JoinHandle;

use crate::client::ChatBackend;
use crate::controller::{ChatController, FileSelection, TextInput};
use crate::markdown;
use crate::message::{Message, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Transcript,
    TextInput,
    FileInput,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Transcript => FocusPane::TextInput,
            FocusPane::TextInput => FocusPane::FileInput,
            FocusPane::FileInput => FocusPane::Transcript,
        }
    }

    /// Tab while editing: jump between the two inputs
    pub fn other_input(self) -> Self {
        match self {
            FocusPane::FileInput => FocusPane::TextInput,
            _ => FocusPane::FileInput,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, FocusPane::TextInput | FocusPane::FileInput)
    }
}

pub struct App<B> {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    pub controller: ChatController<B>,
    pub transcript: Transcript,

    // Question input (shared with the controller, which clears it)
    pub text_input: TextInput,
    pub text_cursor: usize,

    // Image path being typed, and the selection handed to the controller
    pub path_draft: String,
    pub path_cursor: usize,
    pub file_input: FileSelection,

    // Requests still running
    pub pending: Vec<JoinHandle<()>>,

    // Transcript scrolling
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16, // Inner height of the transcript pane
    pub chat_width: u16,  // Inner width, for wrap calculations
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl<B: ChatBackend> App<B> {
    /// Build the app around a controller wired to the given sink and inputs
    pub fn new(
        controller: ChatController<B>,
        transcript: Transcript,
        text_input: TextInput,
        file_input: FileSelection,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::TextInput,

            controller,
            transcript,

            text_input,
            text_cursor: 0,

            path_draft: String::new(),
            path_cursor: 0,
            file_input,

            pending: Vec::new(),

            chat_scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.snapshot()
    }

    pub fn submit_text(&mut self) {
        if let Some(handle) = self.controller.submit_text() {
            self.pending.push(handle);
        }
        self.text_cursor = 0;
        self.follow_tail = true;
    }

    /// Commit the typed path as the selection, then submit it
    pub fn submit_image(&mut self) {
        let draft = self.path_draft.trim();
        if !draft.is_empty() {
            self.file_input.select(expand_tilde(draft));
        }
        self.path_draft.clear();
        self.path_cursor = 0;

        if let Some(handle) = self.controller.submit_image() {
            self.pending.push(handle);
        }
        self.follow_tail = true;
    }

    /// Called by Tick events
    pub fn on_tick(&mut self) {
        self.pending.retain(|handle| !handle.is_finished());
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
        self.follow_tail = true;
    }

    /// Keep the newest message in view unless the user scrolled away
    pub fn update_scroll(&mut self) {
        if self.follow_tail {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.total_chat_lines().saturating_sub(visible_height)
    }

    /// Rendered line count of the transcript at the current width
    pub fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.transcript.snapshot() {
            total_lines = total_lines.saturating_add(1); // Sender line
            // Count what is drawn, without the emphasis markers
            for line in markdown::plain_lines(&msg.text) {
                total_lines = total_lines.saturating_add(wrapped_rows(&line, wrap_width) as u16);
            }
            if msg.image.is_some() {
                total_lines = total_lines.saturating_add(1);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        total_lines
    }
}

/// Rows a line takes when word-wrapped at `width` columns
fn wrapped_rows(line: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut col = 0;
    for word in line.split_inclusive(' ') {
        let visible = word.trim_end_matches(' ').chars().count();
        if col > 0 && col + visible > width {
            rows += 1;
            col = 0;
        }
        // Words wider than the pane break mid-word
        col += word.chars().count();
        while col > width {
            rows += 1;
            col -= width;
        }
    }
    rows
}

fn expand_tilde(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    std::path::PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CallError, Classification, UploadRequest};
    use crate::controller::Persona;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn classify(&self, upload: UploadRequest) -> Result<Classification, CallError> {
            Ok(Classification {
                message: format!("saw {}", upload.filename),
                bird: None,
            })
        }

        async fn ask(&self, text: &str) -> Result<String, CallError> {
            Ok(text.to_uppercase())
        }

        async fn enrich(&self, bird_name: &str, _: &str) -> Result<String, CallError> {
            Ok(bird_name.to_string())
        }
    }

    fn app() -> App<EchoBackend> {
        let transcript = Transcript::new();
        let text_input = TextInput::new();
        let file_input = FileSelection::new();
        let controller = ChatController::new(
            Arc::new(EchoBackend),
            transcript.clone(),
            text_input.clone(),
            file_input.clone(),
            Persona::default(),
        );
        App::new(controller, transcript, text_input, file_input)
    }

    #[tokio::test]
    async fn test_submit_text_tracks_pending_and_resets_cursor() {
        let mut app = app();
        app.text_input.set("hello");
        app.text_cursor = 5;
        app.submit_text();

        assert_eq!(app.text_cursor, 0);
        assert_eq!(app.text_input.value(), "");
        assert!(app.is_loading());

        for handle in app.pending.drain(..) {
            handle.await.unwrap();
        }
        let last = app.transcript.last().unwrap();
        assert_eq!(last.text, "**BirdBot** : HELLO");
    }

    #[tokio::test]
    async fn test_submit_image_without_path() {
        let mut app = app();
        app.submit_image();
        assert!(!app.is_loading());
        assert_eq!(app.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_image_moves_draft_into_selection() {
        let mut app = app();
        let file = tempfile::NamedTempFile::new().unwrap();
        app.path_draft = format!("  {}  ", file.path().display());
        app.submit_image();

        assert!(app.path_draft.is_empty());
        for handle in app.pending.drain(..) {
            handle.await.unwrap();
        }
        assert_eq!(app.file_input.selected(), None);
        assert!(app.transcript.last().unwrap().text.starts_with("saw "));
    }

    #[test]
    fn test_total_lines_counts_wraps() {
        let mut app = app();
        app.chat_width = 10;
        app.transcript.append(Message::user("0123456789abc"));
        // sender + 2 wrapped + blank
        assert_eq!(app.total_chat_lines(), 4);
    }

    #[test]
    fn test_total_lines_wraps_on_words() {
        let mut app = app();
        app.chat_width = 10;
        // "aaaaaa " / "bbbbbb " / "cccccc" once words move down whole
        app.transcript.append(Message::bot("aaaaaa bbbbbb cccccc"));
        assert_eq!(app.total_chat_lines(), 5);
    }

    #[test]
    fn test_total_lines_ignores_emphasis_markers() {
        let mut app = app();
        app.chat_width = 12;
        // Drawn as "BirdBot : hi", which fits 12 columns once the markers are gone
        app.transcript.append(Message::bot("**BirdBot** : hi"));
        assert_eq!(app.total_chat_lines(), 3);
    }

    #[test]
    fn test_wrapped_rows() {
        assert_eq!(wrapped_rows("", 10), 1);
        assert_eq!(wrapped_rows("short", 10), 1);
        assert_eq!(wrapped_rows("0123456789abc", 10), 2);
        assert_eq!(wrapped_rows("aaaaaa bbbbbb", 10), 2);
    }

    #[test]
    fn test_scroll_follow_tail() {
        let mut app = app();
        app.chat_width = 80;
        app.chat_height = 2;
        for i in 0..5 {
            app.transcript.append(Message::bot(format!("line {i}")));
        }
        app.update_scroll();
        assert_eq!(app.chat_scroll, 13);

        app.scroll_up(3);
        assert!(!app.follow_tail);
        app.transcript.append(Message::bot("new"));
        app.update_scroll();
        assert_eq!(app.chat_scroll, 10);

        app.scroll_to_bottom();
        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, 16);
    }

    #[test]
    fn test_focus_cycle() {
        assert_eq!(FocusPane::Transcript.next(), FocusPane::TextInput);
        assert_eq!(FocusPane::FileInput.next(), FocusPane::Transcript);
        assert!(!FocusPane::Transcript.is_input());
    }

    #[test]
    fn test_tab_while_editing_stays_on_inputs() {
        assert_eq!(FocusPane::TextInput.other_input(), FocusPane::FileInput);
        assert_eq!(FocusPane::FileInput.other_input(), FocusPane::TextInput);
        assert_eq!(FocusPane::Transcript.other_input(), FocusPane::FileInput);
    }
}
