//! Markdown-lite: `**bold**`, `*italic*` and line breaks. Nothing else.
//!
//! Bold is resolved over the whole line first and italic over what remains, so
//! either kind of emphasis may sit inside the other.

use std::sync::OnceLock;

use regex::Regex;

/// Emphasis applied to a run of text. Bold and italic combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
}

impl Style {
    pub const PLAIN: Style = Style { bold: false, italic: false };
    pub const BOLD: Style = Style { bold: true, italic: false };
    pub const ITALIC: Style = Style { bold: false, italic: true };
    pub const BOLD_ITALIC: Style = Style { bold: true, italic: true };
}

/// A run of text with a single style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub style: Style,
    pub text: String,
}

impl Segment {
    fn new(style: Style, text: &str) -> Self {
        Self {
            style,
            text: text.to_string(),
        }
    }
}

fn bold_pattern() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("static pattern"))
}

fn italic_pattern() -> &'static Regex {
    static ITALIC: OnceLock<Regex> = OnceLock::new();
    ITALIC.get_or_init(|| Regex::new(r"\*(.*?)\*").expect("static pattern"))
}

/// Parse one line (no `\n`) into styled segments
pub fn parse_line(line: &str) -> Vec<Segment> {
    // Bold pass: strip `**` pairs, flagging every byte of their content.
    let mut text = String::with_capacity(line.len());
    let mut bold = Vec::with_capacity(line.len());
    let mut last = 0;
    for caps in bold_pattern().captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        push_run(&mut text, &mut bold, &line[last..whole.start()], false);
        push_run(&mut text, &mut bold, inner.as_str(), true);
        last = whole.end();
    }
    push_run(&mut text, &mut bold, &line[last..], false);

    // Italic pass over the stripped text. Its markers are hidden, not removed,
    // so the bold flags stay aligned.
    let mut italic = vec![false; text.len()];
    let mut hidden = vec![false; text.len()];
    for caps in italic_pattern().captures_iter(&text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        hidden[whole.start()] = true;
        hidden[whole.end() - 1] = true;
        italic[inner.range()].fill(true);
    }

    let mut segments: Vec<Segment> = Vec::new();
    for (i, c) in text.char_indices() {
        if hidden[i] {
            continue;
        }
        let style = Style {
            bold: bold[i],
            italic: italic[i],
        };
        match segments.last_mut() {
            Some(segment) if segment.style == style => segment.text.push(c),
            _ => segments.push(Segment {
                style,
                text: c.to_string(),
            }),
        }
    }

    segments
}

fn push_run(text: &mut String, flags: &mut Vec<bool>, run: &str, flag: bool) {
    text.push_str(run);
    flags.resize(flags.len() + run.len(), flag);
}

/// Parse message text into lines of segments. Every `\n` starts a new line.
pub fn parse(text: &str) -> Vec<Vec<Segment>> {
    text.split('\n').map(parse_line).collect()
}

/// Each rendered line with the markers stripped
pub fn plain_lines(text: &str) -> Vec<String> {
    parse(text)
        .iter()
        .map(|line| line.iter().map(|s| s.text.as_str()).collect())
        .collect()
}

/// Strip the markers, keeping the text. Used for plain-text output.
pub fn to_plain(text: &str) -> String {
    plain_lines(text).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_and_break() {
        let lines = parse("**x** *y*\n z");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            vec![
                Segment::new(Style::BOLD, "x"),
                Segment::new(Style::PLAIN, " "),
                Segment::new(Style::ITALIC, "y"),
            ]
        );
        assert_eq!(lines[1], vec![Segment::new(Style::PLAIN, " z")]);
    }

    #[test]
    fn test_italic_inside_bold() {
        assert_eq!(
            parse_line("**Le *Turdus* merle**"),
            vec![
                Segment::new(Style::BOLD, "Le "),
                Segment::new(Style::BOLD_ITALIC, "Turdus"),
                Segment::new(Style::BOLD, " merle"),
            ]
        );
    }

    #[test]
    fn test_bold_inside_italic() {
        assert_eq!(
            parse_line("*a **b** c*"),
            vec![
                Segment::new(Style::ITALIC, "a "),
                Segment::new(Style::BOLD_ITALIC, "b"),
                Segment::new(Style::ITALIC, " c"),
            ]
        );
    }

    #[test]
    fn test_triple_asterisks() {
        assert_eq!(
            parse_line("***Robin***!"),
            vec![
                Segment::new(Style::BOLD_ITALIC, "Robin"),
                Segment::new(Style::PLAIN, "!"),
            ]
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(
            parse_line("just words"),
            vec![Segment::new(Style::PLAIN, "just words")]
        );
    }

    #[test]
    fn test_unclosed_marker_is_literal() {
        assert_eq!(
            parse_line("5 * 3 = 15"),
            vec![Segment::new(Style::PLAIN, "5 * 3 = 15")]
        );
    }

    #[test]
    fn test_emphasis_does_not_cross_lines() {
        let lines = parse("*start\nend*");
        assert_eq!(lines[0], vec![Segment::new(Style::PLAIN, "*start")]);
        assert_eq!(lines[1], vec![Segment::new(Style::PLAIN, "end*")]);
    }

    #[test]
    fn test_assistant_prefix() {
        let line = parse_line("**BirdBot** : hello");
        assert_eq!(line[0], Segment::new(Style::BOLD, "BirdBot"));
        assert_eq!(line[1], Segment::new(Style::PLAIN, " : hello"));
    }

    #[test]
    fn test_non_ascii_inside_emphasis() {
        assert_eq!(
            parse_line("**Mésange *bleue***"),
            vec![
                Segment::new(Style::BOLD, "Mésange "),
                Segment::new(Style::BOLD_ITALIC, "bleue"),
            ]
        );
    }

    #[test]
    fn test_empty_line() {
        assert!(parse_line("").is_empty());
        assert_eq!(parse("a\n\nb").len(), 3);
    }

    #[test]
    fn test_to_plain() {
        assert_eq!(to_plain("**x** *y*\n z"), "x y\n z");
        assert_eq!(plain_lines("**a *b***\nc"), vec!["a b", "c"]);
    }
}
