//! Markdown to styled spans.
//!
//! The output is a flat list of spans whose concatenated text is the
//! rendered document, newlines included. Widgets map each span's style to
//! fonts and colours.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: bool,
    pub quote: bool,
    /// 1..=6
    pub heading: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

pub fn render(markdown: &str) -> Vec<StyledSpan> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer {
        at_line_start: true,
        ..Renderer::default()
    };
    for event in Parser::new_ext(markdown, options) {
        renderer.event(event);
    }
    renderer.finish()
}

/// Concatenated text of a rendered document.
#[cfg(test)]
pub fn plain_text(spans: &[StyledSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[derive(Default)]
struct Renderer {
    spans: Vec<StyledSpan>,
    strong: u32,
    emphasis: u32,
    strikethrough: u32,
    link: u32,
    heading: Option<u8>,
    code_block: bool,
    quote_depth: usize,
    lists: Vec<Option<u64>>,
    trailing_newlines: usize,
    at_line_start: bool,
}

impl Renderer {
    fn style(&self) -> SpanStyle {
        SpanStyle {
            strong: self.strong > 0,
            emphasis: self.emphasis > 0,
            strikethrough: self.strikethrough > 0,
            code: self.code_block,
            link: self.link > 0,
            quote: self.quote_depth > 0,
            heading: self.heading,
        }
    }

    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn append(&mut self, text: &str, style: SpanStyle) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(StyledSpan {
                text: text.to_string(),
                style,
            }),
        }
    }

    fn text(&mut self, text: &str, style: SpanStyle) {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.newline();
            }
            if line.is_empty() {
                continue;
            }
            if self.at_line_start && self.quote_depth > 0 {
                let prefix = "│ ".repeat(self.quote_depth);
                self.append(&prefix, SpanStyle { quote: true, ..SpanStyle::default() });
            }
            self.append(line, style);
            self.at_line_start = false;
            self.trailing_newlines = 0;
        }
    }

    fn newline(&mut self) {
        self.append("\n", SpanStyle::default());
        self.trailing_newlines += 1;
        self.at_line_start = true;
    }

    fn ensure_newlines(&mut self, count: usize) {
        if self.is_empty() {
            return;
        }
        while self.trailing_newlines < count {
            self.newline();
        }
    }

    fn block_break(&mut self) {
        let count = if self.lists.is_empty() { 2 } else { 1 };
        self.ensure_newlines(count);
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text, self.style()),
            Event::Code(code) => {
                let style = SpanStyle { code: true, ..self.style() };
                self.text(&code, style);
            }
            Event::Html(html) => self.text(&html, self.style()),
            Event::FootnoteReference(name) => self.text(&format!("[^{}]", name), self.style()),
            Event::SoftBreak => self.text(" ", self.style()),
            Event::HardBreak => self.newline(),
            Event::Rule => {
                self.block_break();
                self.text("────────────", SpanStyle::default());
                self.block_break();
            }
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " }, self.style());
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.block_break(),
            Tag::Heading(level, _, _) => {
                self.block_break();
                self.heading = Some(heading_number(level));
            }
            Tag::BlockQuote => {
                self.block_break();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.block_break();
                if let CodeBlockKind::Fenced(lang) = kind {
                    tracing::trace!("Unsegmented fenced block ({}) rendered inline", lang);
                }
                self.code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.ensure_newlines(1);
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.ensure_newlines(1);
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let indent = "  ".repeat(depth);
                self.text(&format!("{}{}", indent, marker), SpanStyle::default());
            }
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strong => self.strong += 1,
            Tag::Strikethrough => self.strikethrough += 1,
            Tag::Link(..) => self.link += 1,
            Tag::Image(..)
            | Tag::FootnoteDefinition(_)
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.block_break(),
            Tag::Heading(..) => {
                self.heading = None;
                self.block_break();
            }
            Tag::BlockQuote => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.block_break();
            }
            Tag::CodeBlock(_) => {
                self.code_block = false;
                self.block_break();
            }
            Tag::List(_) => {
                self.lists.pop();
                self.block_break();
            }
            Tag::Item => self.ensure_newlines(1),
            Tag::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            Tag::Strong => self.strong = self.strong.saturating_sub(1),
            Tag::Strikethrough => self.strikethrough = self.strikethrough.saturating_sub(1),
            Tag::Link(..) => self.link = self.link.saturating_sub(1),
            Tag::Image(..)
            | Tag::FootnoteDefinition(_)
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell => {}
        }
    }

    fn finish(mut self) -> Vec<StyledSpan> {
        while let Some(last) = self.spans.last_mut() {
            let trimmed_len = last.text.trim_end_matches('\n').len();
            if trimmed_len == 0 {
                self.spans.pop();
            } else {
                last.text.truncate(trimmed_len);
                break;
            }
        }
        self.spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_paragraph() {
        let spans = render("Hi there!");
        assert_eq!(
            spans,
            vec![StyledSpan {
                text: "Hi there!".to_string(),
                style: SpanStyle::default()
            }]
        );
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        assert_eq!(plain_text(&render("First.\n\nSecond.")), "First.\n\nSecond.");
    }

    #[test]
    fn test_inline_styles() {
        let spans = render("Use **bold**, *italic* and `code`.");
        assert_eq!(plain_text(&spans), "Use bold, italic and code.");

        let bold = spans.iter().find(|s| s.text == "bold").unwrap();
        assert!(bold.style.strong);
        let italic = spans.iter().find(|s| s.text == "italic").unwrap();
        assert!(italic.style.emphasis);
        let code = spans.iter().find(|s| s.text == "code").unwrap();
        assert!(code.style.code);
    }

    #[test]
    fn test_heading_level() {
        let spans = render("## Setup\n\nRun it.");
        assert_eq!(spans[0].text, "Setup");
        assert_eq!(spans[0].style.heading, Some(2));
        assert_eq!(plain_text(&spans), "Setup\n\nRun it.");
    }

    #[test]
    fn test_lists() {
        assert_eq!(plain_text(&render("- one\n- two")), "• one\n• two");
        assert_eq!(plain_text(&render("3. three\n4. four")), "3. three\n4. four");
        assert_eq!(plain_text(&render("- outer\n  - inner")), "• outer\n  • inner");
    }

    #[test]
    fn test_block_quote_prefix() {
        let spans = render("> quoted");
        assert_eq!(plain_text(&spans), "│ quoted");
        assert!(spans.iter().all(|s| s.style.quote));
    }

    #[test]
    fn test_empty_document() {
        assert!(render("").is_empty());
        assert!(render("\n\n").is_empty());
    }
}
