use iced::widget::text::Span;
use iced::widget::{button, column, container, rich_text, row, span, text, Column, Space};
use iced::{alignment, font, Border, Color, Element, Font, Length, Theme};

use crate::attachment::{Attachment, AttachmentKind};
use crate::highlight::HighlightedLine;
use crate::markdown::StyledSpan;
use crate::transcript::{Bubble, CodeBlock, Entry, EntryId, Role, Transcript};
use crate::Message;

const TEXT: Color = Color::from_rgb(0.859, 0.871, 0.882);
const MUTED: Color = Color::from_rgb(0.541, 0.565, 0.600);
const USER_BG: Color = Color::from_rgb(0.251, 0.306, 0.929);
const AI_BG: Color = Color::from_rgb(0.271, 0.278, 0.353);
const CODE_BG: Color = Color::from_rgb(0.118, 0.122, 0.133);
const PANEL_BG: Color = Color::from_rgb(0.169, 0.176, 0.192);
const INLINE_CODE: Color = Color::from_rgb(0.902, 0.729, 0.494);
const LINK: Color = Color::from_rgb(0.533, 0.714, 1.0);
const QUOTE: Color = Color::from_rgb(0.690, 0.702, 0.722);
const NOTICE: Color = Color::from_rgb(0.957, 0.573, 0.494);

const BUBBLE_MAX_WIDTH: f32 = 560.0;

fn hex_color(rgb: u32) -> Color {
    Color::from_rgb8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

fn styled_span(styled: &StyledSpan) -> Span<'static, Message, Font> {
    let style = styled.style;
    let mut font = Font::MONOSPACE;
    if style.strong || style.heading.is_some() {
        font.weight = font::Weight::Bold;
    }
    if style.emphasis {
        font.style = font::Style::Italic;
    }

    let size = match style.heading {
        Some(1) => 20.0,
        Some(2) => 18.0,
        Some(_) => 16.0,
        None => 14.0,
    };

    let color = if style.code {
        INLINE_CODE
    } else if style.link {
        LINK
    } else if style.quote {
        QUOTE
    } else if style.strikethrough {
        MUTED
    } else {
        TEXT
    };

    span(styled.text.clone()).font(font).size(size).color(color)
}

fn panel(background: Color, radius: f32) -> impl Fn(&Theme) -> container::Style {
    move |_theme| container::Style {
        background: Some(background.into()),
        text_color: Some(TEXT),
        border: Border {
            radius: radius.into(),
            ..Border::default()
        },
        ..container::Style::default()
    }
}

pub fn bubble(bubble: &Bubble) -> Element<'_, Message> {
    let mut content = Column::new().spacing(6);
    if let Some(note) = &bubble.note {
        content = content.push(
            text(note.as_str())
                .size(12)
                .font(Font {
                    style: font::Style::Italic,
                    ..Font::MONOSPACE
                })
                .color(TEXT),
        );
    }
    if !bubble.rendered.is_empty() {
        let spans: Vec<Span<'static, Message, Font>> = bubble.rendered.iter().map(styled_span).collect();
        content = content.push(rich_text(spans));
    }

    let (background, align) = match bubble.role {
        Role::User => (USER_BG, alignment::Horizontal::Right),
        Role::Ai => (AI_BG, alignment::Horizontal::Left),
    };

    container(
        container(content)
            .padding(12)
            .max_width(BUBBLE_MAX_WIDTH)
            .style(panel(background, 18.0)),
    )
    .width(Length::Fill)
    .align_x(align)
    .into()
}

fn code_spans(lines: &[HighlightedLine]) -> Vec<Span<'static, Message, Font>> {
    let mut spans = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            spans.push(span("\n"));
        }
        for highlighted in &line.spans {
            spans.push(span(highlighted.text.clone()).color(hex_color(highlighted.color)));
        }
    }
    spans
}

pub fn code_block(id: EntryId, block: &CodeBlock) -> Element<'_, Message> {
    let copy_label = if block.copied { "Copied!" } else { "Copy" };

    let header = row![
        text(block.label.as_str()).size(12).color(MUTED),
        Space::with_width(Length::Fill),
        button(text(copy_label).size(12))
            .on_press(Message::CopyCode(id))
            .padding([4, 8]),
    ]
    .align_y(alignment::Vertical::Center);

    let body = rich_text(code_spans(&block.lines)).size(13).font(Font::MONOSPACE);

    container(column![header, body].spacing(8))
        .padding(10)
        .width(Length::Fill)
        .style(panel(CODE_BG, 8.0))
        .into()
}

pub fn notice(message: &str) -> Element<'_, Message> {
    container(text(format!("⚠ {}", message)).size(13).color(NOTICE))
        .padding([6, 12])
        .width(Length::Fill)
        .align_x(alignment::Horizontal::Left)
        .into()
}

pub fn transcript(transcript: &Transcript) -> Element<'_, Message> {
    let children = transcript.entries().iter().enumerate().map(|(id, entry)| match entry {
        Entry::Bubble(b) => bubble(b),
        Entry::Code(block) => code_block(id, block),
        Entry::Notice(message) => notice(message),
    });

    Column::with_children(children).spacing(10).padding(10).into()
}

pub fn attachment_preview(attachment: &Attachment) -> Element<'_, Message> {
    let kind = match attachment.kind() {
        AttachmentKind::Image => "image",
        AttachmentKind::Text => "file",
    };

    container(
        row![
            text(kind).size(12).color(MUTED),
            text(attachment.name()).size(13),
            Space::with_width(Length::Fill),
            button(text("✕").size(12))
                .on_press(Message::RemoveAttachment)
                .padding([2, 8]),
        ]
        .spacing(8)
        .align_y(alignment::Vertical::Center),
    )
    .padding(8)
    .width(Length::Fill)
    .style(panel(PANEL_BG, 8.0))
    .into()
}

pub fn input_panel<'a>(input: Element<'a, Message>, attachment: Option<&'a Attachment>) -> Element<'a, Message> {
    let mut content = Column::new().spacing(8);
    if let Some(attachment) = attachment {
        content = content.push(attachment_preview(attachment));
    }
    content = content.push(input);

    container(content)
        .padding(5)
        .width(Length::Fill)
        .style(panel(USER_BG, 12.0))
        .into()
}

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const LOADING_MESSAGES: [&str; 4] = [
    "Thinking...",
    "Waiting for the model...",
    "Still working on it...",
    "Almost there, hopefully...",
];

pub fn loading(frame: usize) -> Element<'static, Message> {
    let message_idx = (frame / 25) % LOADING_MESSAGES.len();
    let spinner_idx = frame % SPINNER_FRAMES.len();

    row![
        text(SPINNER_FRAMES[spinner_idx]).size(18),
        text(LOADING_MESSAGES[message_idx]).size(13).color(MUTED),
        Space::with_width(Length::Fill),
        button(text("Stop").size(12))
            .on_press(Message::Cancel)
            .padding([4, 10]),
    ]
    .spacing(10)
    .padding([4, 12])
    .align_y(alignment::Vertical::Center)
    .into()
}

pub fn shell<'a>(content: Element<'a, Message>) -> Element<'a, Message> {
    container(content)
        .padding(10)
        .width(Length::Fill)
        .height(Length::Fill)
        .style(panel(PANEL_BG, 18.0))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color(0xff8000), Color::from_rgb8(255, 128, 0));
    }
}
