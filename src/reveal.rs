//! Progressive reveal of a reply.
//!
//! [`BlockStreamer`] hands out a markdown document one paragraph at a time.
//! [`Playback`] walks a whole segmented reply and tells the caller what to
//! append or update on each tick. Neither knows about timers; the caller
//! decides the cadence.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;

use crate::config::CodePlacement;
use crate::segment::{CodeSegment, Reply, Segment};

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\r?\n").expect("blank line pattern is valid"));

/// Splits a document into paragraph units on blank lines.
pub fn paragraphs(markdown: &str) -> Vec<String> {
    BLANK_LINE
        .split(markdown)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealStep {
    /// Every paragraph revealed so far, joined by blank lines.
    pub revealed: String,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct BlockStreamer {
    pending: VecDeque<String>,
    revealed: Vec<String>,
}

impl BlockStreamer {
    pub fn new(markdown: &str) -> Self {
        BlockStreamer {
            pending: paragraphs(markdown).into(),
            revealed: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Reveals the next paragraph. `None` once everything is shown.
    pub fn next_step(&mut self) -> Option<RevealStep> {
        let paragraph = self.pending.pop_front()?;
        self.revealed.push(paragraph);
        Some(RevealStep {
            revealed: self.revealed.join("\n\n"),
            done: self.pending.is_empty(),
        })
    }
}

impl Iterator for BlockStreamer {
    type Item = RevealStep;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_step()
    }
}

/// Something the transcript should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Open a new, empty AI bubble; following updates go to it.
    BubbleOpened,
    /// Replace the open bubble's markdown.
    BubbleUpdated(String),
    CodeBlock(CodeSegment),
}

enum Item {
    Prose(String),
    Code(CodeSegment),
}

/// Drives one reply through the transcript.
pub struct Playback {
    queue: VecDeque<Item>,
    current: Option<BlockStreamer>,
}

impl Playback {
    /// Builds the playback and returns the events to apply right away.
    pub fn start(reply: &Reply, placement: CodePlacement) -> (Self, Vec<PlaybackEvent>) {
        let mut events = Vec::new();
        let mut playback = Playback {
            queue: VecDeque::new(),
            current: None,
        };

        match placement {
            CodePlacement::Immediate => {
                let document = reply.prose_document();
                let streamer = BlockStreamer::new(&document);
                if !streamer.is_done() {
                    events.push(PlaybackEvent::BubbleOpened);
                    playback.current = Some(streamer);
                }
                events.extend(reply.code_blocks().cloned().map(PlaybackEvent::CodeBlock));
            }
            CodePlacement::Inline => {
                playback.queue = reply
                    .segments
                    .iter()
                    .map(|s| match s {
                        Segment::Prose(text) => Item::Prose(text.clone()),
                        Segment::Code(code) => Item::Code(code.clone()),
                    })
                    .collect();
                playback.advance_queue(&mut events);
            }
        }

        (playback, events)
    }

    pub fn is_done(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Reveals one more paragraph, plus any code that follows it in
    /// `Inline` mode.
    pub fn tick(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();

        if let Some(streamer) = self.current.as_mut() {
            if let Some(step) = streamer.next_step() {
                events.push(PlaybackEvent::BubbleUpdated(step.revealed));
            }
            if streamer.is_done() {
                self.current = None;
            }
        }

        if self.current.is_none() {
            self.advance_queue(&mut events);
        }

        events
    }

    // Flushes code items until the next prose item becomes current.
    fn advance_queue(&mut self, events: &mut Vec<PlaybackEvent>) {
        while self.current.is_none() {
            match self.queue.pop_front() {
                Some(Item::Code(code)) => events.push(PlaybackEvent::CodeBlock(code)),
                Some(Item::Prose(text)) => {
                    let streamer = BlockStreamer::new(&text);
                    if !streamer.is_done() {
                        events.push(PlaybackEvent::BubbleOpened);
                        self.current = Some(streamer);
                    }
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(language: &str, source: &str) -> CodeSegment {
        CodeSegment {
            language: Some(language.to_string()),
            source: source.to_string(),
        }
    }

    fn drain(playback: &mut Playback) -> Vec<Vec<PlaybackEvent>> {
        let mut ticks = Vec::new();
        while !playback.is_done() {
            ticks.push(playback.tick());
        }
        ticks
    }

    #[test]
    fn test_paragraph_split() {
        assert_eq!(paragraphs("a\nb\n\nc\n \n\nd"), vec!["a\nb", "c", "d"]);
        assert!(paragraphs("  \n\n ").is_empty());
    }

    #[test]
    fn test_each_step_adds_one_paragraph() {
        let mut streamer = BlockStreamer::new("One.\n\nTwo.\n\nThree.");
        assert_eq!(streamer.remaining(), 3);

        let steps: Vec<RevealStep> = streamer.by_ref().collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].revealed, "One.");
        assert_eq!(steps[1].revealed, "One.\n\nTwo.");
        assert_eq!(steps[2].revealed, "One.\n\nTwo.\n\nThree.");
        assert_eq!(steps.iter().filter(|s| s.done).count(), 1);
        assert!(steps[2].done);

        for pair in steps.windows(2) {
            assert!(pair[1].revealed.starts_with(&pair[0].revealed));
        }
        assert!(streamer.next_step().is_none());
    }

    #[test]
    fn test_single_paragraph_reply() {
        let reply = Reply::parse("Hi there!");
        let (mut playback, events) = Playback::start(&reply, CodePlacement::Inline);
        assert_eq!(events, vec![PlaybackEvent::BubbleOpened]);

        assert_eq!(
            drain(&mut playback),
            vec![vec![PlaybackEvent::BubbleUpdated("Hi there!".to_string())]]
        );
    }

    #[test]
    fn test_code_only_reply_finishes_at_start() {
        let reply = Reply::parse("```python\nprint(1)\n```");
        for placement in [CodePlacement::Inline, CodePlacement::Immediate] {
            let (playback, events) = Playback::start(&reply, placement);
            assert_eq!(events, vec![PlaybackEvent::CodeBlock(code("python", "print(1)"))]);
            assert!(playback.is_done());
        }
    }

    #[test]
    fn test_inline_placement_waits_for_preceding_prose() {
        let reply = Reply::parse("Intro one.\n\nIntro two.\n```sh\nls\n```\nAfter.");
        let (mut playback, events) = Playback::start(&reply, CodePlacement::Inline);
        assert_eq!(events, vec![PlaybackEvent::BubbleOpened]);

        let ticks = drain(&mut playback);
        assert_eq!(
            ticks,
            vec![
                vec![PlaybackEvent::BubbleUpdated("Intro one.".to_string())],
                vec![
                    PlaybackEvent::BubbleUpdated("Intro one.\n\nIntro two.".to_string()),
                    PlaybackEvent::CodeBlock(code("sh", "ls")),
                    PlaybackEvent::BubbleOpened,
                ],
                vec![PlaybackEvent::BubbleUpdated("After.".to_string())],
            ]
        );
    }

    #[test]
    fn test_immediate_placement_shows_code_up_front() {
        let reply = Reply::parse("Intro.\n```sh\nls\n```\nAfter.");
        let (mut playback, events) = Playback::start(&reply, CodePlacement::Immediate);
        assert_eq!(
            events,
            vec![PlaybackEvent::BubbleOpened, PlaybackEvent::CodeBlock(code("sh", "ls"))]
        );

        let ticks = drain(&mut playback);
        assert_eq!(
            ticks,
            vec![
                vec![PlaybackEvent::BubbleUpdated("Intro.".to_string())],
                vec![PlaybackEvent::BubbleUpdated("Intro.\n\nAfter.".to_string())],
            ]
        );
    }

    #[test]
    fn test_leading_code_is_flushed_at_start() {
        let reply = Reply::parse("```sh\nls\n```\nThen this.");
        let (mut playback, events) = Playback::start(&reply, CodePlacement::Inline);
        assert_eq!(
            events,
            vec![PlaybackEvent::CodeBlock(code("sh", "ls")), PlaybackEvent::BubbleOpened]
        );
        assert_eq!(drain(&mut playback).len(), 1);
    }
}
