use crate::highlight::{self, HighlightedLine};
use crate::markdown::{self, SpanStyle, StyledSpan};

pub type EntryId = usize;

/// Identifies one copy click; only the latest click may clear the ack.
pub type CopyTicket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone)]
pub struct Bubble {
    pub role: Role,
    /// Source text: plain for the user, markdown for the AI.
    pub content: String,
    /// Shown above the content, e.g. the attached file name.
    pub note: Option<String>,
    pub rendered: Vec<StyledSpan>,
}

#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub label: String,
    pub source: String,
    pub lines: Vec<HighlightedLine>,
    /// True while the copy acknowledgement is showing.
    pub copied: bool,
    copies: CopyTicket,
}

#[derive(Debug, Clone)]
pub enum Entry {
    Bubble(Bubble),
    Code(CodeBlock),
    /// Error or status line shown on the AI side.
    Notice(String),
}

fn render_content(role: Role, content: &str) -> Vec<StyledSpan> {
    match role {
        Role::Ai => markdown::render(content),
        Role::User if content.is_empty() => Vec::new(),
        Role::User => vec![StyledSpan {
            text: content.to_string(),
            style: SpanStyle::default(),
        }],
    }
}

/// Append-only list of what the conversation has shown so far.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: Entry) -> EntryId {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn append_bubble(&mut self, content: &str, role: Role) -> EntryId {
        self.push(Entry::Bubble(Bubble {
            role,
            content: content.to_string(),
            note: None,
            rendered: render_content(role, content),
        }))
    }

    pub fn append_user_message(&mut self, text: &str, attachment_name: Option<&str>) -> EntryId {
        let id = self.append_bubble(text, Role::User);
        if let Some(Entry::Bubble(bubble)) = self.entries.get_mut(id) {
            bubble.note = attachment_name.map(|name| format!("[File: {}]", name));
        }
        id
    }

    /// Replaces a bubble's content and re-renders it.
    pub fn update_bubble(&mut self, id: EntryId, content: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(Entry::Bubble(bubble)) => {
                bubble.content = content.to_string();
                bubble.rendered = render_content(bubble.role, content);
                true
            }
            _ => false,
        }
    }

    pub fn append_code_block(&mut self, language: Option<&str>, source: &str) -> EntryId {
        self.push(Entry::Code(CodeBlock {
            label: highlight::language_label(language),
            source: source.to_string(),
            lines: highlight::highlight_code_lines(source, language),
            copied: false,
            copies: 0,
        }))
    }

    pub fn append_notice(&mut self, text: impl Into<String>) -> EntryId {
        self.push(Entry::Notice(text.into()))
    }

    /// Returns the raw source to put on the clipboard and starts the
    /// acknowledgement.
    pub fn copy_code(&mut self, id: EntryId) -> Option<(String, CopyTicket)> {
        match self.entries.get_mut(id) {
            Some(Entry::Code(block)) => {
                block.copied = true;
                block.copies += 1;
                Some((block.source.clone(), block.copies))
            }
            _ => None,
        }
    }

    /// Ends the acknowledgement unless a later copy restarted it.
    pub fn clear_copy_ack(&mut self, id: EntryId, ticket: CopyTicket) {
        if let Some(Entry::Code(block)) = self.entries.get_mut(id) {
            if block.copies == ticket {
                block.copied = false;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::plain_text;

    #[test]
    fn test_user_text_is_not_markdown() {
        let mut transcript = Transcript::default();
        let id = transcript.append_user_message("**not bold**", Some("notes.txt"));

        match transcript.get(id) {
            Some(Entry::Bubble(bubble)) => {
                assert_eq!(bubble.role, Role::User);
                assert_eq!(plain_text(&bubble.rendered), "**not bold**");
                assert_eq!(bubble.note.as_deref(), Some("[File: notes.txt]"));
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_update_rerenders_ai_bubble() {
        let mut transcript = Transcript::default();
        let id = transcript.append_bubble("", Role::Ai);
        assert!(transcript.update_bubble(id, "First.\n\n**Second.**"));

        let Some(Entry::Bubble(bubble)) = transcript.get(id) else {
            panic!("expected bubble");
        };
        assert_eq!(plain_text(&bubble.rendered), "First.\n\nSecond.");
        assert!(bubble.rendered.iter().any(|s| s.style.strong));
    }

    #[test]
    fn test_update_rejects_non_bubbles() {
        let mut transcript = Transcript::default();
        let notice = transcript.append_notice("Error: nope");
        assert!(!transcript.update_bubble(notice, "x"));
        assert!(!transcript.update_bubble(99, "x"));
    }

    #[test]
    fn test_copy_ack_cycle() {
        let mut transcript = Transcript::default();
        let id = transcript.append_code_block(None, "echo hi\n");

        let (source, ticket) = transcript.copy_code(id).unwrap();
        assert_eq!(source, "echo hi\n");
        assert!(matches!(transcript.get(id), Some(Entry::Code(b)) if b.copied && b.label == "code"));

        transcript.clear_copy_ack(id, ticket);
        assert!(matches!(transcript.get(id), Some(Entry::Code(b)) if !b.copied));
    }

    #[test]
    fn test_stale_copy_timer_is_ignored() {
        let mut transcript = Transcript::default();
        let id = transcript.append_code_block(Some("sh"), "ls");

        let (_, first) = transcript.copy_code(id).unwrap();
        let (_, second) = transcript.copy_code(id).unwrap();
        assert_ne!(first, second);

        transcript.clear_copy_ack(id, first);
        assert!(matches!(transcript.get(id), Some(Entry::Code(b)) if b.copied));
        transcript.clear_copy_ack(id, second);
        assert!(matches!(transcript.get(id), Some(Entry::Code(b)) if !b.copied));
    }

    #[test]
    fn test_entries_are_ordered() {
        let mut transcript = Transcript::default();
        let a = transcript.append_bubble("Hello", Role::User);
        let b = transcript.append_code_block(Some("rust"), "fn main() {}");
        let c = transcript.append_notice("done");
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(transcript.len(), 3);

        transcript.clear();
        assert!(transcript.is_empty());
    }
}
