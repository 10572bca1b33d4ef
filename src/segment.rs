use once_cell::sync::Lazy;
use regex::Regex;

// Opening fence, optional language token, newline, body, closing fence.
// The body is matched lazily so the first closing fence ends the block.
static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+#.\-]*)[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSegment {
    /// `None` for an unlabeled fence.
    pub language: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose(String),
    Code(CodeSegment),
}

/// Splits a reply into prose and fenced code, in order of appearance.
pub fn segment(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in FENCE.captures_iter(raw) {
        let (Some(whole), Some(lang), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };

        push_prose(&mut segments, &raw[last..whole.start()]);

        let source = body.as_str();
        let source = source
            .strip_suffix("\r\n")
            .or_else(|| source.strip_suffix('\n'))
            .unwrap_or(source);
        let language = (!lang.as_str().is_empty()).then(|| lang.as_str().to_string());

        segments.push(Segment::Code(CodeSegment {
            language,
            source: source.to_string(),
        }));
        last = whole.end();
    }

    push_prose(&mut segments, &raw[last..]);
    segments
}

fn push_prose(segments: &mut Vec<Segment>, span: &str) {
    let trimmed = span.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::Prose(trimmed.to_string()));
    }
}

/// A reply decomposed into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub segments: Vec<Segment>,
}

impl Reply {
    pub fn parse(raw: &str) -> Self {
        Reply {
            segments: segment(raw),
        }
    }

    /// All prose, in order, joined into one markdown document.
    pub fn prose_document(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Prose(text) => Some(text.as_str()),
                Segment::Code(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeSegment> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Code(code) => Some(code),
            Segment::Prose(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(language: Option<&str>, source: &str) -> Segment {
        Segment::Code(CodeSegment {
            language: language.map(str::to_string),
            source: source.to_string(),
        })
    }

    fn prose(text: &str) -> Segment {
        Segment::Prose(text.to_string())
    }

    #[test]
    fn test_plain_reply_is_one_prose_segment() {
        assert_eq!(segment("  Hi there!\n"), vec![prose("Hi there!")]);
    }

    #[test]
    fn test_blank_reply_has_no_segments() {
        assert!(segment("").is_empty());
        assert!(segment(" \n\t\n").is_empty());
    }

    #[test]
    fn test_code_only_reply() {
        let reply = Reply::parse("```python\nprint(1)\n```");
        assert_eq!(reply.segments, vec![code(Some("python"), "print(1)")]);
        assert_eq!(reply.prose_document(), "");
    }

    #[test]
    fn test_order_is_preserved() {
        let raw = "Intro text.\n\n```rust\nfn main() {}\n```\nBetween.\n```\nplain\n```\n\nOutro.";
        assert_eq!(
            segment(raw),
            vec![
                prose("Intro text."),
                code(Some("rust"), "fn main() {}"),
                prose("Between."),
                code(None, "plain"),
                prose("Outro."),
            ]
        );

        let reply = Reply::parse(raw);
        assert_eq!(reply.prose_document(), "Intro text.\n\nBetween.\n\nOutro.");
        assert_eq!(reply.code_blocks().count(), 2);
    }

    #[test]
    fn test_body_is_kept_verbatim() {
        let raw = "```js\n  const a = 1;\n\n  if (a) {\n    go();\n  }\n```";
        assert_eq!(
            segment(raw),
            vec![code(Some("js"), "  const a = 1;\n\n  if (a) {\n    go();\n  }")]
        );
    }

    #[test]
    fn test_language_tokens_with_symbols() {
        let segments = segment("```c++\nint x;\n```\n```objective-c\n@end\n```");
        assert_eq!(segments, vec![code(Some("c++"), "int x;"), code(Some("objective-c"), "@end")]);
    }

    #[test]
    fn test_first_closing_fence_wins() {
        let raw = "```md\nouter\n```inner\nstill\n```";
        let segments = segment(raw);
        assert_eq!(segments[0], code(Some("md"), "outer"));
        assert_eq!(segments[1], prose("inner\nstill\n```"));
    }

    #[test]
    fn test_unclosed_fence_stays_prose() {
        assert_eq!(segment("See:\n```sh\nls -la"), vec![prose("See:\n```sh\nls -la")]);
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let raw = "a\n```py\nx = 1\n```\nb";
        assert_eq!(segment(raw), segment(raw));
    }
}
