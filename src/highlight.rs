//! Syntax highlighting for code blocks using syntect.
//!
//! Colours are returned as 0xRRGGBB so the widget layer can convert them
//! to whatever colour type it renders with.

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const THEME_NAME: &str = "base16-ocean.dark";
const FALLBACK_COLOR: u32 = 0xdbdee1;

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightedSpan {
    pub text: String,
    pub color: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightedLine {
    pub spans: Vec<HighlightedSpan>,
}

fn style_to_hex_color(style: &Style) -> u32 {
    let fg = style.foreground;
    ((fg.r as u32) << 16) | ((fg.g as u32) << 8) | (fg.b as u32)
}

fn map_language(language: &str) -> &str {
    match language {
        "typescript" | "ts" | "tsx" | "jsx" => "js",
        "shell" | "bash" | "zsh" | "console" => "sh",
        "yml" => "yaml",
        "golang" => "go",
        other => other,
    }
}

fn find_syntax(language: Option<&str>) -> &'static SyntaxReference {
    let syntax_set: &'static SyntaxSet = &SYNTAX_SET;
    language
        .map(|l| l.trim().to_lowercase())
        .and_then(|l| {
            let token = map_language(&l).to_string();
            syntax_set
                .find_syntax_by_token(&token)
                .or_else(|| syntax_set.find_syntax_by_extension(&token))
        })
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text())
}

fn theme() -> Option<&'static Theme> {
    let themes: &'static ThemeSet = &THEME_SET;
    themes
        .themes
        .get(THEME_NAME)
        .or_else(|| themes.themes.values().next())
}

fn plain_lines(code: &str) -> Vec<HighlightedLine> {
    code.lines()
        .map(|line| HighlightedLine {
            spans: vec![HighlightedSpan {
                text: line.to_string(),
                color: FALLBACK_COLOR,
            }],
        })
        .collect()
}

/// Highlights `code`, one entry per source line, newlines stripped.
pub fn highlight_code_lines(code: &str, language: Option<&str>) -> Vec<HighlightedLine> {
    let Some(theme) = theme() else {
        return plain_lines(code);
    };

    let mut highlighter = HighlightLines::new(find_syntax(language), theme);
    let mut lines = Vec::new();

    for line in LinesWithEndings::from(code) {
        match highlighter.highlight_line(line, &SYNTAX_SET) {
            Ok(ranges) => {
                let spans = ranges
                    .into_iter()
                    .filter_map(|(style, text)| {
                        let text = text.trim_end_matches(['\n', '\r']);
                        (!text.is_empty()).then(|| HighlightedSpan {
                            text: text.to_string(),
                            color: style_to_hex_color(&style),
                        })
                    })
                    .collect();
                lines.push(HighlightedLine { spans });
            }
            Err(e) => {
                tracing::warn!("Highlighting failed, showing plain text: {}", e);
                return plain_lines(code);
            }
        }
    }

    lines
}

/// Display label for a code block.
pub fn language_label(language: Option<&str>) -> String {
    match language {
        Some(l) if !l.trim().is_empty() => l.trim().to_string(),
        _ => "code".to_string(),
    }
}
