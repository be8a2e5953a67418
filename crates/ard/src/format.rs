//! Whitespace formatter.
//!
//! Keeps the file's own indentation unit (tabs or N spaces) and re-derives
//! every line's indentation from bracket depth. Trailing whitespace goes,
//! runs of blank lines collapse to one, and the file ends with exactly one
//! newline. Tokens are never reordered.

use std::fmt;

/// Indentation unit of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    Tabs,
    Spaces(usize),
}

impl Indent {
    fn render(self, depth: usize) -> String {
        match self {
            Indent::Tabs => "\t".repeat(depth),
            Indent::Spaces(width) => " ".repeat(width * depth),
        }
    }
}

impl Default for Indent {
    fn default() -> Self {
        Indent::Spaces(2)
    }
}

impl fmt::Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indent::Tabs => write!(f, "tabs"),
            Indent::Spaces(width) => write!(f, "{width} spaces"),
        }
    }
}

/// The unit used by the first indented line, or the default.
pub fn detect_indent(source: &str) -> Indent {
    for line in source.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('\t') {
            return Indent::Tabs;
        }
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces > 0 {
            return Indent::Spaces(spaces);
        }
    }
    Indent::default()
}

/// Bracket balance of one line, ignoring strings and `//` comments.
/// Returns `(leading closers, opened, closed)`.
fn bracket_counts(line: &str) -> (usize, usize, usize) {
    let mut leading = 0;
    let mut at_start = true;
    let (mut opened, mut closed) = (0, 0);
    let mut chars = line.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '/' if chars.peek() == Some(&'/') => break,
            '{' | '(' | '[' => opened += 1,
            '}' | ')' | ']' => {
                closed += 1;
                if at_start {
                    leading += 1;
                }
            }
            _ => {}
        }
        if !matches!(c, '}' | ')' | ']') && !c.is_whitespace() {
            at_start = false;
        }
    }
    (leading, opened, closed)
}

/// Format `source` with `indent` as the unit.
pub fn format_with(source: &str, indent: Indent) -> String {
    let mut out = String::with_capacity(source.len());
    let mut depth: usize = 0;
    let mut pending_blank = false;

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }

        let (leading, opened, closed) = bracket_counts(line);
        out.push_str(&indent.render(depth.saturating_sub(leading)));
        out.push_str(line);
        out.push('\n');
        depth = (depth + opened).saturating_sub(closed);
    }
    out
}

/// Format `source` in its detected style.
pub fn format_source(source: &str) -> String {
    format_with(source, detect_indent(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_indent_unit() {
        assert_eq!(detect_indent("fn a() {\n\tx\n}"), Indent::Tabs);
        assert_eq!(detect_indent("fn a() {\n    x\n}"), Indent::Spaces(4));
        assert_eq!(detect_indent("let x = 1"), Indent::Spaces(2));
    }

    #[test]
    fn test_reindents_by_depth() {
        let source = "fn a() Int {\n      if true {\n 1\n        } else {\n2\n}\n}\n";
        let expected = "fn a() Int {\n      if true {\n            1\n      } else {\n            2\n      }\n}\n";
        assert_eq!(format_source(source), expected);
    }

    #[test]
    fn test_strips_trailing_space_and_extra_blank_lines() {
        let source = "\n\nlet x = 1   \n\n\n\nlet y = 2\n\n\n";
        assert_eq!(format_source(source), "let x = 1\n\nlet y = 2\n");
    }

    #[test]
    fn test_brackets_in_strings_and_comments_are_ignored() {
        let source = "let s = \"{ not a block\" // {\nlet t = 1\n";
        assert_eq!(format_source(source), source);
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let source = "struct P {\n  x: Int,\n}\nimpl P {\n  fn get() Int {\n    self.x\n  }\n}\n";
        let once = format_source(source);
        assert_eq!(once, source);
        assert_eq!(format_source(&once), once);
    }

    #[test]
    fn test_empty_file_stays_empty() {
        assert_eq!(format_source(""), "");
        assert_eq!(format_source("\n\n"), "");
    }
}
