//! Limited formatting for oracle-provided text.
//!
//! Oracle text is untrusted. Control characters are stripped so nothing can
//! reach the terminal as an escape sequence, and the only markup recognised
//! is `**bold**` and line breaks.

use regex::Regex;
use std::sync::OnceLock;

fn bold_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").unwrap())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Bold(String),
}

pub fn sanitize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}

/// Splits sanitized `text` into lines of plain and bold segments.
pub fn parse(text: &str) -> Vec<Vec<Segment>> {
    let re = bold_re();

    sanitize(text)
        .split('\n')
        .map(|line| {
            let mut segments = Vec::new();
            let mut last = 0;
            for caps in re.captures_iter(line) {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                if whole.start > last {
                    segments.push(Segment::Plain(line[last..whole.start].to_string()));
                }
                segments.push(Segment::Bold(caps[1].to_string()));
                last = whole.end;
            }
            if last < line.len() {
                segments.push(Segment::Plain(line[last..].to_string()));
            }
            segments
        })
        .collect()
}
